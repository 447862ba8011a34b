// ============================================================
// Layer 2 — Training Session
// ============================================================
// The one place training and inference synchronise:
//
//   gate        — AtomicBool, at most one run at a time
//   status      — whole-snapshot replace, read at any time
//   inferencer  — the active (model, vocabulary) pair, swapped
//                 as one unit after a successful run; readers
//                 hold their own Arc, never the lock
//
// A session is an owned value. Clones share the same state, so a
// training thread and the request side see one another; two
// separately constructed sessions never interact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::model_record::{FileId, ModelId, SessionPhase, TrainingStatus};
use crate::ml::inferencer::Inferencer;

#[derive(Clone, Default)]
pub struct TrainingSession {
    inner: Arc<SessionState>,
}

#[derive(Default)]
struct SessionState {
    active:     AtomicBool,
    status:     RwLock<TrainingStatus>,
    inferencer: Mutex<Option<Arc<Inferencer>>>,
}

impl TrainingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the training slot, or fail immediately if it is taken.
    pub fn try_begin(&self) -> CoreResult<TrainingGuard> {
        if self
            .inner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let model_id = self.inner.status.read().model_id;
            return Err(CoreError::TrainingAlreadyActive { model_id });
        }
        Ok(TrainingGuard { session: self.clone() })
    }

    pub fn is_training(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Latest progress snapshot.
    pub fn status(&self) -> TrainingStatus {
        self.inner.status.read().clone()
    }

    /// True if `file_id` feeds the run currently in progress.
    pub fn is_file_in_use(&self, file_id: FileId) -> bool {
        let status = self.inner.status.read();
        status.active && status.file_ids.contains(&file_id)
    }

    /// Replace the active model and vocabulary in one step.
    pub fn promote(&self, inferencer: Inferencer) {
        let model_id = inferencer.model_id;
        *self.inner.inferencer.lock() = Some(Arc::new(inferencer));
        tracing::info!("Model {} is now serving generation requests", model_id);
    }

    pub fn has_model(&self) -> bool {
        self.inner.inferencer.lock().is_some()
    }

    pub fn active_model_id(&self) -> Option<ModelId> {
        self.inner.inferencer.lock().as_ref().map(|i| i.model_id)
    }

    /// Run `f` against the active model, or return `ModelNotReady`.
    /// The slot lock is released before `f` runs, so a promotion during
    /// a long generation swaps the slot without waiting for it.
    pub fn with_inferencer<T>(
        &self,
        f: impl FnOnce(&Inferencer) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let current = self.inner.inferencer.lock().clone();
        match current {
            Some(inferencer) => f(&inferencer),
            None             => Err(CoreError::ModelNotReady),
        }
    }

    fn publish(&self, update: impl FnOnce(&TrainingStatus) -> TrainingStatus) {
        let mut status = self.inner.status.write();
        *status = update(&*status);
    }
}

// ─── TrainingGuard ────────────────────────────────────────────────────────────
/// Proof of holding the training slot. Dropping it releases the slot
/// and clears the run's file ids, on every exit path.
pub struct TrainingGuard {
    session: TrainingSession,
}

impl TrainingGuard {
    /// Announce a new run in the status snapshot.
    pub fn begin_run(&self, model_id: ModelId, total_epochs: usize, file_ids: Vec<FileId>) {
        self.session.publish(|_| TrainingStatus {
            active: true,
            model_id,
            status: SessionPhase::Training,
            current_epoch: 0,
            total_epochs,
            loss: 0.0,
            file_ids,
            error: None,
        });
    }

    pub fn report_epoch(&self, epoch: usize, loss: f64) {
        self.session.publish(|s| TrainingStatus {
            current_epoch: epoch,
            loss,
            ..s.clone()
        });
    }

    /// Record the final phase; `error` is shown to pollers for failed runs.
    pub fn finish(&self, phase: SessionPhase, error: Option<String>) {
        self.session.publish(|s| TrainingStatus {
            status: phase,
            error,
            ..s.clone()
        });
    }

    pub fn session(&self) -> &TrainingSession {
        &self.session
    }
}

impl Drop for TrainingGuard {
    fn drop(&mut self) {
        self.session.publish(|s| {
            let status = if s.status == SessionPhase::Training {
                SessionPhase::Failed
            } else {
                s.status
            };
            TrainingStatus {
                active: false,
                status,
                file_ids: Vec::new(),
                ..s.clone()
            }
        });
        self.session.inner.active.store(false, Ordering::Release);
    }
}
