// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run:
//
//   Step 1: Claim the session's training slot
//   Step 2: Assemble the corpus from the selected files  (Layer 4)
//   Step 3: Pick epochs / batch size from corpus length
//   Step 4: Build vocabulary and windowed examples       (Layer 3/4)
//   Step 5: Create the model record                      (store)
//   Step 6: Train on a worker thread                     (Layer 5)
//             ↳ per-epoch checkpoint: metric row, record
//               progress, status snapshot
//   Step 7: Serialise weights + vocabulary, mark ready,
//           promote to the inference slot                (Layer 6)
//
// Steps 1–4 reject the request without touching the store.
// Anything failing after step 5 marks the model `failed`.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::application::session::{TrainingGuard, TrainingSession};
use crate::data::corpus;
use crate::data::splitter::VALIDATION_FRACTION;
use crate::data::windowing::{default_stride, make_examples, Example, SEQ_LENGTH};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::model_record::{
    EpochProgress, FileId, ModelId, ModelRecord, ModelStatus, NewModel, SessionPhase,
    TrainingMetric,
};
use crate::domain::traits::{CorpusProvider, MetricSink, ModelStore};
use crate::domain::vocabulary::Vocabulary;
use crate::infra::weight_codec;
use crate::ml::inferencer::Inferencer;
use crate::ml::model::CharRnnConfig;
use crate::ml::trainer::{run_training, EpochReport, TrainedModel, TrainingPlan};

/// Corpora shorter than this many characters are rejected.
pub const MIN_CORPUS_CHARS: usize = 5_000;

/// Corpora longer than this use the large batch size.
pub const LARGE_BATCH_THRESHOLD: usize = 100_000;

// ─── Training Configuration ──────────────────────────────────────────────────
// Hyper-parameters and paths. `None` fields fall back to the
// corpus-length policies below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub store_dir:           String,
    pub seq_length:          usize,
    pub embedding_dim:       usize,
    pub hidden_units:        usize,
    pub ffn_units:           usize,
    pub dropout:             f64,
    pub learning_rate:       f64,
    pub validation_fraction: f64,
    pub batch_size:          Option<usize>,
    pub stride:              Option<usize>,
    pub seed:                Option<u64>,
    pub reply_length:        usize,
    pub temperature:         f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            store_dir:           "model_store".to_string(),
            seq_length:          SEQ_LENGTH,
            embedding_dim:       64,
            hidden_units:        128,
            ffn_units:           256,
            dropout:             0.2,
            learning_rate:       1e-3,
            validation_fraction: VALIDATION_FRACTION,
            batch_size:          None,
            stride:              None,
            seed:                None,
            reply_length:        150,
            temperature:         0.7,
        }
    }
}

impl TrainConfig {
    /// Read a JSON config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config in '{}'", path.display()))
    }

    /// Architecture for a vocabulary of `vocab_size` characters.
    pub fn architecture(&self, vocab_size: usize) -> CharRnnConfig {
        CharRnnConfig::for_vocab(vocab_size)
            .with_seq_length(self.seq_length)
            .with_embedding_dim(self.embedding_dim)
            .with_hidden_units(self.hidden_units)
            .with_ffn_units(self.ffn_units)
            .with_dropout(self.dropout)
    }
}

// ─── Corpus-length policies ──────────────────────────────────────────────────

/// Epochs to train for a corpus of `len` characters; 0 means "too small".
pub fn calculate_epochs(len: usize) -> usize {
    match len {
        0..=4_999           => 0,
        5_000..=19_999      => 100,
        20_000..=99_999     => 60,
        100_000..=499_999   => 50,
        500_000..=999_999   => 30,
        _                   => 25,
    }
}

pub fn batch_size_for(len: usize) -> usize {
    if len > LARGE_BATCH_THRESHOLD { 256 } else { 128 }
}

// ─── Request / handle ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TrainRequest {
    pub name:     Option<String>,
    /// Concatenated in this order.
    pub file_ids: Vec<FileId>,
    /// Overrides the epoch policy when non-zero.
    pub epochs:   Option<usize>,
}

/// A run that has been accepted and is training in the background.
pub struct TrainingHandle {
    pub model_id: ModelId,
    handle:       JoinHandle<CoreResult<ModelRecord>>,
}

impl TrainingHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the run ends and return the final model record.
    pub fn wait(self) -> CoreResult<ModelRecord> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(CoreError::Storage(anyhow!("training thread panicked"))))
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:  TrainConfig,
    session: TrainingSession,
    corpus:  Arc<dyn CorpusProvider>,
    models:  Arc<dyn ModelStore>,
    metrics: Arc<dyn MetricSink>,
}

impl TrainUseCase {
    pub fn new(
        config:  TrainConfig,
        session: TrainingSession,
        corpus:  Arc<dyn CorpusProvider>,
        models:  Arc<dyn ModelStore>,
        metrics: Arc<dyn MetricSink>,
    ) -> Self {
        Self { config, session, corpus, models, metrics }
    }

    /// Validate the request, create the model record and start training
    /// on a worker thread.
    pub fn start(&self, request: TrainRequest) -> CoreResult<TrainingHandle> {
        let guard    = self.session.try_begin()?;
        let prepared = self.prepare(&request)?;

        let config_json = serde_json::to_string(&prepared.architecture)
            .map_err(|e| CoreError::Storage(anyhow!("cannot encode model config: {e}")))?;
        let record = self.models.create_model(NewModel {
            name:         request.name.clone().unwrap_or_else(|| "char-rnn".to_string()),
            config:       config_json,
            total_epochs: prepared.plan.epochs,
        })?;

        guard.begin_run(record.id, prepared.plan.epochs, prepared.file_ids.clone());
        tracing::info!(
            "Model {} accepted: {} characters, vocabulary {}, {} windows, {} epochs",
            record.id,
            prepared.corpus_len,
            prepared.vocabulary.len(),
            prepared.examples.len(),
            prepared.plan.epochs
        );

        let job = TrainingJob {
            model_id: record.id,
            guard,
            prepared,
            models:   Arc::clone(&self.models),
            metrics:  Arc::clone(&self.metrics),
        };

        let model_id = record.id;
        let spawned = std::thread::Builder::new()
            .name(format!("train-model-{model_id}"))
            .spawn(move || job.run());

        match spawned {
            Ok(handle) => Ok(TrainingHandle { model_id, handle }),
            Err(e) => Err(abandon_model(
                self.models.as_ref(),
                model_id,
                format!("cannot spawn training thread: {e}"),
            )),
        }
    }

    /// `start` followed by `wait`.
    pub fn execute(&self, request: TrainRequest) -> CoreResult<ModelRecord> {
        self.start(request)?.wait()
    }

    fn prepare(&self, request: &TrainRequest) -> CoreResult<PreparedRun> {
        if request.file_ids.is_empty() {
            return Err(CoreError::InsufficientData("no files selected".into()));
        }

        let corpus = corpus::assemble(self.corpus.as_ref(), &request.file_ids)?;
        if corpus.is_blank() {
            return Err(CoreError::InsufficientData("No content to train on".into()));
        }

        let corpus_len = corpus.char_len();
        let policy     = calculate_epochs(corpus_len);
        if policy == 0 {
            return Err(CoreError::InsufficientData(format!(
                "Text is too small to train ({corpus_len} characters). \
                 Minimum {MIN_CORPUS_CHARS} characters required for effective training."
            )));
        }
        let epochs = request.epochs.filter(|&e| e > 0).unwrap_or(policy);

        let vocabulary = Vocabulary::build(&corpus.text);
        let ids        = vocabulary.encode(&corpus.text);
        let stride     = self.config.stride.unwrap_or_else(|| default_stride(corpus_len));
        let examples   = make_examples(&ids, self.config.seq_length, stride)?;

        let plan = TrainingPlan {
            epochs,
            batch_size:          self.config.batch_size.unwrap_or_else(|| batch_size_for(corpus_len)),
            learning_rate:       self.config.learning_rate,
            validation_fraction: self.config.validation_fraction,
            seed:                self.config.seed,
        };

        Ok(PreparedRun {
            architecture: self.config.architecture(vocabulary.len()),
            file_ids:     corpus.file_ids,
            corpus_len,
            vocabulary,
            examples,
            plan,
        })
    }
}

/// Mark a record that never started training as failed and return the
/// error for the caller.
fn abandon_model(models: &dyn ModelStore, model_id: ModelId, reason: String) -> CoreError {
    tracing::error!("Model {} abandoned: {}", model_id, reason);
    if let Err(e) = models.update_status(model_id, ModelStatus::Failed, None, Some(reason.clone())) {
        tracing::warn!("Could not mark model {} failed: {:#}", model_id, e);
    }
    CoreError::Storage(anyhow!(reason))
}

struct PreparedRun {
    architecture: CharRnnConfig,
    file_ids:     Vec<FileId>,
    corpus_len:   usize,
    vocabulary:   Vocabulary,
    examples:     Vec<Example>,
    plan:         TrainingPlan,
}

// ─── TrainingJob ──────────────────────────────────────────────────────────────
// Everything the worker thread owns. The guard is dropped when the
// job ends, which releases the training slot.
struct TrainingJob {
    model_id: ModelId,
    guard:    TrainingGuard,
    prepared: PreparedRun,
    models:   Arc<dyn ModelStore>,
    metrics:  Arc<dyn MetricSink>,
}

impl TrainingJob {
    fn run(mut self) -> CoreResult<ModelRecord> {
        let examples = std::mem::take(&mut self.prepared.examples);

        let trained = panic::catch_unwind(AssertUnwindSafe(|| {
            run_training(
                &self.prepared.architecture,
                &self.prepared.plan,
                examples,
                &mut |report| self.checkpoint(report),
            )
        }))
        .unwrap_or_else(|_| Err(CoreError::Storage(anyhow!("training panicked"))));

        match trained.and_then(|t| self.finalise(t)) {
            Ok(record) => {
                self.guard.finish(SessionPhase::Ready, None);
                tracing::info!("Training complete! Model {} is ready", self.model_id);
                Ok(record)
            }
            Err(e) => {
                tracing::error!("Training of model {} failed: {}", self.model_id, e);
                if let Err(store_err) = self.models.update_status(
                    self.model_id,
                    ModelStatus::Failed,
                    None,
                    Some(e.to_string()),
                ) {
                    tracing::warn!("Could not mark model {} failed: {:#}", self.model_id, store_err);
                }
                self.guard.finish(SessionPhase::Failed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Per-epoch persistence. Failures are logged, never fatal.
    fn checkpoint(&self, report: &EpochReport) {
        let progress = EpochProgress {
            current_epoch: report.epoch,
            loss:          report.loss,
            accuracy:      report.accuracy,
        };
        if let Err(e) = self.models.update_progress(self.model_id, progress) {
            tracing::warn!("Epoch {}: could not update model {}: {:#}", report.epoch, self.model_id, e);
        }

        let metric = TrainingMetric::new(self.model_id, report.epoch, report.loss, report.accuracy);
        if let Err(e) = self.metrics.append(&metric) {
            tracing::warn!("Epoch {}: could not record metric: {:#}", report.epoch, e);
        }

        self.guard.report_epoch(report.epoch, report.loss);
    }

    /// Persist weights + vocabulary, mark ready, promote.
    fn finalise(&self, trained: TrainedModel) -> CoreResult<ModelRecord> {
        let params  = trained.model.parameters()?;
        let weights = weight_codec::serialize(&params)?;
        let vocab   = serde_json::to_string(&self.prepared.vocabulary)
            .map_err(|e| CoreError::Storage(anyhow!("cannot encode vocabulary: {e}")))?;

        self.models.save_weights(self.model_id, &weights, &vocab)?;
        let last_loss = trained.last_report.map(|r| r.loss);
        self.models
            .update_status(self.model_id, ModelStatus::Ready, last_loss, None)?;

        let record = self
            .models
            .get_model(self.model_id)?
            .ok_or_else(|| CoreError::Storage(anyhow!("model {} vanished from the store", self.model_id)))?;

        // Promotion is the last step: nothing after it may fail.
        self.guard.session().promote(Inferencer::new(
            self.model_id,
            trained.model,
            self.prepared.vocabulary.clone(),
            self.prepared.architecture.clone(),
        ));
        Ok(record)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model_record::ModelStatus;
    use crate::infra::memory_store::MemoryStore;

    #[test]
    fn test_epoch_policy_boundaries() {
        assert_eq!(calculate_epochs(0), 0);
        assert_eq!(calculate_epochs(4_999), 0);
        assert_eq!(calculate_epochs(5_000), 100);
        assert_eq!(calculate_epochs(19_999), 100);
        assert_eq!(calculate_epochs(20_000), 60);
        assert_eq!(calculate_epochs(99_999), 60);
        assert_eq!(calculate_epochs(100_000), 50);
        assert_eq!(calculate_epochs(499_999), 50);
        assert_eq!(calculate_epochs(500_000), 30);
        assert_eq!(calculate_epochs(999_999), 30);
        assert_eq!(calculate_epochs(1_000_000), 25);
    }

    #[test]
    fn test_batch_size_policy() {
        assert_eq!(batch_size_for(100_000), 128);
        assert_eq!(batch_size_for(100_001), 256);
    }

    #[test]
    fn test_default_config_matches_architecture() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.architecture(50).parameter_shapes(), CharRnnConfig::for_vocab(50).parameter_shapes());
        assert!((cfg.learning_rate - 0.001).abs() < 1e-12);
        assert_eq!(cfg.reply_length, 150);
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "hidden_units": 32, "seed": 5 }"#).unwrap();

        let cfg = TrainConfig::load(&path).unwrap();
        assert_eq!(cfg.hidden_units, 32);
        assert_eq!(cfg.seed, Some(5));
        assert_eq!(cfg.embedding_dim, 64);
    }

    /// Small network so the full epoch policy runs quickly on the CPU.
    fn fast_config() -> TrainConfig {
        TrainConfig {
            embedding_dim: 8,
            hidden_units:  8,
            ffn_units:     16,
            seed:          Some(7),
            ..TrainConfig::default()
        }
    }

    fn use_case(store: &Arc<MemoryStore>, session: &TrainingSession) -> TrainUseCase {
        TrainUseCase::new(
            fast_config(),
            session.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        )
    }

    fn text_of_len(len: usize) -> String {
        "the quick brown fox jumps over the lazy dog. "
            .chars()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn test_small_corpus_is_rejected_before_any_model_exists() {
        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let file    = store.add_file("tiny.txt", &text_of_len(2_000));

        let result = use_case(&store, &session).start(TrainRequest {
            file_ids: vec![file],
            ..TrainRequest::default()
        });

        match result {
            Err(CoreError::InsufficientData(msg)) => assert!(msg.contains("too small"), "{msg}"),
            other => panic!("expected InsufficientData, got {:?}", other.map(|h| h.model_id)),
        }
        assert!(store.list_models().unwrap().is_empty());
        assert!(!session.is_training());
    }

    #[test]
    fn test_missing_files_are_insufficient() {
        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let result  = use_case(&store, &session).start(TrainRequest {
            file_ids: vec![41, 42],
            ..TrainRequest::default()
        });
        assert!(matches!(result, Err(CoreError::InsufficientData(_))));
        assert!(!session.is_training());
    }

    #[test]
    fn test_second_request_is_rejected_while_training() {
        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let file    = store.add_file("a.txt", &text_of_len(6_000));
        let trainer = use_case(&store, &session);

        let first = trainer
            .start(TrainRequest { file_ids: vec![file], epochs: Some(2), ..TrainRequest::default() })
            .unwrap();
        let before = session.status();

        let second = trainer.start(TrainRequest { file_ids: vec![file], ..TrainRequest::default() });
        match second {
            Err(CoreError::TrainingAlreadyActive { model_id }) => assert_eq!(model_id, first.model_id),
            other => panic!("expected TrainingAlreadyActive, got {:?}", other.map(|h| h.model_id)),
        }
        assert_eq!(session.status().model_id, before.model_id);
        assert_eq!(store.list_models().unwrap().len(), 1);

        let record = first.wait().unwrap();
        assert_eq!(record.status, ModelStatus::Ready);
        assert_eq!(record.current_epoch, 2);
        assert!(!session.is_training());
    }

    #[test]
    fn test_explicit_epochs_override_policy() {
        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let file    = store.add_file("a.txt", &text_of_len(5_500));

        let record = use_case(&store, &session)
            .execute(TrainRequest { file_ids: vec![file], epochs: Some(3), ..TrainRequest::default() })
            .unwrap();
        assert_eq!(record.total_epochs, 3);
        assert_eq!(store.metrics_for(record.id).unwrap().len(), 3);
    }

    #[test]
    fn test_end_to_end_policy_run_then_generate() {
        use crate::application::generate_use_case::GenerateUseCase;

        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let a = store.add_file("a.txt", &text_of_len(3_500));
        let b = store.add_file("b.txt", &text_of_len(2_500));

        let record = use_case(&store, &session)
            .execute(TrainRequest { file_ids: vec![a, b], ..TrainRequest::default() })
            .unwrap();

        assert_eq!(record.status, ModelStatus::Ready);
        assert_eq!(record.total_epochs, 100);
        assert_eq!(record.current_epoch, 100);
        assert!(record.has_artifacts());

        let metrics = store.metrics_for(record.id).unwrap();
        assert_eq!(metrics.iter().map(|m| m.epoch).collect::<Vec<_>>(), (1..=100).collect::<Vec<_>>());
        assert!(metrics.iter().all(|m| m.loss >= 0.0));

        let status = session.status();
        assert_eq!(status.status, SessionPhase::Ready);
        assert!(!status.active);
        assert_eq!(session.active_model_id(), Some(record.id));

        let chat  = GenerateUseCase::new(fast_config(), session.clone(), store.clone());
        let reply = chat.reply("the quick", None).unwrap();
        assert_eq!(reply.chars().count(), 150);
    }

    struct FailingMetrics;

    impl MetricSink for FailingMetrics {
        fn append(&self, _metric: &TrainingMetric) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }

        fn metrics_for(&self, _model_id: ModelId) -> anyhow::Result<Vec<TrainingMetric>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_metric_failures_do_not_abort_the_run() {
        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let file    = store.add_file("a.txt", &text_of_len(5_000));

        let trainer = TrainUseCase::new(
            fast_config(),
            session.clone(),
            store.clone(),
            store.clone(),
            Arc::new(FailingMetrics),
        );
        let record = trainer
            .execute(TrainRequest { file_ids: vec![file], epochs: Some(1), ..TrainRequest::default() })
            .unwrap();
        assert_eq!(record.status, ModelStatus::Ready);
    }

    #[test]
    fn test_non_finite_learning_rate_marks_model_failed() {
        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let file    = store.add_file("a.txt", &text_of_len(5_000));

        let trainer = TrainUseCase::new(
            TrainConfig { learning_rate: f64::NAN, ..fast_config() },
            session.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let result = trainer.execute(TrainRequest {
            file_ids: vec![file],
            epochs:   Some(2),
            ..TrainRequest::default()
        });
        assert!(matches!(result, Err(CoreError::NumericalInstability { .. })));

        let models = store.list_models().unwrap();
        assert_eq!(models[0].status, ModelStatus::Failed);
        assert!(models[0].failure_reason.is_some());
        assert!(!session.has_model());
        assert_eq!(session.status().status, SessionPhase::Failed);
        assert!(!session.is_training());
    }

    /// Delegates to a `MemoryStore` but cannot read records back.
    struct UnreadableModels(Arc<MemoryStore>);

    impl ModelStore for UnreadableModels {
        fn create_model(&self, draft: NewModel) -> anyhow::Result<ModelRecord> {
            self.0.create_model(draft)
        }

        fn update_progress(&self, id: ModelId, progress: EpochProgress) -> anyhow::Result<()> {
            self.0.update_progress(id, progress)
        }

        fn update_status(
            &self,
            id:        ModelId,
            status:    ModelStatus,
            last_loss: Option<f64>,
            reason:    Option<String>,
        ) -> anyhow::Result<()> {
            self.0.update_status(id, status, last_loss, reason)
        }

        fn save_weights(&self, id: ModelId, weights: &str, vocabulary: &str) -> anyhow::Result<()> {
            self.0.save_weights(id, weights, vocabulary)
        }

        fn get_model(&self, _id: ModelId) -> anyhow::Result<Option<ModelRecord>> {
            Err(anyhow!("read timed out"))
        }

        fn ready_model(&self) -> anyhow::Result<Option<ModelRecord>> {
            self.0.ready_model()
        }

        fn list_models(&self) -> anyhow::Result<Vec<ModelRecord>> {
            self.0.list_models()
        }
    }

    #[test]
    fn test_failed_finalise_keeps_previous_model_inactive() {
        let store   = Arc::new(MemoryStore::new());
        let session = TrainingSession::new();
        let file    = store.add_file("a.txt", &text_of_len(5_200));

        let trainer = TrainUseCase::new(
            fast_config(),
            session.clone(),
            store.clone(),
            Arc::new(UnreadableModels(store.clone())),
            store.clone(),
        );
        let result = trainer.execute(TrainRequest {
            file_ids: vec![file],
            epochs:   Some(1),
            ..TrainRequest::default()
        });

        assert!(matches!(result, Err(CoreError::Storage(_))));
        assert_eq!(store.list_models().unwrap()[0].status, ModelStatus::Failed);
        assert_eq!(session.active_model_id(), None);
        assert_eq!(session.status().status, SessionPhase::Failed);
        assert!(!session.is_training());
    }

    #[test]
    fn test_abandoned_model_is_marked_failed() {
        let store  = MemoryStore::new();
        let record = store
            .create_model(NewModel { name: "m".into(), config: "{}".into(), total_epochs: 1 })
            .unwrap();

        let err = abandon_model(&store, record.id, "no threads left".into());
        assert!(err.to_string().contains("no threads left"));

        let stored = store.get_model(record.id).unwrap().unwrap();
        assert_eq!(stored.status, ModelStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("no threads left"));
    }
}
