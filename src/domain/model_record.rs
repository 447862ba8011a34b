// ============================================================
// Layer 3 — Model Entity, Metrics and Status Snapshot
// ============================================================
// ModelRecord is created when a training run starts, updated
// after every epoch and finalised to `ready` or `failed`.
// TrainingMetric rows are append-only. TrainingStatus is the
// pollable snapshot, always replaced as a whole.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub type ModelId = u64;
pub type FileId = u64;

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lifecycle of one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Training,
    Ready,
    Failed,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelStatus::Training => "training",
            ModelStatus::Ready    => "ready",
            ModelStatus::Failed   => "failed",
        };
        f.write_str(s)
    }
}

/// One trained (or training) model as the store sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub id:             ModelId,
    pub name:           String,
    pub status:         ModelStatus,
    /// Architecture config (JSON), needed to rebuild the network on restore.
    pub config:         String,
    pub current_epoch:  usize,
    pub total_epochs:   usize,
    pub last_loss:      Option<f64>,
    pub accuracy:       Option<f64>,
    pub created_at:     u64,
    /// Weight blob, see `infra::weight_codec`.
    pub model_weights:  Option<String>,
    /// Vocabulary blob, see `domain::vocabulary`.
    pub tokenizer_data: Option<String>,
    pub failure_reason: Option<String>,
}

impl ModelRecord {
    pub fn new(id: ModelId, draft: NewModel) -> Self {
        Self {
            id,
            name:           draft.name,
            status:         ModelStatus::Training,
            config:         draft.config,
            current_epoch:  0,
            total_epochs:   draft.total_epochs,
            last_loss:      None,
            accuracy:       None,
            created_at:     unix_now(),
            model_weights:  None,
            tokenizer_data: None,
            failure_reason: None,
        }
    }

    pub fn apply_progress(&mut self, progress: EpochProgress) {
        self.current_epoch = progress.current_epoch;
        self.last_loss     = Some(progress.loss);
        self.accuracy      = Some(progress.accuracy);
    }

    pub fn apply_status(&mut self, status: ModelStatus, last_loss: Option<f64>, reason: Option<String>) {
        self.status = status;
        if last_loss.is_some() {
            self.last_loss = last_loss;
        }
        self.failure_reason = reason;
    }

    /// True once both blobs needed for inference are present.
    pub fn has_artifacts(&self) -> bool {
        self.model_weights.is_some() && self.tokenizer_data.is_some()
    }
}

/// What a caller supplies to create a model record.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name:         String,
    pub config:       String,
    pub total_epochs: usize,
}

/// Per-epoch fields written onto the model record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochProgress {
    pub current_epoch: usize,
    pub loss:          f64,
    pub accuracy:      f64,
}

/// One row of the append-only metric trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetric {
    pub model_id:  ModelId,
    pub epoch:     usize,
    pub loss:      f64,
    pub accuracy:  f64,
    pub timestamp: u64,
}

impl TrainingMetric {
    pub fn new(model_id: ModelId, epoch: usize, loss: f64, accuracy: f64) -> Self {
        Self { model_id, epoch, loss, accuracy, timestamp: unix_now() }
    }
}

/// Phase reported by the status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Training,
    Ready,
    Failed,
}

/// Pollable progress snapshot of the current (or last) training run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    pub active:        bool,
    pub model_id:      ModelId,
    pub status:        SessionPhase,
    pub current_epoch: usize,
    pub total_epochs:  usize,
    pub loss:          f64,
    pub file_ids:      Vec<FileId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:         Option<String>,
}

/// A stored corpus file without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id:          FileId,
    pub filename:    String,
    pub uploaded_at: u64,
}

/// One line of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role:      String,
    pub content:   String,
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self { role: role.to_string(), content: content.to_string(), timestamp: unix_now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_training() {
        let r = ModelRecord::new(
            7,
            NewModel { name: "m".into(), config: "{}".into(), total_epochs: 60 },
        );
        assert_eq!(r.status, ModelStatus::Training);
        assert_eq!(r.current_epoch, 0);
        assert_eq!(r.total_epochs, 60);
        assert!(!r.has_artifacts());
    }

    #[test]
    fn test_status_snapshot_wire_names() {
        let s = TrainingStatus {
            active: true,
            model_id: 2,
            status: SessionPhase::Training,
            current_epoch: 3,
            total_epochs: 100,
            loss: 1.5,
            file_ids: vec![1, 2],
            error: None,
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["modelId"], 2);
        assert_eq!(json["status"], "training");
        assert_eq!(json["fileIds"], serde_json::json!([1, 2]));
        assert!(json.get("error").is_none());
    }
}
