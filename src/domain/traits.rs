// ============================================================
// Layer 3 — Core Traits (Storage Seams)
// ============================================================
// The engine never touches a database or a directory directly.
// It consumes these traits; `infra` provides an in-memory and a
// directory-backed implementation of each.

use anyhow::Result;

use crate::domain::model_record::{
    ChatMessage, EpochProgress, FileEntry, FileId, ModelId, ModelRecord, ModelStatus, NewModel,
    TrainingMetric,
};

// ─── CorpusProvider ───────────────────────────────────────────────────────────
/// Source of training text, addressed by file id.
pub trait CorpusProvider: Send + Sync {
    /// Raw text of one file, or `None` if it no longer exists.
    fn file_text(&self, id: FileId) -> Result<Option<String>>;
}

/// A corpus provider that also manages its files.
pub trait CorpusLibrary: CorpusProvider {
    fn add_file(&self, filename: &str, content: &str) -> Result<FileId>;

    /// Files without content, newest first.
    fn list_files(&self) -> Result<Vec<FileEntry>>;

    /// Returns false if the id was unknown.
    fn remove_file(&self, id: FileId) -> Result<bool>;
}

// ─── ModelStore ───────────────────────────────────────────────────────────────
/// Persistence for model records and their trained artifacts.
pub trait ModelStore: Send + Sync {
    /// Insert a new record in `training` state and return it.
    fn create_model(&self, draft: NewModel) -> Result<ModelRecord>;

    fn update_progress(&self, id: ModelId, progress: EpochProgress) -> Result<()>;

    /// Finalise a record. `reason` is kept for `failed` models.
    fn update_status(
        &self,
        id:        ModelId,
        status:    ModelStatus,
        last_loss: Option<f64>,
        reason:    Option<String>,
    ) -> Result<()>;

    fn save_weights(&self, id: ModelId, weights: &str, vocabulary: &str) -> Result<()>;

    fn get_model(&self, id: ModelId) -> Result<Option<ModelRecord>>;

    /// Most recent record whose status is `ready`.
    fn ready_model(&self) -> Result<Option<ModelRecord>>;

    /// All records, newest first.
    fn list_models(&self) -> Result<Vec<ModelRecord>>;
}

// ─── MetricSink ───────────────────────────────────────────────────────────────
/// Append-only per-epoch metric trail.
pub trait MetricSink: Send + Sync {
    fn append(&self, metric: &TrainingMetric) -> Result<()>;

    /// Rows for one model, ordered by epoch.
    fn metrics_for(&self, model_id: ModelId) -> Result<Vec<TrainingMetric>>;
}

// ─── ChatLog ──────────────────────────────────────────────────────────────────
/// Optional transcript of generation requests and replies.
pub trait ChatLog: Send + Sync {
    fn record(&self, role: &str, content: &str) -> Result<()>;

    /// Messages in the order they were recorded.
    fn history(&self) -> Result<Vec<ChatMessage>>;
}
