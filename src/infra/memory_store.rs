// ============================================================
// Layer 6 — In-Memory Store
// ============================================================
// Implements every storage trait behind one mutex. Used by the
// tests and by embedders that keep models for a single process.

use anyhow::{bail, Result};
use parking_lot::Mutex;

use crate::domain::model_record::{
    unix_now, ChatMessage, EpochProgress, FileEntry, FileId, ModelId, ModelRecord, ModelStatus,
    NewModel, TrainingMetric,
};
use crate::domain::traits::{ChatLog, CorpusLibrary, CorpusProvider, MetricSink, ModelStore};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_file_id:  FileId,
    last_model_id: ModelId,
    files:         Vec<(FileEntry, String)>,
    models:        Vec<ModelRecord>,
    metrics:       Vec<TrainingMetric>,
    chat:          Vec<ChatMessage>,
}

impl MemoryState {
    fn model_mut(&mut self, id: ModelId) -> Result<&mut ModelRecord> {
        match self.models.iter_mut().find(|m| m.id == id) {
            Some(m) => Ok(m),
            None    => bail!("model {id} not found"),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file and return its id.
    pub fn add_file(&self, filename: &str, content: &str) -> FileId {
        let mut state = self.state.lock();
        state.last_file_id += 1;
        let entry = FileEntry {
            id:          state.last_file_id,
            filename:    filename.to_string(),
            uploaded_at: unix_now(),
        };
        state.files.push((entry, content.to_string()));
        state.last_file_id
    }
}

impl CorpusProvider for MemoryStore {
    fn file_text(&self, id: FileId) -> Result<Option<String>> {
        let state = self.state.lock();
        Ok(state.files.iter().find(|(f, _)| f.id == id).map(|(_, text)| text.clone()))
    }
}

impl CorpusLibrary for MemoryStore {
    fn add_file(&self, filename: &str, content: &str) -> Result<FileId> {
        Ok(MemoryStore::add_file(self, filename, content))
    }

    fn list_files(&self) -> Result<Vec<FileEntry>> {
        let state = self.state.lock();
        Ok(state.files.iter().rev().map(|(f, _)| f.clone()).collect())
    }

    fn remove_file(&self, id: FileId) -> Result<bool> {
        let mut state = self.state.lock();
        let before = state.files.len();
        state.files.retain(|(f, _)| f.id != id);
        Ok(state.files.len() != before)
    }
}

impl ModelStore for MemoryStore {
    fn create_model(&self, draft: NewModel) -> Result<ModelRecord> {
        let mut state = self.state.lock();
        state.last_model_id += 1;
        let record = ModelRecord::new(state.last_model_id, draft);
        state.models.push(record.clone());
        Ok(record)
    }

    fn update_progress(&self, id: ModelId, progress: EpochProgress) -> Result<()> {
        self.state.lock().model_mut(id)?.apply_progress(progress);
        Ok(())
    }

    fn update_status(
        &self,
        id:        ModelId,
        status:    ModelStatus,
        last_loss: Option<f64>,
        reason:    Option<String>,
    ) -> Result<()> {
        self.state.lock().model_mut(id)?.apply_status(status, last_loss, reason);
        Ok(())
    }

    fn save_weights(&self, id: ModelId, weights: &str, vocabulary: &str) -> Result<()> {
        let mut state = self.state.lock();
        let model = state.model_mut(id)?;
        model.model_weights  = Some(weights.to_string());
        model.tokenizer_data = Some(vocabulary.to_string());
        Ok(())
    }

    fn get_model(&self, id: ModelId) -> Result<Option<ModelRecord>> {
        Ok(self.state.lock().models.iter().find(|m| m.id == id).cloned())
    }

    fn ready_model(&self) -> Result<Option<ModelRecord>> {
        let state = self.state.lock();
        Ok(state
            .models
            .iter()
            .rev()
            .find(|m| m.status == ModelStatus::Ready)
            .cloned())
    }

    fn list_models(&self) -> Result<Vec<ModelRecord>> {
        Ok(self.state.lock().models.iter().rev().cloned().collect())
    }
}

impl MetricSink for MemoryStore {
    fn append(&self, metric: &TrainingMetric) -> Result<()> {
        self.state.lock().metrics.push(metric.clone());
        Ok(())
    }

    fn metrics_for(&self, model_id: ModelId) -> Result<Vec<TrainingMetric>> {
        let state = self.state.lock();
        let mut rows: Vec<TrainingMetric> = state
            .metrics
            .iter()
            .filter(|m| m.model_id == model_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.epoch);
        Ok(rows)
    }
}

impl ChatLog for MemoryStore {
    fn record(&self, role: &str, content: &str) -> Result<()> {
        self.state.lock().chat.push(ChatMessage::new(role, content));
        Ok(())
    }

    fn history(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.state.lock().chat.clone())
    }
}
