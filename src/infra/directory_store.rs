// ============================================================
// Layer 6 — Directory Store
// ============================================================
// Implements every storage trait on top of a plain directory so
// the CLI keeps files, models and metrics across invocations.
//
// Layout:
//   <root>/files/index.json   — Vec<FileEntry>
//   <root>/files/<id>.txt     — raw corpus text
//   <root>/models/<id>.json   — one ModelRecord per file
//   <root>/metrics.csv        — see `infra::metrics`
//   <root>/chat.jsonl         — one ChatMessage per line
//
// JSON files are written to `<name>.tmp` and renamed into place,
// so a crash mid-write never leaves a half-written record.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::model_record::{
    unix_now, ChatMessage, EpochProgress, FileEntry, FileId, ModelId, ModelRecord, ModelStatus,
    NewModel, TrainingMetric,
};
use crate::domain::traits::{ChatLog, CorpusLibrary, CorpusProvider, MetricSink, ModelStore};
use crate::infra::metrics::MetricsLogger;

pub struct DirectoryStore {
    root:    PathBuf,
    metrics: MetricsLogger,
    /// Serialises read-modify-write cycles within this process.
    lock:    Mutex<()>,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["files", "models"] {
            let dir = root.join(sub);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Cannot create store dir '{}'", dir.display()))?;
        }
        let metrics = MetricsLogger::new(&root)?;
        tracing::debug!("Opened store at '{}'", root.display());
        Ok(Self { root, metrics, lock: Mutex::new(()) })
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("files").join("index.json")
    }

    fn text_path(&self, id: FileId) -> PathBuf {
        self.root.join("files").join(format!("{id}.txt"))
    }

    fn model_path(&self, id: ModelId) -> PathBuf {
        self.root.join("models").join(format!("{id}.json"))
    }

    fn chat_path(&self) -> PathBuf {
        self.root.join("chat.jsonl")
    }

    fn read_index(&self) -> Result<Vec<FileEntry>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    /// Every model record on disk, oldest first.
    fn read_models(&self) -> Result<Vec<ModelRecord>> {
        let dir = self.root.join("models");
        let mut models = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Cannot list '{}'", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<ModelRecord>(&path) {
                Ok(m)  => models.push(m),
                Err(e) => tracing::warn!("Skipping unreadable model record: {e:#}"),
            }
        }
        models.sort_by_key(|m| m.id);
        Ok(models)
    }

    /// Highest id among `models/<id>.json`, whether or not the file parses.
    fn last_model_id(&self) -> Result<Option<ModelId>> {
        let dir = self.root.join("models");
        let mut last = None;
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Cannot list '{}'", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<ModelId>().ok());
            last = last.max(id);
        }
        Ok(last)
    }

    fn modify_model(&self, id: ModelId, f: impl FnOnce(&mut ModelRecord)) -> Result<()> {
        let _guard = self.lock.lock();
        let path = self.model_path(id);
        if !path.exists() {
            bail!("model {id} not found");
        }
        let mut record: ModelRecord = read_json(&path)?;
        f(&mut record);
        write_json(&path, &record)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Cannot replace '{}'", path.display()))?;
    Ok(())
}

impl CorpusProvider for DirectoryStore {
    fn file_text(&self, id: FileId) -> Result<Option<String>> {
        let path = self.text_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
        Ok(Some(text))
    }
}

impl CorpusLibrary for DirectoryStore {
    fn add_file(&self, filename: &str, content: &str) -> Result<FileId> {
        let _guard = self.lock.lock();
        let mut index = self.read_index()?;
        let id = index.iter().map(|f| f.id).max().unwrap_or(0) + 1;

        let path = self.text_path(id);
        fs::write(&path, content)
            .with_context(|| format!("Cannot write corpus file '{}'", path.display()))?;

        index.push(FileEntry { id, filename: filename.to_string(), uploaded_at: unix_now() });
        write_json(&self.index_path(), &index)?;

        tracing::debug!("Wrote file {} to '{}'", id, path.display());
        Ok(id)
    }

    fn list_files(&self) -> Result<Vec<FileEntry>> {
        let mut index = self.read_index()?;
        index.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(index)
    }

    fn remove_file(&self, id: FileId) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut index = self.read_index()?;
        let before = index.len();
        index.retain(|f| f.id != id);
        if index.len() == before {
            return Ok(false);
        }
        write_json(&self.index_path(), &index)?;

        let path = self.text_path(id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Cannot delete '{}'", path.display()))?;
        }
        Ok(true)
    }
}

impl ModelStore for DirectoryStore {
    fn create_model(&self, draft: NewModel) -> Result<ModelRecord> {
        let _guard = self.lock.lock();
        let id = self.last_model_id()?.unwrap_or(0) + 1;
        let record = ModelRecord::new(id, draft);
        write_json(&self.model_path(id), &record)?;
        Ok(record)
    }

    fn update_progress(&self, id: ModelId, progress: EpochProgress) -> Result<()> {
        self.modify_model(id, |m| m.apply_progress(progress))
    }

    fn update_status(
        &self,
        id:        ModelId,
        status:    ModelStatus,
        last_loss: Option<f64>,
        reason:    Option<String>,
    ) -> Result<()> {
        self.modify_model(id, |m| m.apply_status(status, last_loss, reason))
    }

    fn save_weights(&self, id: ModelId, weights: &str, vocabulary: &str) -> Result<()> {
        self.modify_model(id, |m| {
            m.model_weights  = Some(weights.to_string());
            m.tokenizer_data = Some(vocabulary.to_string());
        })
    }

    fn get_model(&self, id: ModelId) -> Result<Option<ModelRecord>> {
        let path = self.model_path(id);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn ready_model(&self) -> Result<Option<ModelRecord>> {
        Ok(self
            .read_models()?
            .into_iter()
            .rev()
            .find(|m| m.status == ModelStatus::Ready))
    }

    fn list_models(&self) -> Result<Vec<ModelRecord>> {
        let mut models = self.read_models()?;
        models.reverse();
        Ok(models)
    }
}

impl MetricSink for DirectoryStore {
    fn append(&self, metric: &TrainingMetric) -> Result<()> {
        self.metrics.log(metric)
    }

    fn metrics_for(&self, model_id: ModelId) -> Result<Vec<TrainingMetric>> {
        self.metrics.read_model(model_id)
    }
}

impl ChatLog for DirectoryStore {
    fn record(&self, role: &str, content: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let path = self.chat_path();
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        let line = serde_json::to_string(&ChatMessage::new(role, content))?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    fn history(&self) -> Result<Vec<ChatMessage>> {
        let path = self.chat_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("Invalid chat line"))
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> NewModel {
        NewModel { name: name.into(), config: "{}".into(), total_epochs: 5 }
    }

    #[test]
    fn test_files_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = DirectoryStore::open(dir.path()).unwrap();
            store.add_file("a.txt", "hello").unwrap()
        };

        let store = DirectoryStore::open(dir.path()).unwrap();
        assert_eq!(store.file_text(id).unwrap().as_deref(), Some("hello"));
        assert_eq!(store.list_files().unwrap()[0].filename, "a.txt");
    }

    #[test]
    fn test_remove_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        let a = store.add_file("a.txt", "aaa").unwrap();
        let b = store.add_file("b.txt", "bbb").unwrap();
        assert_eq!(b, a + 1);

        assert!(store.remove_file(a).unwrap());
        assert!(!store.remove_file(a).unwrap());
        assert!(store.file_text(a).unwrap().is_none());

        let ids: Vec<_> = store.list_files().unwrap().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![b]);
    }

    #[test]
    fn test_model_lifecycle_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        let m1 = store.create_model(draft("one")).unwrap();
        let m2 = store.create_model(draft("two")).unwrap();
        assert_eq!((m1.id, m2.id), (1, 2));

        store
            .update_progress(m1.id, EpochProgress { current_epoch: 5, loss: 0.7, accuracy: 0.6 })
            .unwrap();
        store.save_weights(m1.id, "[]", "{}").unwrap();
        store.update_status(m1.id, ModelStatus::Ready, Some(0.7), None).unwrap();
        store
            .update_status(m2.id, ModelStatus::Failed, None, Some("loss diverged".into()))
            .unwrap();

        let store = DirectoryStore::open(dir.path()).unwrap();
        let ready = store.ready_model().unwrap().unwrap();
        assert_eq!(ready.id, m1.id);
        assert_eq!(ready.current_epoch, 5);
        assert!(ready.has_artifacts());

        let failed = store.get_model(m2.id).unwrap().unwrap();
        assert_eq!(failed.failure_reason.as_deref(), Some("loss diverged"));
        assert_eq!(store.list_models().unwrap()[0].id, m2.id);
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        let m = store.create_model(draft("ok")).unwrap();
        fs::write(dir.path().join("models").join("9.json"), "{not json").unwrap();

        let models = store.list_models().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, m.id);
    }

    #[test]
    fn test_unreadable_record_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        store.create_model(draft("ok")).unwrap();
        let broken = dir.path().join("models").join("5.json");
        fs::write(&broken, "{not json").unwrap();

        let next = store.create_model(draft("next")).unwrap();
        assert_eq!(next.id, 6);
        assert_eq!(fs::read_to_string(&broken).unwrap(), "{not json");
    }

    #[test]
    fn test_metrics_and_chat() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        store.append(&TrainingMetric::new(1, 1, 2.0, 0.1)).unwrap();
        store.append(&TrainingMetric::new(1, 2, 1.5, 0.2)).unwrap();
        assert_eq!(store.metrics_for(1).unwrap().len(), 2);

        store.record("user", "hi").unwrap();
        store.record("assistant", "hello, world").unwrap();
        let history = store.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "hello, world");
    }
}
