// ============================================================
// Layer 2 — FilesUseCase
// ============================================================
// Adds, lists and removes corpus files. A file feeding the run in
// progress cannot be removed until that run ends.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::application::session::TrainingSession;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::model_record::{FileEntry, FileId};
use crate::domain::traits::CorpusLibrary;

pub struct FilesUseCase {
    session: TrainingSession,
    library: Arc<dyn CorpusLibrary>,
}

impl FilesUseCase {
    pub fn new(session: TrainingSession, library: Arc<dyn CorpusLibrary>) -> Self {
        Self { session, library }
    }

    /// Read a UTF-8 text file from disk and store it under its file name.
    pub fn add_path(&self, path: &Path) -> CoreResult<FileId> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read '{}' as UTF-8 text", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.add(&filename, &content)
    }

    pub fn add(&self, filename: &str, content: &str) -> CoreResult<FileId> {
        let id = self.library.add_file(filename, content)?;
        tracing::info!("Stored '{}' as file {} ({} chars)", filename, id, content.chars().count());
        Ok(id)
    }

    pub fn list(&self) -> CoreResult<Vec<FileEntry>> {
        Ok(self.library.list_files()?)
    }

    /// Remove a file unless the active run is using it.
    pub fn remove(&self, id: FileId) -> CoreResult<bool> {
        if self.session.is_file_in_use(id) {
            return Err(CoreError::FileInUse { file_id: id });
        }
        Ok(self.library.remove_file(id)?)
    }
}
