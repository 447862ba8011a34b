// ============================================================
// Layer 4 — Corpus Assembly
// ============================================================
// Joins the selected files, in the caller's order, with a single
// newline between them. Files the provider no longer has are
// skipped with a warning.

use anyhow::Result;

use crate::domain::model_record::FileId;
use crate::domain::traits::CorpusProvider;

/// The concatenated training text and the ids that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub text:     String,
    pub file_ids: Vec<FileId>,
}

impl Corpus {
    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// True when nothing but whitespace was collected.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Fetch every id from `provider` and join the texts with `"\n"`.
pub fn assemble(provider: &dyn CorpusProvider, file_ids: &[FileId]) -> Result<Corpus> {
    let mut parts = Vec::with_capacity(file_ids.len());
    let mut found = Vec::with_capacity(file_ids.len());

    for &id in file_ids {
        match provider.file_text(id)? {
            Some(text) => {
                tracing::debug!("Corpus file {} ({} chars)", id, text.chars().count());
                parts.push(text);
                found.push(id);
            }
            None => tracing::warn!("Corpus file {} not found, skipping", id),
        }
    }

    Ok(Corpus { text: parts.join("\n"), file_ids: found })
}
