// ============================================================
// Layer 4 — Windowing
// ============================================================
// Turns the encoded corpus into supervised examples:
//
//   corpus:  [a b c d e f g h ...]      window = 3, stride = 2
//   i = 0 →  ([a b c], d)
//   i = 2 →  ([c d e], f)
//   i = 4 →  ([e f g], h)
//
// Large corpora use a coarser stride to bound dataset size.

use crate::domain::errors::{CoreError, CoreResult};

/// Width of the context window fed to the network.
pub const SEQ_LENGTH: usize = 30;

/// Corpora longer than this (in characters) use `LARGE_CORPUS_STRIDE`.
pub const LARGE_CORPUS_THRESHOLD: usize = 100_000;
pub const LARGE_CORPUS_STRIDE: usize = 8;
pub const DEFAULT_STRIDE: usize = 6;

/// One (context, next id) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub window: Vec<u32>,
    pub target: u32,
}

/// Stride to use for a corpus of `corpus_len` characters.
pub fn default_stride(corpus_len: usize) -> usize {
    if corpus_len > LARGE_CORPUS_THRESHOLD {
        LARGE_CORPUS_STRIDE
    } else {
        DEFAULT_STRIDE
    }
}

/// Emit `(corpus[i..i+window], corpus[i+window])` for `i = 0, stride, …`
/// while `i + window < corpus.len()`.
///
/// Fails with `InsufficientData` when no example fits.
pub fn make_examples(corpus: &[u32], window: usize, stride: usize) -> CoreResult<Vec<Example>> {
    if stride == 0 {
        return Err(CoreError::InsufficientData("window stride must be positive".into()));
    }

    let examples: Vec<Example> = (0..)
        .step_by(stride)
        .take_while(|&i| i + window < corpus.len())
        .map(|i| Example {
            window: corpus[i..i + window].to_vec(),
            target: corpus[i + window],
        })
        .collect();

    if examples.is_empty() {
        return Err(CoreError::InsufficientData(format!(
            "Not enough data to create training sequences ({} characters, need at least {})",
            corpus.len(),
            window + 1
        )));
    }

    tracing::debug!(
        "Windowed {} ids into {} examples (window={}, stride={})",
        corpus.len(),
        examples.len(),
        window,
        stride
    );
    Ok(examples)
}
