// ============================================================
// Layer 3 — Core Errors
// ============================================================
// Every failure the model lifecycle can report. Validation-class
// errors reject a request before any model record exists; the
// rest mark an in-flight model as `failed`.

/// Errors from the training / inference engine.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The corpus is too small, or produced no training windows.
    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    /// Another run already holds the training slot.
    #[error("training already in progress (model {model_id})")]
    TrainingAlreadyActive {
        /// The model currently being trained.
        model_id: u64,
    },

    /// Stored parameters do not fit the architecture they are loaded into.
    #[error("corrupt weights: {0}")]
    CorruptWeights(String),

    /// No trained model is loaded.
    #[error("model not trained yet")]
    ModelNotReady,

    /// Loss became NaN or infinite.
    #[error("numerical instability at epoch {epoch}: loss={loss}")]
    NumericalInstability {
        /// Epoch (1-based) in which the loss diverged.
        epoch: usize,
        /// The offending loss value.
        loss: f64,
    },

    /// The file feeds the training run in progress.
    #[error("file {file_id} is part of the training run in progress")]
    FileInUse {
        /// The protected file.
        file_id: u64,
    },

    /// A store or sink failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        let e = CoreError::InsufficientData("Text is too small".into());
        assert_eq!(e.to_string(), "insufficient training data: Text is too small");
        assert_eq!(CoreError::ModelNotReady.to_string(), "model not trained yet");
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let e = CoreError::from(anyhow::anyhow!("disk full"));
        assert_eq!(e.to_string(), "disk full");
    }
}
