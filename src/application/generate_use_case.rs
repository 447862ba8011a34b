// ============================================================
// Layer 2 — GenerateUseCase
// ============================================================
// Answers generation requests from the session's active model:
//
//   reply(message, temperature)
//     → record the user line
//     → generate 150 characters seeded by the message
//       (or the canned "not trained yet" text without a model)
//     → record the reply
//
// Also restores the newest loadable `ready` model after a restart.

use std::sync::Arc;

use crate::application::session::TrainingSession;
use crate::application::train_use_case::TrainConfig;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::model_record::ModelStatus;
use crate::domain::traits::{ChatLog, ModelStore};
use crate::ml::inferencer::Inferencer;
use crate::ml::sampler;

/// Reply used when no model has been trained yet.
pub const NOT_TRAINED_REPLY: &str =
    "I haven't been trained yet! Please upload text files and start training first.";

pub struct GenerateUseCase {
    config:   TrainConfig,
    session:  TrainingSession,
    chat_log: Option<Arc<dyn ChatLog>>,
}

impl GenerateUseCase {
    pub fn new(config: TrainConfig, session: TrainingSession, chat_log: Arc<dyn ChatLog>) -> Self {
        Self { config, session, chat_log: Some(chat_log) }
    }

    /// A use case that keeps no transcript.
    pub fn without_log(config: TrainConfig, session: TrainingSession) -> Self {
        Self { config, session, chat_log: None }
    }

    /// Exactly `length` characters continuing `seed`.
    ///
    /// Fails with `ModelNotReady` when nothing has been trained or restored.
    pub fn generate(&self, seed: &str, length: usize, temperature: f32) -> CoreResult<String> {
        self.session.with_inferencer(|inferencer| {
            sampler::generate(
                inferencer,
                inferencer.vocabulary(),
                seed,
                length,
                temperature,
                inferencer.window_len(),
                &mut rand::thread_rng(),
            )
        })
    }

    /// Chat-style request: never reports `ModelNotReady`, it degrades to
    /// the canned reply instead.
    pub fn reply(&self, message: &str, temperature: Option<f32>) -> CoreResult<String> {
        self.log("user", message);

        let temperature = temperature.unwrap_or(self.config.temperature);
        let reply = match self.generate(message, self.config.reply_length, temperature) {
            Ok(text)                       => text,
            Err(CoreError::ModelNotReady)  => NOT_TRAINED_REPLY.to_string(),
            Err(e)                         => return Err(e),
        };

        self.log("assistant", &reply);
        Ok(reply)
    }

    /// Load the newest `ready` model whose artifacts decode cleanly.
    /// Corrupt records are logged and skipped. Returns the loaded id.
    pub fn restore_latest(&self, models: &dyn ModelStore) -> CoreResult<Option<u64>> {
        let candidates = models
            .list_models()?
            .into_iter()
            .filter(|m| m.status == ModelStatus::Ready && m.has_artifacts());

        for record in candidates {
            match Inferencer::from_record(&record) {
                Ok(inferencer) => {
                    self.session.promote(inferencer);
                    return Ok(Some(record.id));
                }
                Err(e) => tracing::error!("Skipping model {}: {}", record.id, e),
            }
        }

        tracing::info!("No saved model found");
        Ok(None)
    }

    fn log(&self, role: &str, content: &str) {
        if let Some(chat_log) = &self.chat_log {
            if let Err(e) = chat_log.record(role, content) {
                tracing::warn!("Could not record {} message: {:#}", role, e);
            }
        }
    }
}
