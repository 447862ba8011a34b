// ============================================================
// Layer 5 — Inferencer
// ============================================================
// A trained network plus the vocabulary it was trained with.
// This pair is the unit that gets promoted into the session's
// active slot and swapped as a whole.

use burn::prelude::*;

use crate::data::batcher::WindowBatcher;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::model_record::{ModelId, ModelRecord};
use crate::domain::vocabulary::Vocabulary;
use crate::infra::weight_codec;
use crate::ml::model::{CharRnn, CharRnnConfig};
use crate::ml::sampler::NextCharModel;
use crate::ml::{default_device, InferBackend};

pub struct Inferencer {
    pub model_id: ModelId,
    model:        CharRnn<InferBackend>,
    vocabulary:   Vocabulary,
    config:       CharRnnConfig,
    batcher:      WindowBatcher<InferBackend>,
}

impl Inferencer {
    pub fn new(
        model_id:   ModelId,
        model:      CharRnn<InferBackend>,
        vocabulary: Vocabulary,
        config:     CharRnnConfig,
    ) -> Self {
        Self { model_id, model, vocabulary, config, batcher: WindowBatcher::new(default_device()) }
    }

    /// Rebuild the network described by a stored record and load its weights.
    pub fn from_record(record: &ModelRecord) -> CoreResult<Self> {
        let (Some(weights), Some(vocab_json)) = (&record.model_weights, &record.tokenizer_data) else {
            return Err(CoreError::CorruptWeights(format!(
                "model {} has no stored weights or vocabulary",
                record.id
            )));
        };

        let config: CharRnnConfig = serde_json::from_str(&record.config)
            .map_err(|e| CoreError::CorruptWeights(format!("unreadable model config: {e}")))?;
        let vocabulary: Vocabulary = serde_json::from_str(vocab_json)
            .map_err(|e| CoreError::CorruptWeights(format!("unreadable vocabulary: {e}")))?;

        if vocabulary.len() != config.vocab_size {
            return Err(CoreError::CorruptWeights(format!(
                "vocabulary has {} characters but the model expects {}",
                vocabulary.len(),
                config.vocab_size
            )));
        }

        let params = weight_codec::deserialize(weights, &config.parameter_shapes())?;
        let model  = config
            .init::<InferBackend>(&default_device())
            .load_parameters(params)?;

        tracing::info!(
            "Model {} restored ({} characters in vocabulary)",
            record.id,
            vocabulary.len()
        );
        Ok(Self::new(record.id, model, vocabulary, config))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn window_len(&self) -> usize {
        self.config.seq_length
    }

    /// Probability distribution over the vocabulary for one window.
    pub fn predict(&self, window: &[u32]) -> CoreResult<Vec<f32>> {
        let input = self.batcher.single(window);
        self.model
            .predict(input)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| CoreError::CorruptWeights(format!("cannot read prediction: {e:?}")))
    }
}

impl NextCharModel for Inferencer {
    fn next_distribution(&self, window: &[u32]) -> CoreResult<Vec<f32>> {
        self.predict(window)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model_record::NewModel;

    fn record_for(config: &CharRnnConfig, vocab: &Vocabulary) -> ModelRecord {
        let model  = config.init::<InferBackend>(&default_device());
        let params = model.parameters().unwrap();
        let mut r  = ModelRecord::new(
            1,
            NewModel {
                name:         "t".into(),
                config:       serde_json::to_string(config).unwrap(),
                total_epochs: 1,
            },
        );
        r.model_weights  = Some(weight_codec::serialize(&params).unwrap());
        r.tokenizer_data = Some(serde_json::to_string(vocab).unwrap());
        r
    }

    fn tiny(vocab: usize) -> CharRnnConfig {
        CharRnnConfig::for_vocab(vocab)
            .with_embedding_dim(4)
            .with_hidden_units(4)
            .with_ffn_units(8)
    }

    #[test]
    fn test_restore_and_predict() {
        let vocab = Vocabulary::build("abcdef");
        let inf   = Inferencer::from_record(&record_for(&tiny(6), &vocab)).unwrap();
        let probs = inf.predict(&vec![0; inf.window_len()]).unwrap();
        assert_eq!(probs.len(), 6);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_vocabulary_size_mismatch_is_corrupt() {
        let vocab = Vocabulary::build("abcde");
        let r     = record_for(&tiny(6), &vocab);
        assert!(matches!(Inferencer::from_record(&r), Err(CoreError::CorruptWeights(_))));
    }

    #[test]
    fn test_missing_artifacts_is_corrupt() {
        let mut r = record_for(&tiny(6), &Vocabulary::build("abcdef"));
        r.model_weights = None;
        assert!(matches!(Inferencer::from_record(&r), Err(CoreError::CorruptWeights(_))));
    }
}
