// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Mini-batch Adam over the windowed examples.
//
//   split 95 % / 5 % once (seeded shuffle)
//   for epoch in 1..=epochs:
//       reshuffle training order
//       for each batch: forward → cross-entropy → backward → Adam step
//       evaluate the held-out 5 % on the inner backend (no dropout)
//       checkpoint(report)        ← persistence hook, never aborts
//       yield to other threads
//
// Training runs on TrainBackend (Autodiff<…>); `model.valid()`
// hands back the same weights on InferBackend for evaluation and
// for promotion into the inference slot.

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::batcher::WindowBatcher;
use crate::data::splitter::split_train_val;
use crate::data::windowing::Example;
use crate::domain::errors::{CoreError, CoreResult};
use crate::ml::model::{CharRnn, CharRnnConfig};
use crate::ml::{default_device, InferBackend, TrainBackend};

/// Optimisation settings for one run.
#[derive(Debug, Clone)]
pub struct TrainingPlan {
    pub epochs:              usize,
    pub batch_size:          usize,
    pub learning_rate:       f64,
    pub validation_fraction: f64,
    /// Fixed seed for the split and the shuffles; `None` draws from entropy.
    pub seed:                Option<u64>,
}

/// Metrics for one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// 1-based.
    pub epoch:        usize,
    pub total_epochs: usize,
    /// Mean training cross-entropy over the epoch.
    pub loss:         f64,
    /// Fraction of training windows whose argmax matched the target.
    pub accuracy:     f64,
    pub val_loss:     Option<f64>,
    pub val_accuracy: Option<f64>,
}

/// Result of a finished run.
pub struct TrainedModel {
    pub model:       CharRnn<InferBackend>,
    pub last_report: Option<EpochReport>,
}

pub fn run_training(
    config:     &CharRnnConfig,
    plan:       &TrainingPlan,
    examples:   Vec<Example>,
    checkpoint: &mut dyn FnMut(&EpochReport),
) -> CoreResult<TrainedModel> {
    let device = default_device();
    tracing::debug!("Training on device: {:?}", device);

    let mut rng = match plan.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };

    let (train_set, val_set) =
        split_train_val(examples, 1.0 - plan.validation_fraction, &mut rng);
    if train_set.is_empty() {
        return Err(CoreError::InsufficientData(
            "no training windows left after the validation split".into(),
        ));
    }
    tracing::info!(
        "Training on {} windows, validating on {} (batch_size={})",
        train_set.len(),
        val_set.len(),
        plan.batch_size
    );

    // ── Build model + Adam ────────────────────────────────────────────────────
    let mut model: CharRnn<TrainBackend> = config.init(&device);
    let mut optim = AdamConfig::new().with_epsilon(1e-7).init();

    let train_batcher = WindowBatcher::<TrainBackend>::new(device.clone());
    let val_batcher   = WindowBatcher::<InferBackend>::new(device.clone());

    let batch_size = plan.batch_size.max(1);
    let mut order: Vec<usize> = (0..train_set.len()).collect();
    let mut last_report = None;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=plan.epochs {
        order.shuffle(&mut rng);

        let mut loss_sum = 0.0f64;
        let mut correct  = 0usize;
        let mut seen     = 0usize;

        for chunk in order.chunks(batch_size) {
            let items: Vec<&Example> = chunk.iter().map(|&i| &train_set[i]).collect();
            let batch = train_batcher.batch(&items);

            let (loss, logits) = model.forward_loss(batch.windows, batch.targets.clone());
            let loss_val: f64  = loss.clone().into_scalar().elem::<f64>();
            if !loss_val.is_finite() {
                return Err(CoreError::NumericalInstability { epoch, loss: loss_val });
            }

            loss_sum += loss_val * items.len() as f64;
            correct  += count_correct(logits, batch.targets);
            seen     += items.len();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(plan.learning_rate, model, grads);
        }

        let (val_loss, val_accuracy) = evaluate(&model.valid(), &val_set, &val_batcher, batch_size);

        let report = EpochReport {
            epoch,
            total_epochs: plan.epochs,
            loss:         loss_sum / seen.max(1) as f64,
            accuracy:     correct as f64 / seen.max(1) as f64,
            val_loss,
            val_accuracy,
        };

        tracing::info!(
            "Epoch {:>3}/{} | loss={:.4} | acc={:.2}% | val_loss={} | val_acc={}",
            report.epoch,
            report.total_epochs,
            report.loss,
            report.accuracy * 100.0,
            val_loss.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into()),
            val_accuracy.map(|v| format!("{:.2}%", v * 100.0)).unwrap_or_else(|| "-".into()),
        );

        checkpoint(&report);
        last_report = Some(report);

        std::thread::yield_now();
    }

    Ok(TrainedModel { model: model.valid(), last_report })
}

/// Mean loss and accuracy on the held-out set; `None` when it is empty.
fn evaluate(
    model:      &CharRnn<InferBackend>,
    val_set:    &[Example],
    batcher:    &WindowBatcher<InferBackend>,
    batch_size: usize,
) -> (Option<f64>, Option<f64>) {
    if val_set.is_empty() {
        return (None, None);
    }

    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;

    for chunk in val_set.chunks(batch_size) {
        let items: Vec<&Example> = chunk.iter().collect();
        let batch = batcher.batch(&items);
        let (loss, logits) = model.forward_loss(batch.windows, batch.targets.clone());
        loss_sum += loss.into_scalar().elem::<f64>() * items.len() as f64;
        correct  += count_correct(logits, batch.targets);
    }

    let n = val_set.len() as f64;
    (Some(loss_sum / n), Some(correct as f64 / n))
}

/// argmax(1) returns [batch, 1]; flatten to [batch] before comparing.
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::windowing::make_examples;
    use crate::domain::vocabulary::Vocabulary;

    fn tiny(vocab: usize) -> CharRnnConfig {
        CharRnnConfig::for_vocab(vocab)
            .with_seq_length(8)
            .with_embedding_dim(6)
            .with_hidden_units(8)
            .with_ffn_units(16)
    }

    fn plan(epochs: usize) -> TrainingPlan {
        TrainingPlan {
            epochs,
            batch_size:          16,
            learning_rate:       0.01,
            validation_fraction: 0.05,
            seed:                Some(42),
        }
    }

    #[test]
    fn test_reports_every_epoch() {
        let text  = "abcabcabcabcabcabc".repeat(10);
        let vocab = Vocabulary::build(&text);
        let ex    = make_examples(&vocab.encode(&text), 8, 1).unwrap();

        let mut reports = Vec::new();
        let trained = run_training(&tiny(vocab.len()), &plan(3), ex, &mut |r| reports.push(*r)).unwrap();

        assert_eq!(reports.iter().map(|r| r.epoch).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(reports.iter().all(|r| r.loss >= 0.0 && (0.0..=1.0).contains(&r.accuracy)));
        assert!(reports.iter().all(|r| r.val_loss.is_some()));
        assert_eq!(trained.last_report, reports.last().copied());
    }

    #[test]
    fn test_learns_a_periodic_sequence() {
        let text  = "abcd".repeat(60);
        let vocab = Vocabulary::build(&text);
        let ex    = make_examples(&vocab.encode(&text), 8, 1).unwrap();

        let mut reports = Vec::new();
        run_training(&tiny(vocab.len()), &plan(15), ex, &mut |r| reports.push(*r)).unwrap();

        let first = reports.first().unwrap().loss;
        let last  = reports.last().unwrap().loss;
        assert!(last < first, "loss did not decrease: {first} → {last}");
    }

    #[test]
    fn test_no_examples_is_insufficient() {
        let result = run_training(&tiny(3), &plan(1), Vec::new(), &mut |_| {});
        assert!(matches!(result, Err(CoreError::InsufficientData(_))));
    }
}
