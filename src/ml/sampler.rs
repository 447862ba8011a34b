// ============================================================
// Layer 5 — Sampler
// ============================================================
// Autoregressive generation from a seed string:
//
//   window = last 30 chars of seed, left-padded with spaces
//   repeat `length` times:
//     p      = model(window)
//     p'     = softmax(log(max(p, 1e-10)) / T)
//     c      = categorical draw from p'
//     output += c;  window = window[1..] + c
//
// T < 1 sharpens toward the mode, T = 1 keeps the model's own
// distribution, T > 1 flattens it.

use rand::Rng;

use crate::domain::errors::CoreResult;
use crate::domain::vocabulary::Vocabulary;

/// Probabilities below this are floored before taking the log.
pub const PROB_FLOOR: f32 = 1e-10;

/// Smallest temperature actually used; 0 and negatives are clamped to it.
pub const MIN_TEMPERATURE: f32 = 1e-6;

/// Anything that maps a window of ids to a distribution over the vocabulary.
pub trait NextCharModel {
    fn next_distribution(&self, window: &[u32]) -> CoreResult<Vec<f32>>;
}

/// Rescale `probs` by `temperature` and renormalise.
///
/// The result is non-negative and sums to 1 for any input, including
/// inputs with zero entries.
pub fn apply_temperature(probs: &[f32], temperature: f32) -> Vec<f32> {
    let temperature = if temperature.is_finite() && temperature > 0.0 {
        temperature.max(MIN_TEMPERATURE)
    } else {
        MIN_TEMPERATURE
    };

    let logits: Vec<f32> = probs
        .iter()
        .map(|&p| {
            let p = if p.is_finite() { p } else { 0.0 };
            p.max(PROB_FLOOR).ln() / temperature
        })
        .collect();

    let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();

    exps.into_iter().map(|e| e / sum).collect()
}

/// Walk the cumulative distribution with a uniform draw in [0, 1).
/// Rounding residue falls through to the last index.
pub fn sample_index<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> usize {
    let mut r: f32 = rng.gen();
    for (i, &p) in probs.iter().enumerate() {
        r -= p;
        if r <= 0.0 {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}

/// The right-aligned, space-padded context window for `seed`.
pub fn seed_window(seed: &str, window: usize) -> Vec<char> {
    let chars: Vec<char> = seed.chars().collect();
    let tail  = &chars[chars.len().saturating_sub(window)..];
    let mut out = vec![' '; window - tail.len()];
    out.extend_from_slice(tail);
    out
}

/// Generate exactly `length` characters continuing `seed`.
pub fn generate<M, R>(
    model:       &M,
    vocabulary:  &Vocabulary,
    seed:        &str,
    length:      usize,
    temperature: f32,
    window:      usize,
    rng:         &mut R,
) -> CoreResult<String>
where
    M: NextCharModel + ?Sized,
    R: Rng + ?Sized,
{
    let mut context: Vec<char> = seed_window(seed, window);
    let mut output = String::with_capacity(length);

    for _ in 0..length {
        let text: String = context.iter().collect();
        let ids   = vocabulary.encode(&text);
        let probs = model.next_distribution(&ids)?;
        let probs = apply_temperature(&probs, temperature);
        let next  = vocabulary.decode(sample_index(&probs, rng) as u32);

        output.push(next);
        context.remove(0);
        context.push(next);
    }

    Ok(output)
}
