// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles the examples once and holds out the tail as the
// validation set. Training order is reshuffled every epoch by the
// trainer; the held-out set stays fixed for the whole run.

use rand::seq::SliceRandom;
use rand::Rng;

/// Fraction of examples held out for validation.
pub const VALIDATION_FRACTION: f64 = 0.05;

/// Shuffle `samples` with `rng` and split into (train, validation).
///
/// `train_fraction` is clamped so neither side can exceed the input.
pub fn split_train_val<T, R: Rng + ?Sized>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    rng:            &mut R,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_correct_split_sizes() {
        let mut rng      = StdRng::seed_from_u64(1);
        let items: Vec<usize> = (0..100).collect();
        let (train, val) = split_train_val(items, 1.0 - VALIDATION_FRACTION, &mut rng);
        assert_eq!(train.len(), 95);
        assert_eq!(val.len(),   5);
    }

    #[test]
    fn test_all_items_preserved() {
        let mut rng      = StdRng::seed_from_u64(2);
        let items: Vec<usize> = (0..50).collect();
        let (train, val) = split_train_val(items, 0.7, &mut rng);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_dataset() {
        let mut rng      = StdRng::seed_from_u64(3);
        let items: Vec<usize> = Vec::new();
        let (train, val) = split_train_val(items, 0.95, &mut rng);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val((0..40).collect::<Vec<u32>>(), 0.9, &mut StdRng::seed_from_u64(9));
        let b = split_train_val((0..40).collect::<Vec<u32>>(), 0.9, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
