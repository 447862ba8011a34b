// ============================================================
// Layer 6 — Weight Codec
// ============================================================
// Model parameters ↔ transport-safe text blob.
//
// Blob format (JSON), one record per tensor in canonical order:
//
//   [
//     { "values": [0.01, -0.3, ...], "shape": [40, 64] },   ← embedding
//     { "values": [...],             "shape": [64, 512] },  ← recurrent 1 input kernel
//     ...
//   ]
//
// Decoding checks the blob against the shapes of the architecture
// it is about to be loaded into; any disagreement is CorruptWeights.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{CoreError, CoreResult};

/// One flattened parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTensor {
    /// Row-major contents.
    pub values: Vec<f32>,
    pub shape:  Vec<usize>,
}

impl ParameterTensor {
    /// Number of values the shape calls for.
    pub fn expected_len(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Encode `params` as a JSON blob.
pub fn serialize(params: &[ParameterTensor]) -> CoreResult<String> {
    serde_json::to_string(params)
        .map_err(|e| CoreError::CorruptWeights(format!("cannot encode weights: {e}")))
}

/// Decode a blob and validate it against `expected_shapes`.
pub fn deserialize(blob: &str, expected_shapes: &[Vec<usize>]) -> CoreResult<Vec<ParameterTensor>> {
    let params: Vec<ParameterTensor> = serde_json::from_str(blob)
        .map_err(|e| CoreError::CorruptWeights(format!("unreadable weight blob: {e}")))?;
    check_shapes(&params, expected_shapes)?;
    Ok(params)
}

/// Verify tensor count, every shape, and every value count.
pub fn check_shapes(params: &[ParameterTensor], expected_shapes: &[Vec<usize>]) -> CoreResult<()> {
    if params.len() != expected_shapes.len() {
        return Err(CoreError::CorruptWeights(format!(
            "expected {} tensors, found {}",
            expected_shapes.len(),
            params.len()
        )));
    }

    for (i, (p, shape)) in params.iter().zip(expected_shapes).enumerate() {
        if &p.shape != shape {
            return Err(CoreError::CorruptWeights(format!(
                "tensor {i}: expected shape {shape:?}, found {:?}",
                p.shape
            )));
        }
        if p.values.len() != p.expected_len() {
            return Err(CoreError::CorruptWeights(format!(
                "tensor {i}: shape {:?} needs {} values, found {}",
                p.shape,
                p.expected_len(),
                p.values.len()
            )));
        }
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<ParameterTensor> {
        vec![
            ParameterTensor { values: vec![0.5, -1.25, 3.0e-7, 42.0, 0.0, -0.1], shape: vec![2, 3] },
            ParameterTensor { values: vec![1.0, 2.0, 3.0], shape: vec![3] },
        ]
    }

    fn shapes() -> Vec<Vec<usize>> {
        vec![vec![2, 3], vec![3]]
    }

    #[test]
    fn test_round_trip() {
        let blob = serialize(&params()).unwrap();
        let back = deserialize(&blob, &shapes()).unwrap();
        for (a, b) in back.iter().zip(params()) {
            assert_eq!(a.shape, b.shape);
            for (x, y) in a.values.iter().zip(&b.values) {
                assert!((x - y).abs() <= f32::EPSILON * y.abs().max(1.0));
            }
        }
    }

    #[test]
    fn test_blob_lists_values_and_shape() {
        let blob = serialize(&params()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(v[1]["shape"], serde_json::json!([3]));
        assert_eq!(v[1]["values"], serde_json::json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_wrong_count_is_corrupt() {
        let blob = serialize(&params()[..1]).unwrap();
        assert!(matches!(deserialize(&blob, &shapes()), Err(CoreError::CorruptWeights(_))));
    }

    #[test]
    fn test_wrong_shape_is_corrupt() {
        let blob = serialize(&params()).unwrap();
        let other = vec![vec![3, 2], vec![3]];
        assert!(matches!(deserialize(&blob, &other), Err(CoreError::CorruptWeights(_))));
    }

    #[test]
    fn test_truncated_values_are_corrupt() {
        let mut p = params();
        p[0].values.pop();
        let blob = serialize(&p).unwrap();
        assert!(matches!(deserialize(&blob, &shapes()), Err(CoreError::CorruptWeights(_))));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(deserialize("not json", &shapes()), Err(CoreError::CorruptWeights(_))));
    }
}
