// ============================================================
// Layer 4 — Window Batcher
// ============================================================
// Stacks N examples into tensors:
//
//   windows: [N, 30]  Int
//   targets: [N]      Int
//
// All windows share the same width, so the flat id vector can be
// reshaped directly without padding.

use burn::prelude::*;

use crate::data::windowing::Example;

/// A batch of examples ready for the forward pass.
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// Context ids — shape: [batch_size, window]
    pub windows: Tensor<B, 2, Int>,

    /// Next-character ids — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Holds the device tensors are created on.
#[derive(Clone, Debug)]
pub struct WindowBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> WindowBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stack `items` into one batch. `items` must be non-empty.
    pub fn batch(&self, items: &[&Example]) -> WindowBatch<B> {
        let batch_size = items.len();
        let window     = items.first().map(|e| e.window.len()).unwrap_or(0);

        let window_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.window.iter().map(|&id| id as i32))
            .collect();

        let targets: Vec<i32> = items.iter().map(|e| e.target as i32).collect();

        let windows = Tensor::<B, 1, Int>::from_ints(window_flat.as_slice(), &self.device)
            .reshape([batch_size, window]);

        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        WindowBatch { windows, targets }
    }

    /// A single window as a [1, window] tensor, for inference.
    pub fn single(&self, window: &[u32]) -> Tensor<B, 2, Int> {
        let flat: Vec<i32> = window.iter().map(|&id| id as i32).collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device).reshape([1, window.len()])
    }
}
