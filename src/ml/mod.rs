// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn framework code except tensor batching lives here.
//
//   recurrent.rs  — LSTM layer with recurrent dropout
//   attention.rs  — parameter-free attention pooling
//   model.rs      — embedding → 2 × LSTM → pooling → dense head
//   trainer.rs    — the epoch loop (Adam, cross-entropy, accuracy)
//   sampler.rs    — temperature scaling and categorical sampling
//   inferencer.rs — a restored model + vocabulary answering requests
//
// Backends: NdArray on the CPU by default; the `wgpu` feature
// switches to the WGPU backend. Training wraps it in Autodiff.

pub mod attention;
pub mod inferencer;
pub mod model;
pub mod recurrent;
pub mod sampler;
pub mod trainer;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

/// Device shared by training and inference.
pub fn default_device() -> <InferBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}
