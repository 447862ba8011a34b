// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
//   weight_codec.rs    — parameters ↔ JSON blob, shape checks
//   memory_store.rs    — all storage traits, in process memory
//   directory_store.rs — all storage traits, on disk
//   metrics.rs         — append-only metrics CSV used by the
//                        directory store

pub mod directory_store;
pub mod memory_store;
pub mod metrics;
pub mod weight_codec;
