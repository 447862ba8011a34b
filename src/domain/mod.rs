// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// system works with. Nothing in here touches Burn or the disk.
//
//   vocabulary.rs   — the character tokenizer
//   model_record.rs — model entity, metric rows, status snapshot
//   errors.rs       — the core error taxonomy
//   traits.rs       — the storage seams the engine consumes

pub mod errors;
pub mod model_record;
pub mod traits;
pub mod vocabulary;
