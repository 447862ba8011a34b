// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From selected file ids to tensor batches:
//
//   file ids
//       │
//       ▼
//   corpus        → fetch + join texts with "\n"
//       │
//       ▼
//   Vocabulary    → characters to ids (domain layer)
//       │
//       ▼
//   windowing     → (30-id window, next id) examples
//       │
//       ▼
//   splitter      → 95 % train / 5 % validation
//       │
//       ▼
//   batcher       → [batch, 30] Int tensors + [batch] targets

/// Fetches and concatenates corpus files
pub mod corpus;

/// Slides a fixed window over the encoded corpus
pub mod windowing;

/// Shuffles and splits examples into train/validation sets
pub mod splitter;

/// Stacks examples into Burn tensors
pub mod batcher;
