// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor code, no file formats.
//
//   session.rs           — training slot, status snapshot, active model
//   train_use_case.rs    — validate → create record → train → promote
//   generate_use_case.rs — temperature sampling, chat replies, restore
//   files_use_case.rs    — corpus file management guarded by the session

pub mod files_use_case;
pub mod generate_use_case;
pub mod session;
pub mod train_use_case;
