//! Character-level LSTM + attention text model: corpus windowing,
//! training with per-epoch persistence, weight export and
//! temperature sampling.

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
