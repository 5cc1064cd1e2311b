//! Host-side pipeline: ingress, per-sensor detector, beat predictor,
//! broadcast fan-out, supervision. `main.rs` is a thin wrapper that wires
//! these together from `ProcessorConfig` and runs them to completion.

pub mod config;
pub mod detector;
pub mod error;
pub mod fanout;
pub mod ingress;
pub mod predictor;
pub mod stats;
pub mod supervision;
