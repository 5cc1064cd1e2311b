//! Wire-format types and codec shared between the sensor node firmware and
//! the beat-detection processor.
//!
//! The protocol is a minimal OSC 1.0 subset carried over UDP: address
//! patterns `/ppg/<id>`, `/beat/<id>`, and `/restart`, with int32/float32
//! arguments. See `osc` for the low-level codec and `message` for the
//! typed messages built on top of it.

pub mod constants;
pub mod error;
pub mod message;
pub mod osc;

pub use constants::*;
pub use error::WireError;
pub use message::{parse_ppg_address, BeatEvent, PpgBundle, RestartCommand};
pub use osc::{OscArg, OscMessage};
