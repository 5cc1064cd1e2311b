use thiserror::Error;

/// Errors raised while decoding or validating a wire-format message.
///
/// These map directly to the "Malformed input" taxonomy: a rejected
/// message is counted by the caller, never allowed to perturb detector
/// state.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("packet too short: {0} bytes")]
    Truncated(usize),

    #[error("address string is not null-terminated or exceeds packet bounds")]
    BadAddress,

    #[error("address {0:?} does not match an expected pattern")]
    UnknownAddress(String),

    #[error("sensor id {0} out of range (0..{1})")]
    SensorIdOutOfRange(u32, u32),

    #[error("type tag string missing leading ','")]
    BadTypeTag,

    #[error("expected {expected} arguments, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("unsupported OSC type tag character {0:?}")]
    UnsupportedType(char),

    #[error("sample value {0} out of range [0, 4095]")]
    SampleOutOfRange(i32),
}
