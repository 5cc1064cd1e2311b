//! Wire-level constants shared between the sensor node and the processor.
//! Values come straight from the protocol contract; changing them on one
//! side without the other breaks the wire format.

/// Maximum number of sensor modules the protocol addresses.
pub const N_MAX: u8 = 4;

/// Default number of samples per bundle.
pub const DEFAULT_BUNDLE_SIZE: usize = 5;

/// Sampling rate in Hz; fixes the sender's sample grid spacing.
pub const SAMPLE_RATE_HZ: u32 = 50;

/// Spacing between samples on the fixed grid, in milliseconds.
pub const SAMPLE_INTERVAL_MS: i64 = 1000 / SAMPLE_RATE_HZ as i64;

/// Inclusive range of valid raw ADC sample values (12-bit).
pub const SAMPLE_MIN: i32 = 0;
pub const SAMPLE_MAX: i32 = 4095;

/// Default UDP port the processor listens on for PPG bundles.
pub const DEFAULT_INPUT_PORT: u16 = 8000;

/// Default UDP port the processor broadcasts beat events on.
pub const DEFAULT_BEATS_PORT: u16 = 8001;

/// Default UDP port a sensor node listens on for the restart command.
pub const DEFAULT_ADMIN_PORT: u16 = 8006;
