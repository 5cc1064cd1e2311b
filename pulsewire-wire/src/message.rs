//! Typed PPG/beat/restart messages layered on top of the raw OSC codec.
//!
//! Address patterns:
//!   `/ppg/<id>`    — sensor -> processor, `B` int32 samples + 1 int32 timestamp.
//!   `/beat/<id>`   — processor -> consumers, `[ibi_ms, timestamp_ms, intensity]`.
//!   `/restart`     — processor/admin -> sensor node, no arguments.

use crate::constants::{N_MAX, SAMPLE_MAX, SAMPLE_MIN};
use crate::error::WireError;
use crate::osc::{OscArg, OscMessage};

/// A bundle of `B` consecutive raw samples plus the sender-local timestamp
/// (ms) of the first sample, as received from one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct PpgBundle {
    pub sensor_id: u8,
    /// Sender-local monotonic timestamp of `samples[0]`, in milliseconds.
    pub first_sample_timestamp_ms: i64,
    pub samples: Vec<u16>,
}

impl PpgBundle {
    pub fn new(sensor_id: u8, first_sample_timestamp_ms: i64, samples: Vec<u16>) -> Self {
        Self { sensor_id, first_sample_timestamp_ms, samples }
    }

    /// Encode to the `/ppg/<id>` OSC address with `B` int32 samples followed
    /// by the int32 timestamp.
    pub fn encode(&self) -> Vec<u8> {
        let mut args: Vec<OscArg> = self.samples.iter().map(|&s| OscArg::Int(s as i32)).collect();
        args.push(OscArg::Int(self.first_sample_timestamp_ms as i32));
        OscMessage::new(format!("/ppg/{}", self.sensor_id), args).encode()
    }

    /// Decode and fully validate a `/ppg/<id>` packet against the protocol
    /// contract: address shape, sensor id range, arity, and sample range.
    /// Negative or non-monotonic timestamps are accepted here (the ingress
    /// layer surfaces a warning for those; they are not malformed packets).
    pub fn decode(data: &[u8], bundle_size: usize) -> Result<Self, WireError> {
        let msg = OscMessage::decode(data)?;
        let sensor_id = parse_ppg_address(&msg.address)?;

        let ints = msg.ints(bundle_size + 1)?;
        let (sample_ints, timestamp_slice) = ints.split_at(bundle_size);
        let first_sample_timestamp_ms = timestamp_slice[0] as i64;

        let mut samples = Vec::with_capacity(bundle_size);
        for &v in sample_ints {
            if !(SAMPLE_MIN..=SAMPLE_MAX).contains(&v) {
                return Err(WireError::SampleOutOfRange(v));
            }
            samples.push(v as u16);
        }

        Ok(PpgBundle { sensor_id, first_sample_timestamp_ms, samples })
    }

    /// Expand the bundle into per-sample `(timestamp_ms, value)` pairs using
    /// the reconstructed per-sample timestamps `timestamp + k * interval_ms`.
    pub fn expand(&self, sample_interval_ms: i64) -> Vec<(i64, u16)> {
        self.samples
            .iter()
            .enumerate()
            .map(|(k, &v)| (self.first_sample_timestamp_ms + k as i64 * sample_interval_ms, v))
            .collect()
    }
}

/// Parse `/ppg/<id>` and validate `0 <= id < N_MAX`.
pub fn parse_ppg_address(address: &str) -> Result<u8, WireError> {
    let id_str = address
        .strip_prefix("/ppg/")
        .ok_or_else(|| WireError::UnknownAddress(address.to_string()))?;
    let id: u32 = id_str.parse().map_err(|_| WireError::UnknownAddress(address.to_string()))?;
    if id >= N_MAX as u32 {
        return Err(WireError::SensorIdOutOfRange(id, N_MAX as u32));
    }
    Ok(id as u8)
}

/// A beat event published on the broadcast bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    pub sensor_id: u8,
    pub ibi_ms: i64,
    pub timestamp_ms: i64,
    /// Normalized quality/amplitude measure in `[0, 1]`. Implementations
    /// that do not compute it emit the default of `1.0`.
    pub intensity: f32,
}

impl BeatEvent {
    pub fn new(sensor_id: u8, ibi_ms: i64, timestamp_ms: i64, intensity: f32) -> Self {
        Self { sensor_id, ibi_ms, timestamp_ms, intensity }
    }

    pub fn encode(&self) -> Vec<u8> {
        OscMessage::new(
            format!("/beat/{}", self.sensor_id),
            vec![
                OscArg::Int(self.ibi_ms as i32),
                OscArg::Int(self.timestamp_ms as i32),
                OscArg::Float(self.intensity),
            ],
        )
        .encode()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let msg = OscMessage::decode(data)?;
        let sensor_id = msg
            .address
            .strip_prefix("/beat/")
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|&id| id < N_MAX as u32)
            .ok_or_else(|| WireError::UnknownAddress(msg.address.clone()))? as u8;

        if msg.args.len() != 3 {
            return Err(WireError::ArityMismatch { expected: 3, found: msg.args.len() });
        }
        let ibi_ms = match msg.args[0] {
            OscArg::Int(v) => v as i64,
            OscArg::Float(_) => return Err(WireError::UnsupportedType('f')),
        };
        let timestamp_ms = match msg.args[1] {
            OscArg::Int(v) => v as i64,
            OscArg::Float(_) => return Err(WireError::UnsupportedType('f')),
        };
        let intensity = match msg.args[2] {
            OscArg::Float(v) => v,
            OscArg::Int(v) => v as f32,
        };

        Ok(BeatEvent { sensor_id, ibi_ms, timestamp_ms, intensity })
    }
}

/// The `/restart` admin command. Carries no arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartCommand;

impl RestartCommand {
    pub const ADDRESS: &'static str = "/restart";

    pub fn encode() -> Vec<u8> {
        OscMessage::new(Self::ADDRESS, vec![]).encode()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let msg = OscMessage::decode(data)?;
        if msg.address != Self::ADDRESS {
            return Err(WireError::UnknownAddress(msg.address));
        }
        Ok(RestartCommand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ppg_bundle_round_trip_preserves_samples_bit_for_bit() {
        let bundle = PpgBundle::new(2, 123_456, vec![0, 2048, 4095, 10, 3000]);
        let encoded = bundle.encode();
        let decoded = PpgBundle::decode(&encoded, 5).unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn ppg_bundle_rejects_out_of_range_sample() {
        let bundle = PpgBundle::new(0, 0, vec![0, 4096, 0, 0, 0]);
        let encoded = bundle.encode();
        assert_eq!(
            PpgBundle::decode(&encoded, 5),
            Err(WireError::SampleOutOfRange(4096))
        );
    }

    #[test]
    fn ppg_bundle_rejects_sensor_id_out_of_range() {
        let bundle = PpgBundle::new(9, 0, vec![0, 0, 0, 0, 0]);
        let encoded = bundle.encode();
        assert!(matches!(
            PpgBundle::decode(&encoded, 5),
            Err(WireError::UnknownAddress(_))
        ));
    }

    #[test]
    fn ppg_bundle_rejects_wrong_arity() {
        let bundle = PpgBundle::new(0, 0, vec![0, 0, 0]);
        let encoded = bundle.encode();
        assert!(matches!(
            PpgBundle::decode(&encoded, 5),
            Err(WireError::ArityMismatch { expected: 6, found: 4 })
        ));
    }

    #[test]
    fn expand_reconstructs_per_sample_timestamps() {
        let bundle = PpgBundle::new(0, 1000, vec![10, 20, 30, 40, 50]);
        let expanded = bundle.expand(20);
        assert_eq!(
            expanded,
            vec![(1000, 10), (1020, 20), (1040, 30), (1060, 40), (1080, 50)]
        );
    }

    #[test]
    fn beat_event_round_trips() {
        let beat = BeatEvent::new(1, 812, 98_765, 0.42);
        let encoded = beat.encode();
        let decoded = BeatEvent::decode(&encoded).unwrap();
        assert_eq!(decoded, beat);
    }

    #[test]
    fn restart_command_round_trips() {
        let encoded = RestartCommand::encode();
        assert_eq!(RestartCommand::decode(&encoded), Ok(RestartCommand));
    }
}
