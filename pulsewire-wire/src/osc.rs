//! Minimal OSC 1.0 subset codec: address pattern + int32/float32 args.
//!
//! Only the slice of the OSC wire format this installation actually
//! speaks is implemented: no bundles, no string/blob arguments, no
//! OSC-timetag. Strings (address, type tag) are null-terminated and
//! padded to a 4-byte boundary; each argument is a 4-byte big-endian
//! value, per the OSC 1.0 spec.

use crate::error::WireError;

/// A decoded argument value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
}

impl OscArg {
    fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
        }
    }

    fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            OscArg::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Float(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
        }
    }
}

/// A decoded OSC message: an address pattern plus its argument vector.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

/// Round a length up to the next multiple of 4.
fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

/// Read a null-terminated, 4-byte-padded OSC string starting at `offset`.
/// Returns the string and the offset of the first byte past its padding.
fn read_osc_string(data: &[u8], offset: usize) -> Result<(String, usize), WireError> {
    let nul = data[offset..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::BadAddress)?;
    let end = offset + nul;
    let s = std::str::from_utf8(&data[offset..end])
        .map_err(|_| WireError::BadAddress)?
        .to_string();
    let total = padded_len(nul + 1);
    let next = offset + total;
    if next > data.len() {
        return Err(WireError::BadAddress);
    }
    Ok((s, next))
}

fn write_osc_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(s.as_bytes());
    let total = padded_len(s.len() + 1);
    out.resize(out.len() + (total - s.len()), 0);
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self { address: address.into(), args }
    }

    /// Encode into an OSC packet: address, type tag string, then args.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.args.len() * 4);
        write_osc_string(&self.address, &mut out);

        let mut type_tag = String::with_capacity(self.args.len() + 1);
        type_tag.push(',');
        for arg in &self.args {
            type_tag.push(arg.type_tag());
        }
        write_osc_string(&type_tag, &mut out);

        for arg in &self.args {
            arg.write_bytes(&mut out);
        }
        out
    }

    /// Decode a raw UDP payload into an address and argument vector.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < 4 {
            return Err(WireError::Truncated(data.len()));
        }
        let (address, after_addr) = read_osc_string(data, 0)?;
        let (type_tag, after_tag) = read_osc_string(data, after_addr)?;

        let mut chars = type_tag.chars();
        if chars.next() != Some(',') {
            return Err(WireError::BadTypeTag);
        }

        let mut args = Vec::with_capacity(type_tag.len().saturating_sub(1));
        let mut offset = after_tag;
        for c in chars {
            if offset + 4 > data.len() {
                return Err(WireError::Truncated(data.len()));
            }
            let bytes = [data[offset], data[offset + 1], data[offset + 2], data[offset + 3]];
            let arg = match c {
                'i' => OscArg::Int(i32::from_be_bytes(bytes)),
                'f' => OscArg::Float(f32::from_bits(u32::from_be_bytes(bytes))),
                other => return Err(WireError::UnsupportedType(other)),
            };
            args.push(arg);
            offset += 4;
        }

        Ok(OscMessage { address, args })
    }

    /// Extract all arguments as `i32`, failing if any argument is not an int
    /// or the count doesn't match `expected`.
    pub fn ints(&self, expected: usize) -> Result<Vec<i32>, WireError> {
        if self.args.len() != expected {
            return Err(WireError::ArityMismatch { expected, found: self.args.len() });
        }
        self.args
            .iter()
            .map(|a| match a {
                OscArg::Int(v) => Ok(*v),
                OscArg::Float(_) => Err(WireError::UnsupportedType('f')),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_address_only() {
        let msg = OscMessage::new("/restart", vec![]);
        let encoded = msg.encode();
        assert_eq!(encoded.len() % 4, 0);
        let decoded = OscMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_mixed_args() {
        let msg = OscMessage::new(
            "/beat/2",
            vec![OscArg::Int(812), OscArg::Int(123_456), OscArg::Float(0.73)],
        );
        let encoded = msg.encode();
        let decoded = OscMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn padding_matches_osc_spec() {
        // "/ppg/0" is 6 bytes -> nul-terminated 7 bytes -> padded to 8.
        let msg = OscMessage::new("/ppg/0", vec![OscArg::Int(1)]);
        let encoded = msg.encode();
        // address (8) + type tag ",i\0\0" (4) + one arg (4) = 16
        assert_eq!(encoded.len(), 16);
    }

    #[test]
    fn rejects_truncated_packet() {
        let msg = OscMessage::new("/ppg/0", vec![OscArg::Int(1), OscArg::Int(2)]);
        let mut encoded = msg.encode();
        encoded.truncate(encoded.len() - 2);
        assert!(matches!(OscMessage::decode(&encoded), Err(WireError::Truncated(_))));
    }

    #[test]
    fn rejects_missing_type_tag_comma() {
        // Hand-build a packet with a type tag that doesn't start with ','.
        let mut data = Vec::new();
        write_osc_string("/ppg/0", &mut data);
        write_osc_string("xx", &mut data);
        assert_eq!(OscMessage::decode(&data), Err(WireError::BadTypeTag));
    }
}
