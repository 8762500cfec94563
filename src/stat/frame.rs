//! Wire frame shared by the built-in statistic serializers.
//!
//! Layout: `[kind: u8][payload][crc32: u32 LE]`, checksum over the kind byte
//! and payload. The checksum is what turns silent blob corruption into a
//! skippable decode failure instead of a wrong merge result.

use std::fmt;

use super::StatDecodeError;

/// Frame bytes that are not payload: the kind tag and the crc32 trailer.
const FRAME_OVERHEAD: usize = 1 + 4;

/// Kind tag carried by a statistic frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Additive event count.
    Count,
    /// Additive signed sum.
    Sum,
    /// Running minimum and maximum.
    MinMax,
}

impl StatKind {
    pub(crate) fn code(self) -> u8 {
        match self {
            StatKind::Count => 0,
            StatKind::Sum => 1,
            StatKind::MinMax => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(StatKind::Count),
            1 => Some(StatKind::Sum),
            2 => Some(StatKind::MinMax),
            _ => None,
        }
    }

    /// Fixed payload length of this kind.
    pub(crate) fn payload_len(self) -> usize {
        match self {
            StatKind::Count | StatKind::Sum => 8,
            StatKind::MinMax => 16,
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatKind::Count => "count",
            StatKind::Sum => "sum",
            StatKind::MinMax => "minmax",
        };
        f.write_str(name)
    }
}

pub(crate) fn encode_frame(kind: StatKind, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.push(kind.code());
    frame.extend_from_slice(payload);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&frame);
    frame.extend_from_slice(&hasher.finalize().to_le_bytes());
    frame
}

pub(crate) fn decode_frame(bytes: &[u8]) -> Result<(StatKind, &[u8]), StatDecodeError> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(StatDecodeError::Truncated { len: bytes.len() });
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    let computed = hasher.finalize();
    if stored != computed {
        return Err(StatDecodeError::Checksum { stored, computed });
    }
    let kind =
        StatKind::from_code(body[0]).ok_or(StatDecodeError::UnknownKind { tag: body[0] })?;
    let payload = &body[1..];
    if payload.len() != kind.payload_len() {
        return Err(StatDecodeError::PayloadLength {
            kind,
            expected: kind.payload_len(),
            actual: payload.len(),
        });
    }
    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let frame = encode_frame(StatKind::Count, &42u64.to_le_bytes());
        let (kind, payload) = decode_frame(&frame).unwrap();
        assert_eq!(kind, StatKind::Count);
        assert_eq!(payload, 42u64.to_le_bytes());
    }

    #[test]
    fn truncated_frame_rejected() {
        let err = decode_frame(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, StatDecodeError::Truncated { len: 3 }));
    }

    #[test]
    fn unknown_kind_rejected() {
        let frame = encode_frame_with_tag(0x7f, &[0; 8]);
        let err = decode_frame(&frame).unwrap_err();
        assert!(matches!(err, StatDecodeError::UnknownKind { tag: 0x7f }));
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut frame = encode_frame(StatKind::Sum, &7i64.to_le_bytes());
        frame[3] ^= 0x01;
        let err = decode_frame(&frame).unwrap_err();
        assert!(matches!(err, StatDecodeError::Checksum { .. }));
    }

    #[test]
    fn short_payload_rejected() {
        let frame = encode_frame(StatKind::MinMax, &[0; 8]);
        let err = decode_frame(&frame).unwrap_err();
        assert!(matches!(
            err,
            StatDecodeError::PayloadLength {
                kind: StatKind::MinMax,
                expected: 16,
                actual: 8,
            }
        ));
    }

    fn encode_frame_with_tag(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![tag];
        frame.extend_from_slice(payload);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&frame);
        frame.extend_from_slice(&hasher.finalize().to_le_bytes());
        frame
    }
}
