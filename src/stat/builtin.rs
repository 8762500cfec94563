//! Built-in additive statistics: count, sum, and min/max.
//!
//! These are deliberately small. They exist so the serializer seam is
//! exercised end-to-end and embedders have working statistics out of the
//! box; richer sketches plug in through the same [`Stat`]/[`StatSerializer`]
//! traits without touching the merge path.

use std::any::Any;

use super::{
    frame::{decode_frame, encode_frame, StatKind},
    CombineError, Stat, StatDecodeError, StatSerializer,
};

/// Additive event count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountStat(u64);

impl CountStat {
    /// A count of `n` events.
    pub fn new(n: u64) -> Self {
        CountStat(n)
    }

    /// Current count.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Stat for CountStat {
    fn combine(&mut self, other: &dyn Stat) -> Result<(), CombineError> {
        let other = downcast::<CountStat>(self, other)?;
        self.0 = self.0.saturating_add(other.0);
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        encode_frame(StatKind::Count, &self.0.to_le_bytes())
    }

    fn kind_name(&self) -> &'static str {
        "count"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Additive signed sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumStat(i64);

impl SumStat {
    /// A sum with initial value `v`.
    pub fn new(v: i64) -> Self {
        SumStat(v)
    }

    /// Current sum.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl Stat for SumStat {
    fn combine(&mut self, other: &dyn Stat) -> Result<(), CombineError> {
        let other = downcast::<SumStat>(self, other)?;
        self.0 = self.0.saturating_add(other.0);
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        encode_frame(StatKind::Sum, &self.0.to_le_bytes())
    }

    fn kind_name(&self) -> &'static str {
        "sum"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Running minimum and maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMaxStat {
    min: i64,
    max: i64,
}

impl MinMaxStat {
    /// A min/max seeded with a single observation.
    pub fn of(observation: i64) -> Self {
        MinMaxStat {
            min: observation,
            max: observation,
        }
    }

    /// A min/max over an explicit range. `min` must not exceed `max`.
    pub fn new(min: i64, max: i64) -> Self {
        debug_assert!(min <= max);
        MinMaxStat { min, max }
    }

    /// Smallest observation folded in so far.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Largest observation folded in so far.
    pub fn max(&self) -> i64 {
        self.max
    }
}

impl Stat for MinMaxStat {
    fn combine(&mut self, other: &dyn Stat) -> Result<(), CombineError> {
        let other = downcast::<MinMaxStat>(self, other)?;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        let mut payload = [0u8; 16];
        payload[..8].copy_from_slice(&self.min.to_le_bytes());
        payload[8..].copy_from_slice(&self.max.to_le_bytes());
        encode_frame(StatKind::MinMax, &payload)
    }

    fn kind_name(&self) -> &'static str {
        "minmax"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn downcast<'s, T: Stat + 'static>(
    left: &dyn Stat,
    other: &'s dyn Stat,
) -> Result<&'s T, CombineError> {
    other
        .as_any()
        .downcast_ref::<T>()
        .ok_or(CombineError::Mismatch {
            left: left.kind_name(),
            right: other.kind_name(),
        })
}

/// Serializer for [`CountStat`] frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountSerializer;

impl StatSerializer for CountSerializer {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Stat>, StatDecodeError> {
        let payload = expect_kind(bytes, StatKind::Count)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(payload);
        Ok(Box::new(CountStat(u64::from_le_bytes(raw))))
    }
}

/// Serializer for [`SumStat`] frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct SumSerializer;

impl StatSerializer for SumSerializer {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Stat>, StatDecodeError> {
        let payload = expect_kind(bytes, StatKind::Sum)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(payload);
        Ok(Box::new(SumStat(i64::from_le_bytes(raw))))
    }
}

/// Serializer for [`MinMaxStat`] frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinMaxSerializer;

impl StatSerializer for MinMaxSerializer {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Stat>, StatDecodeError> {
        let payload = expect_kind(bytes, StatKind::MinMax)?;
        let mut min = [0u8; 8];
        let mut max = [0u8; 8];
        min.copy_from_slice(&payload[..8]);
        max.copy_from_slice(&payload[8..]);
        Ok(Box::new(MinMaxStat {
            min: i64::from_le_bytes(min),
            max: i64::from_le_bytes(max),
        }))
    }
}

fn expect_kind(bytes: &[u8], expected: StatKind) -> Result<&[u8], StatDecodeError> {
    let (kind, payload) = decode_frame(bytes)?;
    if kind != expected {
        return Err(StatDecodeError::WrongKind {
            expected,
            found: kind,
        });
    }
    Ok(payload)
}
