//! Mergeable statistic values and their serialization contract.
//!
//! The merge path treats statistics as opaque values behind two seams:
//! [`StatSerializer`] turns a dataset's binary blobs into decoded values,
//! and [`Stat`] folds decoded values together and encodes the result.
//! `combine` must be associative and commutative over valid values of one
//! dataset; that property is what makes the merge result independent of
//! write arrival order and of which compaction pass folded which subset.

pub mod builtin;
mod frame;

use std::{any::Any, fmt::Debug};

use thiserror::Error;

pub use frame::StatKind;

/// A decoded, mergeable statistic.
pub trait Stat: Debug + Send {
    /// Fold `other` into `self`.
    ///
    /// Implementations downcast `other` through [`Stat::as_any`]; a kind
    /// mismatch yields [`CombineError::Mismatch`] and leaves `self`
    /// untouched.
    fn combine(&mut self, other: &dyn Stat) -> Result<(), CombineError>;

    /// Serialize this statistic back to its wire form.
    fn encode(&self) -> Vec<u8>;

    /// Short name of the concrete statistic, used in diagnostics.
    fn kind_name(&self) -> &'static str;

    /// `Any` escape hatch so concrete statistics can downcast their peers.
    fn as_any(&self) -> &dyn Any;
}

/// Decodes one dataset's statistic values.
///
/// One serializer instance is shared read-only by every merge invocation of
/// an operator instance, so implementations must be `Send + Sync` and
/// stateless across calls.
pub trait StatSerializer: Debug + Send + Sync {
    /// Decode a single partial or combined value.
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Stat>, StatDecodeError>;
}

/// A single statistic blob failed to decode.
///
/// Recoverable by contract: the merge loop logs the failure, discards the
/// value, and keeps scanning. Never propagated out of a merge call.
#[derive(Debug, Error)]
pub enum StatDecodeError {
    /// The blob is shorter than the fixed frame header and trailer.
    #[error("statistic frame truncated: {len} bytes")]
    Truncated {
        /// Observed blob length.
        len: usize,
    },
    /// The frame's kind tag is not a known statistic kind.
    #[error("unknown statistic kind tag {tag:#04x}")]
    UnknownKind {
        /// The unrecognized tag byte.
        tag: u8,
    },
    /// The payload length does not match the frame's kind.
    #[error("{kind} payload must be {expected} bytes, got {actual}")]
    PayloadLength {
        /// Kind named by the frame tag.
        kind: StatKind,
        /// Payload length the kind requires.
        expected: usize,
        /// Payload length observed.
        actual: usize,
    },
    /// The frame checksum does not match its contents.
    #[error("statistic frame checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum {
        /// Checksum stored in the frame trailer.
        stored: u32,
        /// Checksum computed over the frame contents.
        computed: u32,
    },
    /// The frame decoded to a kind this serializer does not produce.
    #[error("expected a {expected} statistic, found {found}")]
    WrongKind {
        /// Kind the serializer expected.
        expected: StatKind,
        /// Kind found in the frame.
        found: StatKind,
    },
}

/// Two statistics of incompatible kinds were asked to combine.
#[derive(Debug, Error)]
pub enum CombineError {
    /// The right-hand statistic is not the same concrete kind as the left.
    #[error("cannot combine {left} with {right}")]
    Mismatch {
        /// Kind of the accumulator.
        left: &'static str,
        /// Kind of the incoming value.
        right: &'static str,
    },
}
