#![deny(missing_docs)]
//! Lazy statistics merging for sorted key-value stores.
//!
//! Partial statistic values ("sketches") are written independently, without a
//! read-modify-write transaction, and combined lazily by a merge operator the
//! storage engine invokes whenever it encounters several values for one key
//! during a scan or compaction pass. The engine instantiates one
//! [`StatsMergeOperator`] per scheduled task from the table's persisted
//! iterator configuration; the [`ConfigurationManager`] is the control-plane
//! API that installs and mutates that configuration.

mod observability;

/// Row-key decoding: resolving the dataset that owns a row.
pub mod key;

/// Mergeable statistic values and their serialization contract.
pub mod stat;

/// Immutable dataset-to-serializer snapshots.
pub mod registry;

/// The merge operator invoked inside the engine's iterator pipeline.
pub mod operator;

/// Persisted merge-operator configuration and its option-map encoding.
pub mod config;

/// The engine-facing iterator metadata store.
pub mod metadata;

/// Control-plane management of per-table merge configuration.
pub mod manager;

pub use crate::{
    config::MergeOperatorConfig,
    manager::ConfigurationManager,
    operator::{MergeOperator, StatsMergeOperator},
    registry::SerializerRegistry,
};
