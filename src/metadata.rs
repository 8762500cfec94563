//! The engine-facing iterator metadata store.
//!
//! The merge operator's configuration lives entirely inside the storage
//! engine's own per-table iterator-configuration metadata; this module
//! defines the shape persisted there and the async seam the control plane
//! talks through. [`MemoryMetadataStore`] backs tests and embedded use.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::IteratorScope;

/// An installed merge operator as persisted in table metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledOperator {
    /// Name the operator is registered under.
    pub name: String,
    /// Numeric priority within the table's layered iterators.
    pub priority: u32,
    /// Iterator scopes the operator is visible in.
    pub scopes: Vec<IteratorScope>,
    /// The flat option map the operator is initialized from.
    pub options: BTreeMap<String, String>,
}

/// The metadata store could not serve a request.
///
/// Always propagated to the control-plane caller; never swallowed.
#[derive(Debug, Error)]
pub enum MetadataStoreError {
    /// The store is unreachable.
    #[error("metadata store unreachable: {0}")]
    Unreachable(String),
    /// The store backend reported a failure.
    #[error("metadata store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Round trips to the engine's per-table iterator metadata.
///
/// Operations on one table are individually atomic, but the trait makes no
/// cross-operation guarantee: a load followed by an install is an
/// unsynchronized read-modify-write, and concurrent writers race with
/// last-write-wins semantics. Callers needing strict consistency serialize
/// externally.
#[async_trait]
pub trait IteratorMetadataStore: Send + Sync {
    /// The operator installed on `table` under `name`.
    ///
    /// `Ok(None)` both when the table carries no such operator and when the
    /// table does not exist at all; absence is not an error for reads.
    async fn load(
        &self,
        table: &str,
        name: &str,
    ) -> Result<Option<InstalledOperator>, MetadataStoreError>;

    /// Install `operator` on `table`, replacing any same-named installation.
    async fn install(
        &self,
        table: &str,
        operator: InstalledOperator,
    ) -> Result<(), MetadataStoreError>;

    /// Detach the operator installed on `table` under `name`.
    ///
    /// Detaching an absent operator is a no-op.
    async fn detach(&self, table: &str, name: &str) -> Result<(), MetadataStoreError>;
}

/// In-memory [`IteratorMetadataStore`].
///
/// Tracks the number of installs performed, which makes control-plane
/// idempotence observable in tests.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    tables: RwLock<HashMap<String, HashMap<String, InstalledOperator>>>,
    installs: AtomicUsize,
}

impl MemoryMetadataStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of install operations performed since construction.
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IteratorMetadataStore for MemoryMetadataStore {
    async fn load(
        &self,
        table: &str,
        name: &str,
    ) -> Result<Option<InstalledOperator>, MetadataStoreError> {
        let tables = self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(tables
            .get(table)
            .and_then(|operators| operators.get(name))
            .cloned())
    }

    async fn install(
        &self,
        table: &str,
        operator: InstalledOperator,
    ) -> Result<(), MetadataStoreError> {
        let mut tables = self
            .tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tables
            .entry(table.to_owned())
            .or_default()
            .insert(operator.name.clone(), operator);
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn detach(&self, table: &str, name: &str) -> Result<(), MetadataStoreError> {
        let mut tables = self
            .tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(operators) = tables.get_mut(table) {
            operators.remove(name);
        }
        Ok(())
    }
}
