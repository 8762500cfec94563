//! Control-plane management of per-table merge configuration.
//!
//! Each operation is a synchronous round trip to the engine's metadata
//! store: read the installed configuration, compute the target state, then
//! detach and reinstall. The read-modify-write is **not** transactionally
//! isolated: two concurrent operations on one table can read the same
//! stale snapshot and the later install silently wins. That race is part
//! of the contract; callers needing strictness serialize configuration
//! changes externally, e.g. with a lock keyed by table name.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    config::{IteratorScope, MergeOperatorConfig, OptionsError, MERGE_PRIORITY, OPERATOR_NAME},
    metadata::{InstalledOperator, IteratorMetadataStore, MetadataStoreError},
    observability::{log_debug, log_info},
    operator::StatsMergeOperator,
    registry::{default_factory, SchemaError, SerializerFactory, SerializerRegistry},
};

/// A control-plane operation failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The schema descriptor was rejected at the door.
    #[error("schema descriptor rejected for dataset `{dataset}`: {source}")]
    Schema {
        /// Dataset the attach was for.
        dataset: String,
        /// Why the factory rejected the descriptor.
        #[source]
        source: SchemaError,
    },
    /// The persisted option map does not decode to a configuration.
    #[error("persisted operator options are corrupt: {0}")]
    Corrupt(#[from] OptionsError),
    /// The metadata store could not serve the round trip.
    #[error(transparent)]
    Store(#[from] MetadataStoreError),
}

/// Attaches, removes, and lists the merge operator's per-table datasets.
pub struct ConfigurationManager<S> {
    store: S,
    factory: SerializerFactory,
}

impl<S> ConfigurationManager<S>
where
    S: IteratorMetadataStore,
{
    /// A manager over `store` using the built-in serializer factory.
    pub fn new(store: S) -> Self {
        Self::with_factory(store, default_factory())
    }

    /// A manager validating descriptors through a custom factory.
    pub fn with_factory(store: S, factory: SerializerFactory) -> Self {
        ConfigurationManager { store, factory }
    }

    /// The underlying metadata store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Attach `dataset` with `descriptor` to `table`.
    ///
    /// Idempotent: if the dataset is already attached with an identical
    /// descriptor nothing is reinstalled. Otherwise the entry is merged
    /// into the current configuration (or a fresh one using `separator`)
    /// and the operator is detached and reinstalled with the result.
    pub async fn attach(
        &self,
        table: &str,
        dataset: &str,
        descriptor: &str,
        separator: u8,
    ) -> Result<(), ConfigError> {
        self.attach_all(table, [(dataset, descriptor)], separator)
            .await
    }

    /// Attach many datasets in one detach/reinstall round trip.
    ///
    /// `separator` seeds a fresh configuration; an existing installation
    /// keeps its stored separator.
    pub async fn attach_all<'a, I>(
        &self,
        table: &str,
        datasets: I,
        separator: u8,
    ) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let current = self.store.load(table, OPERATOR_NAME).await?;
        let mut config = match &current {
            Some(installed) => MergeOperatorConfig::from_options(&installed.options)?,
            None => MergeOperatorConfig::new(separator),
        };

        let mut changed = false;
        for (dataset, descriptor) in datasets {
            (self.factory)(descriptor).map_err(|source| ConfigError::Schema {
                dataset: dataset.to_owned(),
                source,
            })?;
            if config.descriptor(dataset) == Some(descriptor) {
                continue;
            }
            config.insert(dataset, descriptor);
            changed = true;
        }
        if !changed {
            log_debug!(
                component = "manager",
                event = "attach_noop",
                table = %table,
            );
            return Ok(());
        }

        if current.is_some() {
            self.store.detach(table, OPERATOR_NAME).await?;
        }
        self.store.install(table, installed_operator(&config)).await?;
        log_info!(
            component = "manager",
            event = "operator_attached",
            table = %table,
            datasets = config.len(),
        );
        Ok(())
    }

    /// Remove `dataset` from `table`.
    ///
    /// No configuration, or a configuration without the dataset, is a
    /// no-op. Removing the last dataset leaves the operator uninstalled.
    pub async fn remove(&self, table: &str, dataset: &str) -> Result<(), ConfigError> {
        let Some(installed) = self.store.load(table, OPERATOR_NAME).await? else {
            return Ok(());
        };
        let mut config = MergeOperatorConfig::from_options(&installed.options)?;
        if config.remove(dataset).is_none() {
            return Ok(());
        }

        self.store.detach(table, OPERATOR_NAME).await?;
        if config.is_empty() {
            log_info!(
                component = "manager",
                event = "operator_uninstalled",
                table = %table,
            );
            return Ok(());
        }
        self.store.install(table, installed_operator(&config)).await?;
        log_info!(
            component = "manager",
            event = "dataset_removed",
            table = %table,
            dataset = %dataset,
            remaining = config.len(),
        );
        Ok(())
    }

    /// The current `dataset id -> schema descriptor` map of `table`.
    ///
    /// Empty when no configuration is installed or the table does not
    /// exist.
    pub async fn list(&self, table: &str) -> Result<BTreeMap<String, String>, ConfigError> {
        match self.store.load(table, OPERATOR_NAME).await? {
            Some(installed) => {
                Ok(MergeOperatorConfig::from_options(&installed.options)?
                    .datasets()
                    .clone())
            }
            None => Ok(BTreeMap::new()),
        }
    }

    /// Whether `dataset` is currently attached to `table`.
    pub async fn is_attached(&self, table: &str, dataset: &str) -> Result<bool, ConfigError> {
        Ok(self.list(table).await?.contains_key(dataset))
    }

    /// Build a fresh per-task operator from `table`'s installed
    /// configuration.
    ///
    /// This is the path the engine takes when scheduling a scan or
    /// compaction task: each task gets its own instance with an immutable
    /// registry snapshot. `None` when no operator is installed.
    pub async fn operator_for(
        &self,
        table: &str,
    ) -> Result<Option<StatsMergeOperator>, ConfigError> {
        let Some(installed) = self.store.load(table, OPERATOR_NAME).await? else {
            return Ok(None);
        };
        let config = MergeOperatorConfig::from_options(&installed.options)?;
        let registry = SerializerRegistry::with_factory(
            config
                .datasets()
                .iter()
                .map(|(dataset, descriptor)| (dataset.as_str(), descriptor.as_str())),
            &self.factory,
        );
        Ok(Some(StatsMergeOperator::new(config.separator(), registry)))
    }
}

fn installed_operator(config: &MergeOperatorConfig) -> InstalledOperator {
    InstalledOperator {
        name: OPERATOR_NAME.to_owned(),
        priority: MERGE_PRIORITY,
        scopes: IteratorScope::all().to_vec(),
        options: config.to_options(),
    }
}
