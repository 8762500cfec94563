//! Persisted merge-operator configuration and its option-map encoding.
//!
//! The storage engine persists installed iterators as a flat
//! `option key -> option value` map inside its per-table metadata. This
//! module owns the shape of that map for the stats merge operator: one
//! `dataset.<id>` entry per dataset, a `separator` entry, and an
//! `all-scopes` flag. The config round-trips losslessly through
//! [`MergeOperatorConfig::to_options`] / [`MergeOperatorConfig::from_options`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::key::DEFAULT_SEPARATOR;

/// Name the operator is installed under in table metadata.
pub const OPERATOR_NAME: &str = "stats-merge";

/// Priority of the installed operator.
///
/// Lower than other layered read-time transforms so partial values are
/// combined before any of them observe the row; uniform across scan and
/// every compaction tier.
pub const MERGE_PRIORITY: u32 = 10;

/// Option-key prefix for per-dataset schema descriptors.
pub const DATASET_OPTION_PREFIX: &str = "dataset.";

/// Option key holding the single-character separator.
pub const SEPARATOR_OPTION: &str = "separator";

/// Option key flagging installation in all iterator scopes.
pub const ALL_SCOPES_OPTION: &str = "all-scopes";

/// Phase of the engine's read/compaction pipeline an iterator runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorScope {
    /// Live scans.
    Scan,
    /// Minor (memtable flush) compactions.
    MinorCompaction,
    /// Major (multi-level) compactions.
    MajorCompaction,
}

impl IteratorScope {
    /// Every scope. The operator must behave uniformly across all of them,
    /// or merged values would differ depending on which scope last ran.
    pub fn all() -> [IteratorScope; 3] {
        [
            IteratorScope::Scan,
            IteratorScope::MinorCompaction,
            IteratorScope::MajorCompaction,
        ]
    }
}

/// Errors decoding a persisted option map.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// The separator option is not exactly one byte.
    #[error("separator option must be a single byte, got `{0}`")]
    InvalidSeparator(String),
    /// A `dataset.` option carries an empty dataset id.
    #[error("dataset option with empty dataset id")]
    EmptyDatasetId,
}

/// The table-scoped merge-operator configuration.
///
/// At most one lives per table; its dataset map keys are unique by
/// construction. Created on first attach, mutated by later attaches and
/// removes, gone when the last dataset is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOperatorConfig {
    separator: u8,
    datasets: BTreeMap<String, String>,
}

impl Default for MergeOperatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl MergeOperatorConfig {
    /// An empty configuration using `separator`.
    pub fn new(separator: u8) -> Self {
        MergeOperatorConfig {
            separator,
            datasets: BTreeMap::new(),
        }
    }

    /// The separator splitting dataset ids from key remainders.
    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Register `dataset` with `descriptor`, returning the descriptor it
    /// replaces, if any.
    pub fn insert(&mut self, dataset: impl Into<String>, descriptor: impl Into<String>) -> Option<String> {
        self.datasets.insert(dataset.into(), descriptor.into())
    }

    /// Remove `dataset`, returning its descriptor if it was present.
    pub fn remove(&mut self, dataset: &str) -> Option<String> {
        self.datasets.remove(dataset)
    }

    /// The descriptor registered for `dataset`.
    pub fn descriptor(&self, dataset: &str) -> Option<&str> {
        self.datasets.get(dataset).map(String::as_str)
    }

    /// The full `dataset id -> schema descriptor` map.
    pub fn datasets(&self) -> &BTreeMap<String, String> {
        &self.datasets
    }

    /// Whether no datasets are configured.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Number of configured datasets.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Encode into the flat option map persisted by the engine.
    pub fn to_options(&self) -> BTreeMap<String, String> {
        let mut options = BTreeMap::new();
        options.insert(
            SEPARATOR_OPTION.to_owned(),
            (self.separator as char).to_string(),
        );
        options.insert(ALL_SCOPES_OPTION.to_owned(), "true".to_owned());
        for (dataset, descriptor) in &self.datasets {
            options.insert(
                format!("{DATASET_OPTION_PREFIX}{dataset}"),
                descriptor.clone(),
            );
        }
        options
    }

    /// Decode from a persisted option map.
    ///
    /// Option keys this module does not own are ignored so the engine can
    /// mix in its own bookkeeping entries. A missing separator option falls
    /// back to [`DEFAULT_SEPARATOR`].
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, OptionsError> {
        let separator = match options.get(SEPARATOR_OPTION) {
            Some(raw) => match raw.as_bytes() {
                [single] => *single,
                _ => return Err(OptionsError::InvalidSeparator(raw.clone())),
            },
            None => DEFAULT_SEPARATOR,
        };
        let mut datasets = BTreeMap::new();
        for (key, value) in options {
            if let Some(dataset) = key.strip_prefix(DATASET_OPTION_PREFIX) {
                if dataset.is_empty() {
                    return Err(OptionsError::EmptyDatasetId);
                }
                datasets.insert(dataset.to_owned(), value.clone());
            }
        }
        Ok(MergeOperatorConfig { separator, datasets })
    }
}
