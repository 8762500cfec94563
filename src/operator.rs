//! The merge operator invoked inside the engine's iterator pipeline.
//!
//! The engine creates one [`StatsMergeOperator`] per scheduled scan or
//! compaction task and calls [`MergeOperator::merge`] once per key that
//! carries more than one value. The call is synchronous and pure CPU:
//! decode, combine, encode. Per-value corruption is absorbed here; only
//! structural misconfiguration (a row the operator cannot map to a
//! configured dataset) is surfaced to the engine.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    config::{MergeOperatorConfig, OptionsError},
    key::{self, KeyDecodeError},
    observability::{log_debug, log_warn},
    registry::{SerializerFactory, SerializerRegistry},
    stat::Stat,
};

/// A merge function the engine applies when a key holds several values.
///
/// Implementations must be safe to call from whichever thread the engine
/// scheduled the task on, with no shared mutable state between instances.
pub trait MergeOperator: Send + Sync {
    /// Reduce the ordered `values` co-located under `key` to a single value.
    fn merge(&self, key: &[u8], values: &[&[u8]]) -> Result<Vec<u8>, MergeError>;
}

/// A merge call failed structurally.
///
/// These are configuration bugs, not noisy data: the operator was installed
/// on rows outside its declared datasets. The engine surfaces them as a
/// failed read/compaction for the key.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The row key resolves to no dataset under either encoding.
    #[error("row key does not resolve to a dataset: {0}")]
    DatasetUnresolved(#[from] KeyDecodeError),
    /// The dataset resolved but no serializer is registered for it.
    #[error("no serializer registered for dataset `{0}`")]
    UnregisteredDataset(String),
    /// The engine handed the operator an empty value sequence.
    #[error("merge invoked with an empty value sequence")]
    EmptyInput,
}

/// Errors instantiating an operator from persisted table metadata.
#[derive(Debug, Error)]
pub enum OperatorInitError {
    /// The persisted option map does not decode to a configuration.
    #[error("persisted operator options are corrupt: {0}")]
    Options(#[from] OptionsError),
}

/// The statistics merge operator.
///
/// Holds the separator and an immutable serializer snapshot taken at
/// construction; reconfiguration never mutates a live instance, the engine
/// simply builds fresh instances for tasks scheduled after the change.
#[derive(Debug)]
pub struct StatsMergeOperator {
    separator: u8,
    registry: SerializerRegistry,
}

impl StatsMergeOperator {
    /// An operator over an explicit registry snapshot.
    pub fn new(separator: u8, registry: SerializerRegistry) -> Self {
        StatsMergeOperator { separator, registry }
    }

    /// Build an operator from a configuration, using the built-in
    /// serializer factory.
    pub fn from_config(config: &MergeOperatorConfig) -> Self {
        let registry = SerializerRegistry::from_snapshot(
            config
                .datasets()
                .iter()
                .map(|(dataset, descriptor)| (dataset.as_str(), descriptor.as_str())),
        );
        Self::new(config.separator(), registry)
    }

    /// Build an operator from the option map the engine persisted for it.
    ///
    /// This is the engine's initialization path: each scan or compaction
    /// task resolves the installed iterator's options and constructs its
    /// own instance from them.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, OperatorInitError> {
        let config = MergeOperatorConfig::from_options(options)?;
        Ok(Self::from_config(&config))
    }

    /// Like [`StatsMergeOperator::from_options`] with a custom serializer
    /// factory.
    pub fn from_options_with_factory(
        options: &BTreeMap<String, String>,
        factory: &SerializerFactory,
    ) -> Result<Self, OperatorInitError> {
        let config = MergeOperatorConfig::from_options(options)?;
        let registry = SerializerRegistry::with_factory(
            config
                .datasets()
                .iter()
                .map(|(dataset, descriptor)| (dataset.as_str(), descriptor.as_str())),
            factory,
        );
        Ok(Self::new(config.separator(), registry))
    }

    /// The registry snapshot this instance was built with.
    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }
}

impl MergeOperator for StatsMergeOperator {
    fn merge(&self, key: &[u8], values: &[&[u8]]) -> Result<Vec<u8>, MergeError> {
        // Identity law: a lone value is returned untouched, without a
        // decode/encode round trip.
        let first = match values {
            [] => return Err(MergeError::EmptyInput),
            [only] => return Ok(only.to_vec()),
            [first, ..] => *first,
        };

        let dataset = key::decode_dataset(key, self.separator)?;
        let dataset_id = dataset.dataset_id();
        let serializer = self
            .registry
            .resolve(dataset_id)
            .ok_or_else(|| MergeError::UnregisteredDataset(dataset_id.to_owned()))?;

        // Seed the accumulator with the first value that decodes.
        let mut remaining = values.iter();
        let mut accumulator: Option<Box<dyn Stat>> = None;
        for value in remaining.by_ref() {
            match serializer.decode(value) {
                Ok(stat) => {
                    accumulator = Some(stat);
                    break;
                }
                Err(err) => {
                    log_warn!(
                        component = "operator",
                        event = "stat_decode_skipped",
                        dataset = %dataset_id,
                        error = %err,
                    );
                }
            }
        }

        // Nothing decoded: hand back the first raw value rather than fail,
        // deferring correction to a later pass that sees a parseable value.
        let Some(mut accumulator) = accumulator else {
            log_warn!(
                component = "operator",
                event = "merge_all_undecodable",
                dataset = %dataset_id,
                values = values.len(),
            );
            return Ok(first.to_vec());
        };

        let mut combined = 1usize;
        for value in remaining {
            match serializer.decode(value) {
                Ok(stat) => match accumulator.combine(stat.as_ref()) {
                    Ok(()) => combined += 1,
                    Err(err) => {
                        log_warn!(
                            component = "operator",
                            event = "stat_combine_skipped",
                            dataset = %dataset_id,
                            error = %err,
                        );
                    }
                },
                Err(err) => {
                    log_warn!(
                        component = "operator",
                        event = "stat_decode_skipped",
                        dataset = %dataset_id,
                        error = %err,
                    );
                }
            }
        }

        log_debug!(
            component = "operator",
            event = "merge_completed",
            dataset = %dataset_id,
            values = values.len(),
            combined,
        );
        Ok(accumulator.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        key::DEFAULT_SEPARATOR,
        registry::{DESCRIPTOR_COUNT, DESCRIPTOR_MINMAX},
        stat::builtin::{CountSerializer, CountStat, MinMaxStat},
        stat::StatSerializer,
    };

    fn towers_operator() -> StatsMergeOperator {
        let mut config = MergeOperatorConfig::new(DEFAULT_SEPARATOR);
        config.insert("towers", DESCRIPTOR_COUNT);
        config.insert("sensors", DESCRIPTOR_MINMAX);
        StatsMergeOperator::from_config(&config)
    }

    fn decoded_count(bytes: &[u8]) -> u64 {
        let stat = CountSerializer.decode(bytes).unwrap();
        stat.as_any().downcast_ref::<CountStat>().unwrap().value()
    }

    #[test]
    fn counts_fold_across_all_values() {
        let operator = towers_operator();
        let values: Vec<Vec<u8>> = [5u64, 7, 3].iter().map(|n| CountStat::new(*n).encode()).collect();
        let refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
        let merged = operator.merge(b"towers~k1", &refs).unwrap();
        assert_eq!(decoded_count(&merged), 15);
    }

    #[test]
    fn corrupt_value_is_skipped_not_fatal() {
        let operator = towers_operator();
        let values = vec![
            CountStat::new(5).encode(),
            CountStat::new(7).encode(),
            b"garbage".to_vec(),
            CountStat::new(3).encode(),
        ];
        let refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
        let merged = operator.merge(b"towers~k1", &refs).unwrap();
        assert_eq!(decoded_count(&merged), 15);
    }

    #[test]
    fn single_value_returned_unchanged() {
        let operator = towers_operator();
        // Not even a decodable frame: the identity path must not decode.
        let raw: &[u8] = b"opaque-not-a-frame";
        let merged = operator.merge(b"towers~k1", &[raw]).unwrap();
        assert_eq!(merged, raw);
    }

    #[test]
    fn all_corrupt_returns_first_raw_value() {
        let operator = towers_operator();
        let values: Vec<&[u8]> = vec![b"junk-a", b"junk-b", b"junk-c"];
        let merged = operator.merge(b"towers~k1", &values).unwrap();
        assert_eq!(merged, b"junk-a");
    }

    #[test]
    fn unresolvable_key_is_fatal() {
        let operator = towers_operator();
        let values = [CountStat::new(1).encode(), CountStat::new(2).encode()];
        let refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
        let err = operator.merge(b"no-separator", &refs).unwrap_err();
        assert!(matches!(err, MergeError::DatasetUnresolved(_)));
    }

    #[test]
    fn unregistered_dataset_is_fatal() {
        let operator = towers_operator();
        let values = [CountStat::new(1).encode(), CountStat::new(2).encode()];
        let refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
        let err = operator.merge(b"rivers~k1", &refs).unwrap_err();
        assert!(matches!(err, MergeError::UnregisteredDataset(dataset) if dataset == "rivers"));
    }

    #[test]
    fn empty_input_is_rejected() {
        let operator = towers_operator();
        assert!(matches!(
            operator.merge(b"towers~k1", &[]),
            Err(MergeError::EmptyInput)
        ));
    }

    #[test]
    fn legacy_metadata_key_resolves() {
        let operator = towers_operator();
        let values = [CountStat::new(2).encode(), CountStat::new(9).encode()];
        let refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
        let merged = operator.merge(b"~METADATA_towers", &refs).unwrap();
        assert_eq!(decoded_count(&merged), 11);
    }

    #[test]
    fn datasets_dispatch_to_their_own_serializers() {
        let operator = towers_operator();
        let values = [MinMaxStat::of(4).encode(), MinMaxStat::of(-2).encode()];
        let refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
        let merged = operator.merge(b"sensors~site-9", &refs).unwrap();
        let stat = crate::stat::builtin::MinMaxSerializer.decode(&merged).unwrap();
        let stat = stat.as_any().downcast_ref::<MinMaxStat>().unwrap();
        assert_eq!((stat.min(), stat.max()), (-2, 4));
    }
}
