//! Immutable dataset-to-serializer snapshots.
//!
//! A registry is built exactly once per operator instance from the
//! configuration current at that moment, then only read. Concurrent merge
//! tasks each hold their own snapshot, so the merge path needs no locking
//! and never observes a half-applied reconfiguration.

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;

use crate::{
    observability::log_warn,
    stat::{
        builtin::{CountSerializer, MinMaxSerializer, SumSerializer},
        StatSerializer,
    },
};

/// Schema descriptor understood by the built-in factory: additive count.
pub const DESCRIPTOR_COUNT: &str = "count";
/// Schema descriptor understood by the built-in factory: additive sum.
pub const DESCRIPTOR_SUM: &str = "sum";
/// Schema descriptor understood by the built-in factory: min/max.
pub const DESCRIPTOR_MINMAX: &str = "minmax";

/// A schema descriptor could not be turned into a serializer.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The descriptor names no statistic kind the factory knows.
    #[error("unknown schema descriptor `{0}`")]
    UnknownDescriptor(String),
}

/// Maps a schema descriptor string to a serializer instance.
///
/// The default factory covers the built-in descriptors; embedders supply
/// their own to plug custom sketch types into the same registry and merge
/// path.
pub type SerializerFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn StatSerializer>, SchemaError> + Send + Sync>;

/// Build a serializer from a built-in schema descriptor.
pub fn build_serializer(descriptor: &str) -> Result<Arc<dyn StatSerializer>, SchemaError> {
    match descriptor {
        DESCRIPTOR_COUNT => Ok(Arc::new(CountSerializer)),
        DESCRIPTOR_SUM => Ok(Arc::new(SumSerializer)),
        DESCRIPTOR_MINMAX => Ok(Arc::new(MinMaxSerializer)),
        other => Err(SchemaError::UnknownDescriptor(other.to_owned())),
    }
}

/// The factory backing [`SerializerRegistry::from_snapshot`].
pub fn default_factory() -> SerializerFactory {
    Arc::new(build_serializer)
}

/// An immutable `dataset id -> serializer` snapshot.
#[derive(Debug, Clone, Default)]
pub struct SerializerRegistry {
    serializers: HashMap<String, Arc<dyn StatSerializer>>,
}

impl SerializerRegistry {
    /// Build a registry from `(dataset id, schema descriptor)` pairs using
    /// the built-in factory.
    ///
    /// Entries whose descriptor the factory rejects are logged and skipped;
    /// construction itself never fails. The skipped dataset surfaces later
    /// as an unregistered-dataset error if a merge is asked to handle it.
    pub fn from_snapshot<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::with_factory(entries, &default_factory())
    }

    /// Build a registry with a custom serializer factory.
    pub fn with_factory<'a, I>(entries: I, factory: &SerializerFactory) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut serializers = HashMap::new();
        for (dataset_id, descriptor) in entries {
            match factory(descriptor) {
                Ok(serializer) => {
                    serializers.insert(dataset_id.to_owned(), serializer);
                }
                Err(err) => {
                    log_warn!(
                        component = "registry",
                        event = "serializer_skipped",
                        dataset = %dataset_id,
                        error = %err,
                    );
                }
            }
        }
        SerializerRegistry { serializers }
    }

    /// Look up the serializer registered for `dataset_id`.
    pub fn resolve(&self, dataset_id: &str) -> Option<&Arc<dyn StatSerializer>> {
        self.serializers.get(dataset_id)
    }

    /// Number of registered datasets.
    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    /// Whether the registry holds no serializers at all.
    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Iterate the registered dataset ids, in no particular order.
    pub fn dataset_ids(&self) -> impl Iterator<Item = &str> {
        self.serializers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_dataset() {
        let registry =
            SerializerRegistry::from_snapshot([("towers", DESCRIPTOR_COUNT), ("sensors", DESCRIPTOR_MINMAX)]);
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("towers").is_some());
        assert!(registry.resolve("unknown").is_none());
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        let registry = SerializerRegistry::from_snapshot([
            ("towers", DESCRIPTOR_COUNT),
            ("broken", "no-such-descriptor"),
        ]);
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("broken").is_none());
        assert!(registry.resolve("towers").is_some());
    }

    #[test]
    fn custom_factory_is_consulted() {
        let factory: SerializerFactory = Arc::new(|descriptor: &str| {
            if descriptor == "always-count" {
                Ok(Arc::new(crate::stat::builtin::CountSerializer) as _)
            } else {
                Err(SchemaError::UnknownDescriptor(descriptor.to_owned()))
            }
        });
        let registry = SerializerRegistry::with_factory([("a", "always-count")], &factory);
        assert!(registry.resolve("a").is_some());
    }
}
