use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;

use crate::StorageError;

/// Durable local key-value store used to persist successful query results.
///
/// Values are JSON-serialized payloads keyed by the query dedup identity.
/// Read failures are reported as errors; callers are expected to treat them
/// as cache misses.
#[cfg_attr(test, automock)]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw persisted value for `id`, if any
    fn get_item(&self, id: &str) -> std::result::Result<Option<String>, StorageError>;

    /// Persist `value` under `id`, overwriting any previous value
    fn set_item(&self, id: &str, value: &str) -> std::result::Result<(), StorageError>;
}

/// Process-local [`KeyValueStore`] backed by a concurrent map. Useful for
/// tests and for callers that want `store` semantics without a disk footprint.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, id: &str) -> std::result::Result<Option<String>, StorageError> {
        Ok(self.entries.get(id).map(|v| v.value().clone()))
    }

    fn set_item(&self, id: &str, value: &str) -> std::result::Result<(), StorageError> {
        self.entries.insert(id.to_string(), value.to_string());
        Ok(())
    }
}
