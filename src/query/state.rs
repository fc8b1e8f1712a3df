use dashmap::DashMap;

use crate::utils::time::get_now_as_millis;

/// Per-key record of an async query.
///
/// Created lazily on first access and never deleted; new attempts supersede
/// field values in place. `generation` identifies the fetch attempt that is
/// allowed to settle this record, so a stale settlement can never overwrite
/// state written by a newer attempt.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Last successfully fetched payload
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_fetched: bool,
    pub is_success: bool,
    /// Set externally by another query's success; cleared only by the next
    /// successful fetch of this key
    pub is_invalidated: bool,
    /// Shared across every consumer of the key; disabling one consumer
    /// disables them all
    pub is_enabled: bool,
    /// Last error message
    pub error: Option<String>,
    /// Consecutive failures since the last success
    pub error_count: u32,
    /// Epoch milliseconds of the last successful fetch
    pub fetched_at: Option<u64>,
    pub(crate) generation: u64,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_fetched: false,
            is_success: false,
            is_invalidated: false,
            is_enabled: true,
            error: None,
            error_count: 0,
            fetched_at: None,
            generation: 0,
        }
    }
}

impl<T> QueryState<T> {
    /// True while the very first payload is still on its way: loading with
    /// nothing fetched and nothing cached.
    pub fn is_waiting_data(&self) -> bool {
        self.is_loading && !self.is_fetched && self.data.is_none()
    }

    /// True while previously fetched data is being refreshed in the
    /// background.
    pub fn is_revalidating(&self) -> bool {
        self.is_loading && self.is_fetched
    }
}

/// Process-wide per-key state store, keyed by dedup identity.
///
/// All mutation happens under the map's shard locks so the store is safe on
/// a multi-threaded runtime.
#[derive(Debug)]
pub struct QueryStore<T> {
    entries: DashMap<String, QueryState<T>>,
}

impl<T> Default for QueryStore<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T: Clone> QueryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the state for `key`; a default record if never touched.
    pub fn states(
        &self,
        key: &str,
    ) -> QueryState<T> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Mark a fetch attempt as started: sets the loading flag and returns
    /// the attempt generation that must match at settlement.
    pub(crate) fn begin_attempt(
        &self,
        key: &str,
    ) -> u64 {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        entry.is_loading = true;
        entry.generation += 1;
        entry.generation
    }

    /// Record a successful settlement if `generation` is still current.
    pub(crate) fn settle_success(
        &self,
        key: &str,
        generation: u64,
        data: T,
    ) -> bool {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        if entry.generation != generation {
            return false;
        }
        entry.data = Some(data);
        entry.error = None;
        entry.error_count = 0;
        entry.is_loading = false;
        entry.is_fetched = true;
        entry.is_success = true;
        entry.is_invalidated = false;
        entry.fetched_at = Some(get_now_as_millis());
        true
    }

    /// Record a failed settlement if `generation` is still current.
    /// Previously cached data is left untouched (stale-while-error).
    pub(crate) fn settle_failure(
        &self,
        key: &str,
        generation: u64,
        message: String,
    ) -> bool {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        if entry.generation != generation {
            return false;
        }
        entry.is_loading = false;
        entry.is_success = false;
        entry.error = Some(message);
        entry.error_count += 1;
        true
    }

    /// Overwrite the cached payload without touching any other field.
    pub fn set_data(
        &self,
        key: &str,
        data: Option<T>,
    ) {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        entry.data = data;
    }

    /// Mark every listed key invalidated. Data is left in place; the next
    /// successful fetch clears the flag.
    pub fn invalidate(
        &self,
        keys: &[String],
    ) {
        for key in keys {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.is_invalidated = true;
        }
    }

    /// Overwrite the payload of every listed key with `data`.
    pub fn update_data(
        &self,
        keys: &[String],
        data: &T,
    ) {
        for key in keys {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.data = Some(data.clone());
        }
    }

    /// Propagate the enabled flag to every consumer sharing `key`.
    pub fn set_enabled(
        &self,
        key: &str,
        enabled: bool,
    ) {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        entry.is_enabled = enabled;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
