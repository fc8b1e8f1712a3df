use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::future::Shared;

/// Handle to an in-flight fetch, shared by every caller that joined it.
/// Resolves to the fetched payload, or `None` on failure.
pub(crate) type SharedFetch<T> = Shared<BoxFuture<'static, Option<T>>>;

/// Process-wide registry of in-flight fetches keyed by dedup identity.
///
/// Entries are installed under the map entry lock before the fetch task is
/// spawned and removed by that task once the per-key state has settled, so
/// the "check registry then start" sequence is atomic: at most one operation
/// is ever in flight per identity.
pub(crate) struct PendingRegistry<T> {
    inflight: DashMap<String, SharedFetch<T>>,
}

impl<T> Default for PendingRegistry<T> {
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<T: Clone + Send + 'static> PendingRegistry<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight fetch for `identity`, or install the one produced
    /// by `start`. `start` runs only when no fetch is pending, while the
    /// entry lock is held.
    pub(crate) fn join_or_start<F>(
        &self,
        identity: &str,
        start: F,
    ) -> SharedFetch<T>
    where
        F: FnOnce() -> SharedFetch<T>,
    {
        match self.inflight.entry(identity.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => {
                let fetch = start();
                vacant.insert(fetch.clone());
                fetch
            }
        }
    }

    /// Drop the entry for `identity`, regardless of outcome.
    pub(crate) fn remove(
        &self,
        identity: &str,
    ) {
        self.inflight.remove(identity);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inflight.len()
    }
}
