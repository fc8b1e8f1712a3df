use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::KeyValueStore;
use crate::PendingRegistry;
use crate::QueryArgs;
use crate::QueryError;
use crate::QueryHandle;
use crate::QueryOperation;
use crate::QueryOptions;
use crate::QueryState;
use crate::QueryStore;
use crate::SharedFetch;
use crate::StorageError;

/// Process-wide query cache service.
///
/// Owns the per-key state store, the pending in-flight registry and an
/// optional durable key-value store. Cheap to clone; clones share state.
/// Multiple isolated clients may coexist (each has its own store and
/// registry), which keeps tests hermetic.
pub struct QueryClient<T> {
    pub(crate) store: Arc<QueryStore<T>>,
    pub(crate) pending: Arc<PendingRegistry<T>>,
    pub(crate) persistence: Option<Arc<dyn KeyValueStore>>,
}

impl<T> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            pending: self.pending.clone(),
            persistence: self.persistence.clone(),
        }
    }
}

impl<T> Default for QueryClient<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryClient<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    pub fn new() -> Self {
        Self {
            store: Arc::new(QueryStore::new()),
            pending: Arc::new(PendingRegistry::new()),
            persistence: None,
        }
    }

    /// Client whose successful results are persisted to `persistence` when a
    /// query opts into `store`.
    pub fn with_persistence(persistence: Arc<dyn KeyValueStore>) -> Self {
        Self {
            persistence: Some(persistence),
            ..Self::new()
        }
    }

    /// Shared per-key state store
    pub fn store(&self) -> &QueryStore<T> {
        &self.store
    }

    /// Snapshot of the state behind `key` (a dedup identity)
    pub fn states(
        &self,
        key: &str,
    ) -> QueryState<T> {
        self.store.states(key)
    }

    /// Create a consumer handle for `key`.
    ///
    /// Activation side effects (enable-flag sync, lazy store loading,
    /// auto-fetch) run immediately; the call must happen inside a tokio
    /// runtime.
    pub fn query(
        &self,
        key: impl Into<String>,
        operation: QueryOperation<T>,
        options: QueryOptions<T>,
    ) -> QueryHandle<T> {
        QueryHandle::new(self.clone(), key.into(), operation, options)
    }

    /// Join the in-flight fetch for `identity` or start a new one.
    ///
    /// The registry entry is installed under the entry lock before the fetch
    /// task spawns, and the task removes it after the per-key state settles
    /// and before waiters are woken; every concurrent caller therefore
    /// observes exactly one operation invocation per identity.
    pub(crate) fn fetch_shared(
        &self,
        identity: &str,
        operation: QueryOperation<T>,
        args: QueryArgs,
        options: Arc<QueryOptions<T>>,
    ) -> SharedFetch<T> {
        let mut starter: Option<oneshot::Sender<Option<T>>> = None;

        let shared = self.pending.join_or_start(identity, || {
            let (tx, rx) = oneshot::channel::<Option<T>>();
            starter = Some(tx);
            rx.map(|settled| settled.ok().flatten()).boxed().shared()
        });

        match starter {
            Some(tx) => {
                let client = self.clone();
                let identity = identity.to_string();
                tokio::spawn(async move {
                    let result = client.run_fetch(&identity, operation, args, options).await;
                    // Settled state must be visible before any waiter wakes up.
                    client.pending.remove(&identity);
                    let _ = tx.send(result);
                });
            }
            None => debug!(identity, "joining in-flight fetch"),
        }

        shared
    }

    /// Fetch core: loading flag, operation call, success/failure
    /// bookkeeping, cross-query propagation, persistence.
    async fn run_fetch(
        &self,
        identity: &str,
        operation: QueryOperation<T>,
        args: QueryArgs,
        options: Arc<QueryOptions<T>>,
    ) -> Option<T> {
        let generation = self.store.begin_attempt(identity);

        // A panic while producing the future is a contract violation, not a
        // crash: it becomes the state's error message.
        let operation_future = match std::panic::catch_unwind(AssertUnwindSafe(|| operation(args))) {
            Ok(future) => future,
            Err(panic) => {
                let err = QueryError::OperationContract(panic_message(panic));
                error!(identity, %err, "query operation violated its contract");
                self.record_failure(identity, generation, &options, err.to_string());
                return None;
            }
        };

        match AssertUnwindSafe(operation_future).catch_unwind().await {
            Ok(Ok(data)) => {
                self.store.settle_success(identity, generation, data.clone());
                if let Some(on_success) = &options.on_success {
                    on_success(&data);
                }
                if !options.invalidate_queries.is_empty() {
                    self.store.invalidate(&options.invalidate_queries);
                }
                if !options.update_queries.is_empty() {
                    self.store.update_data(&options.update_queries, &data);
                }
                if options.store {
                    self.persist(identity, &data);
                }
                Some(data)
            }
            Ok(Err(failure)) => {
                let err = QueryError::OperationFailure(failure.to_string());
                warn!(identity, %err, "query operation failed");
                self.record_failure(identity, generation, &options, err.to_string());
                None
            }
            Err(panic) => {
                let err = QueryError::OperationContract(panic_message(panic));
                error!(identity, %err, "query operation violated its contract");
                self.record_failure(identity, generation, &options, err.to_string());
                None
            }
        }
    }

    fn record_failure(
        &self,
        identity: &str,
        generation: u64,
        options: &QueryOptions<T>,
        message: String,
    ) {
        self.store.settle_failure(identity, generation, message.clone());
        if let Some(on_error) = &options.on_error {
            on_error(&message);
        }
    }

    fn persist(
        &self,
        identity: &str,
        data: &T,
    ) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        match serde_json::to_string(data) {
            Ok(json) => {
                if let Err(e) = persistence.set_item(identity, &json) {
                    error!(identity, "failed to persist query result: {e}");
                }
            }
            Err(e) => error!(identity, "failed to serialize query result: {e}"),
        }
    }

    /// Load a previously persisted payload. Any failure is logged and
    /// reported as a miss.
    pub(crate) fn load_persisted(
        &self,
        identity: &str,
    ) -> Option<T> {
        let persistence = self.persistence.as_ref()?;
        let raw = match persistence.get_item(identity) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!(identity, "failed to read persisted query result: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(data) => Some(data),
            Err(source) => {
                let err = StorageError::MalformedPayload {
                    key: identity.to_string(),
                    source,
                };
                error!("{err}");
                None
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_string()
    }
}
