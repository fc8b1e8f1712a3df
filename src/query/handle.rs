use std::sync::Arc;
use std::sync::Weak;

use nanoid::nanoid;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::key_with_args;
use crate::QueryArgs;
use crate::QueryClient;
use crate::QueryOperation;
use crate::QueryOptions;
use crate::QueryState;

/// One consumer of a query key.
///
/// Several handles may share a key (and therefore its state); fetches are
/// coalesced through the client's pending registry. Background triggers
/// (auto-fetch, retry, revalidation) belong to the handle and are cancelled
/// when it is dropped.
pub struct QueryHandle<T> {
    inner: Arc<HandleInner<T>>,
}

struct HandleInner<T> {
    /// Short id for log correlation
    id: String,
    key: String,
    operation: QueryOperation<T>,
    options: Arc<QueryOptions<T>>,
    client: QueryClient<T>,
    /// Arguments reused by background fetches; updated by `revalidate`
    stored_args: Mutex<QueryArgs>,
    /// Cancels this instance's wait on the current in-flight fetch
    abort_token: Mutex<CancellationToken>,
    retry_timer: Mutex<CancellationToken>,
    revalidate_timer: Mutex<CancellationToken>,
    /// Tears down every background task owned by this handle
    shutdown: CancellationToken,
    this: Weak<HandleInner<T>>,
}

impl<T> QueryHandle<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    pub(crate) fn new(
        client: QueryClient<T>,
        key: String,
        operation: QueryOperation<T>,
        options: QueryOptions<T>,
    ) -> Self {
        let options = Arc::new(options);
        let stored_args = options.args.clone();
        let inner = Arc::new_cyclic(|this| HandleInner {
            id: nanoid!(10),
            key,
            operation,
            options,
            client,
            stored_args: Mutex::new(stored_args),
            abort_token: Mutex::new(CancellationToken::new()),
            retry_timer: Mutex::new(CancellationToken::new()),
            revalidate_timer: Mutex::new(CancellationToken::new()),
            shutdown: CancellationToken::new(),
            this: this.clone(),
        });
        inner.activate();
        Self { inner }
    }

    /// Public fetch trigger.
    ///
    /// No-op when the query is disabled or a fetch is already in flight.
    /// With `cache` enabled and valid data present, returns the cached
    /// payload without invoking the operation; otherwise delegates to
    /// [`revalidate`](Self::revalidate).
    pub async fn execute(
        &self,
        args: QueryArgs,
    ) -> Option<T> {
        self.inner.execute(args).await
    }

    /// Force a fetch, bypassing the cache short-circuit. Non-empty `args`
    /// replace the stored arguments used by background fetches.
    pub async fn revalidate(
        &self,
        args: QueryArgs,
    ) -> Option<T> {
        self.inner.revalidate(args).await
    }

    /// Stop waiting on the current in-flight fetch.
    ///
    /// Advisory: the shared underlying operation keeps running for other
    /// consumers that joined it, and its settlement still updates the store.
    pub fn abort(&self) {
        self.inner.abort_token.lock().cancel();
    }

    /// Overwrite the cached payload directly.
    pub fn set_data(
        &self,
        data: Option<T>,
    ) {
        self.inner.client.store.set_data(&self.inner.identity(), data);
    }

    /// Snapshot of this query's state.
    pub fn state(&self) -> QueryState<T> {
        self.inner.state()
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Current dedup identity (key plus stored arguments).
    pub fn identity(&self) -> String {
        self.inner.identity()
    }
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
        self.inner.abort_token.lock().cancel();
        self.inner.retry_timer.lock().cancel();
        self.inner.revalidate_timer.lock().cancel();
    }
}

impl<T> HandleInner<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Activation side effects: propagate the enable flag, lazily load
    /// persisted data, trigger auto-fetch.
    fn activate(&self) {
        let identity = self.identity();

        let state = self.client.store.states(&identity);
        if self.options.enable != state.is_enabled {
            self.client.store.set_enabled(&identity, self.options.enable);
        }

        if self.options.store && self.effective_enabled(&self.client.store.states(&identity)) {
            let state = self.client.store.states(&identity);
            if !state.is_invalidated && !state.is_fetched && state.data.is_none() {
                if let Some(data) = self.client.load_persisted(&identity) {
                    debug!(instance = %self.id, identity = %identity, "loaded persisted query data");
                    self.client.store.set_data(&identity, Some(data));
                }
            }
        }

        self.spawn_auto_fetch();
    }

    fn identity(&self) -> String {
        key_with_args(&self.key, &self.stored_args.lock())
    }

    fn state(&self) -> QueryState<T> {
        self.client.store.states(&self.identity())
    }

    /// Both the shared flag and this instance's own option must allow it.
    fn effective_enabled(
        &self,
        state: &QueryState<T>,
    ) -> bool {
        state.is_enabled && self.options.enable
    }

    async fn execute(
        &self,
        args: QueryArgs,
    ) -> Option<T> {
        let state = self.state();
        if !self.effective_enabled(&state) {
            debug!(instance = %self.id, key = %self.key, "query disabled; skipping execute");
            return None;
        }
        if state.is_loading {
            return None;
        }

        let has_valid_data =
            !state.is_invalidated && state.is_success && self.options.cache && state.data.is_some();
        if has_valid_data {
            return state.data;
        }

        self.revalidate(args).await
    }

    async fn revalidate(
        &self,
        args: QueryArgs,
    ) -> Option<T> {
        let state = self.state();
        if !self.effective_enabled(&state) {
            return None;
        }

        // Revalidation arguments may differ from the initial ones; keep them
        // for future background fetches.
        if !args.is_empty() {
            *self.stored_args.lock() = args;
        }

        let args = self.stored_args.lock().clone();
        self.fetch(args).await
    }

    async fn fetch(
        &self,
        args: QueryArgs,
    ) -> Option<T> {
        let identity = key_with_args(&self.key, &args);

        // A new attempt from this instance supersedes its previous wait.
        let wait = {
            let mut guard = self.abort_token.lock();
            guard.cancel();
            *guard = CancellationToken::new();
            guard.clone()
        };

        let shared =
            self.client
                .fetch_shared(&identity, self.operation.clone(), args, self.options.clone());

        // Follow-up timers are armed once the shared fetch settles, even if
        // this instance stops waiting first; an aborted wait must not
        // swallow a due retry or revalidation.
        {
            let this = self.this.clone();
            let shutdown = self.shutdown.clone();
            let settled = shared.clone();
            let identity = identity.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = settled => {}
                }
                if let Some(inner) = this.upgrade() {
                    inner.schedule_followups(&identity);
                }
            });
        }

        tokio::select! {
            _ = wait.cancelled() => {
                debug!(instance = %self.id, identity = %identity, "fetch wait aborted");
                None
            }
            result = shared => result,
        }
    }

    /// After a settlement, arm at most one background trigger: a retry while
    /// failures remain under the limit, or the next periodic revalidation.
    fn schedule_followups(
        &self,
        identity: &str,
    ) {
        let state = self.client.store.states(identity);
        if !self.effective_enabled(&state) || state.is_loading {
            return;
        }
        if self.should_retry(&state) {
            self.schedule_retry();
        } else if self.should_revalidate(&state) {
            self.schedule_revalidation();
        }
    }

    fn should_retry(
        &self,
        state: &QueryState<T>,
    ) -> bool {
        state.error_count > 0
            && self.options.retry_limit > 0
            && state.error_count <= self.options.retry_limit
            && !state.is_success
    }

    fn should_revalidate(
        &self,
        state: &QueryState<T>,
    ) -> bool {
        self.options.revalidation
            && !self.options.revalidate_time.is_zero()
            && state.is_success
            && state.fetched_at.is_some()
    }

    fn schedule_retry(&self) {
        let token = rearm(&self.retry_timer);
        let this = self.this.clone();
        let shutdown = self.shutdown.clone();
        let delay = self.options.retry_time;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = shutdown.cancelled() => return,
                _ = sleep(delay) => {}
            }
            let Some(inner) = this.upgrade() else { return };
            let state = inner.state();
            if !inner.effective_enabled(&state) || state.is_loading || !inner.should_retry(&state) {
                return;
            }
            debug!(
                instance = %inner.id,
                key = %inner.key,
                attempt = state.error_count + 1,
                "retrying failed query"
            );
            let args = inner.stored_args.lock().clone();
            inner.fetch(args).await;
        });
    }

    fn schedule_revalidation(&self) {
        let token = rearm(&self.revalidate_timer);
        let this = self.this.clone();
        let shutdown = self.shutdown.clone();
        let delay = self.options.revalidate_time;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = shutdown.cancelled() => return,
                _ = sleep(delay) => {}
            }
            let Some(inner) = this.upgrade() else { return };
            let state = inner.state();
            if !inner.effective_enabled(&state) || state.is_loading || !inner.should_revalidate(&state)
            {
                return;
            }
            debug!(instance = %inner.id, key = %inner.key, "revalidating query data");
            let args = inner.stored_args.lock().clone();
            inner.fetch(args).await;
        });
    }

    /// One fetch at activation if nothing was fetched yet (or the data was
    /// invalidated meanwhile).
    fn spawn_auto_fetch(&self) {
        if !self.options.auto_fetch {
            return;
        }
        let this = self.this.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if shutdown.is_cancelled() {
                return;
            }
            let Some(inner) = this.upgrade() else { return };
            let state = inner.state();
            if !inner.effective_enabled(&state) {
                return;
            }
            if state.is_fetched && !state.is_invalidated {
                return;
            }
            if state.is_loading {
                return;
            }
            debug!(instance = %inner.id, key = %inner.key, "auto-fetch on activation");
            let args = inner.stored_args.lock().clone();
            inner.fetch(args).await;
        });
    }
}

fn rearm(slot: &Mutex<CancellationToken>) -> CancellationToken {
    let mut guard = slot.lock();
    guard.cancel();
    *guard = CancellationToken::new();
    guard.clone()
}
