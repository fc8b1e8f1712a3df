use std::sync::Arc;
use std::time::Duration;

use crate::QueryArgs;
use crate::DEFAULT_AUTO_FETCH;
use crate::DEFAULT_CACHE_ENABLED;
use crate::DEFAULT_ENABLED;
use crate::DEFAULT_RETRY_LIMIT;
use crate::DEFAULT_RETRY_TIME_MS;
use crate::DEFAULT_REVALIDATE_TIME_MS;
use crate::DEFAULT_REVALIDATION_ENABLED;
use crate::DEFAULT_STORE_ENABLED;

/// Invoked with the payload after every successful fetch
pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
/// Invoked with the error message after every failed fetch
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Behavior knobs for one query consumer.
///
/// Construct with struct-update syntax:
///
/// ```rust,ignore
/// let options = QueryOptions {
///     cache: true,
///     auto_fetch: true,
///     ..QueryOptions::default()
/// };
/// ```
pub struct QueryOptions<T> {
    /// Automatic retries after a failure before giving up (0 disables)
    pub retry_limit: u32,
    /// Delay before a scheduled retry
    pub retry_time: Duration,
    /// Return cached data directly when it is present, successful and not
    /// invalidated
    pub cache: bool,
    /// Persist successful results to the client's durable key-value store
    /// and lazily load them back on the next consumer activation
    pub store: bool,
    /// Disabled consumers suppress every fetch trigger; the flag is
    /// synchronized across all consumers sharing the key
    pub enable: bool,
    /// Trigger one fetch at activation if nothing was fetched yet
    pub auto_fetch: bool,
    /// Periodically refresh fetched data while idle
    pub revalidation: bool,
    /// Interval between background revalidations
    pub revalidate_time: Duration,
    /// Keys marked invalidated when this query succeeds
    pub invalidate_queries: Vec<String>,
    /// Keys whose data is overwritten with this query's result on success
    pub update_queries: Vec<String>,
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
    /// Default arguments for fetches triggered in the background
    pub args: QueryArgs,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_time: Duration::from_millis(DEFAULT_RETRY_TIME_MS),
            cache: DEFAULT_CACHE_ENABLED,
            store: DEFAULT_STORE_ENABLED,
            enable: DEFAULT_ENABLED,
            auto_fetch: DEFAULT_AUTO_FETCH,
            revalidation: DEFAULT_REVALIDATION_ENABLED,
            revalidate_time: Duration::from_millis(DEFAULT_REVALIDATE_TIME_MS),
            invalidate_queries: Vec::new(),
            update_queries: Vec::new(),
            on_success: None,
            on_error: None,
            args: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for QueryOptions<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("retry_limit", &self.retry_limit)
            .field("retry_time", &self.retry_time)
            .field("cache", &self.cache)
            .field("store", &self.store)
            .field("enable", &self.enable)
            .field("auto_fetch", &self.auto_fetch)
            .field("revalidation", &self.revalidation)
            .field("revalidate_time", &self.revalidate_time)
            .field("invalidate_queries", &self.invalidate_queries)
            .field("update_queries", &self.update_queries)
            .field("args", &self.args)
            .finish()
    }
}
