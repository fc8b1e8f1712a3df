// -
// Option defaults

/// Query option defaults, matching the documented behavior of `QueryOptions`.
pub(crate) const DEFAULT_RETRY_LIMIT: u32 = 1;
pub(crate) const DEFAULT_RETRY_TIME_MS: u64 = 5 * 60 * 1000;
pub(crate) const DEFAULT_REVALIDATE_TIME_MS: u64 = 5 * 60 * 1000;
pub(crate) const DEFAULT_CACHE_ENABLED: bool = false;
pub(crate) const DEFAULT_STORE_ENABLED: bool = false;
pub(crate) const DEFAULT_ENABLED: bool = true;
pub(crate) const DEFAULT_AUTO_FETCH: bool = false;
pub(crate) const DEFAULT_REVALIDATION_ENABLED: bool = false;

// -
// Backend routes

/// SSE push endpoint; the access token is appended as the last path segment.
pub(crate) const EVENT_LISTENER_ROUTE: &str = "api/event-listener";
/// OAuth2 client-credentials token endpoint.
pub(crate) const OAUTH_TOKEN_ROUTE: &str = "oauth2/token";

// -
// Database namespaces

/// Sled database tree namespace for persisted query results
pub(crate) const QUERY_CACHE_TREE: &str = "_query_cache_tree";
