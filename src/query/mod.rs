//! Async query cache.
//!
//! A process-wide [`QueryClient`] owns the per-key state store, the pending
//! in-flight registry and an optional durable key-value store. Consumers
//! obtain a [`QueryHandle`] per logical query; concurrent fetches for the
//! same dedup identity are coalesced into a single operation whose result is
//! shared by every caller.

// Submodule declaration
// -----------------------------------------------------------------------------
mod client;
mod handle;
mod options;
mod pending;
mod state;

// Re-export
// -----------------------------------------------------------------------------
pub use client::*;
pub use handle::*;
pub use options::*;
pub(crate) use pending::*;
pub use state::*;

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

/// Arguments forwarded to the async operation; serialized into the dedup
/// identity when non-empty.
pub type QueryArgs = Vec<Value>;

/// Error type produced by query operations
pub type OperationError = Box<dyn std::error::Error + Send + Sync>;

/// The async operation behind a query. Must yield an awaitable result; a
/// panic while producing or polling the future is treated as a contract
/// violation and recorded in the query state instead of unwinding.
pub type QueryOperation<T> =
    Arc<dyn Fn(QueryArgs) -> BoxFuture<'static, std::result::Result<T, OperationError>> + Send + Sync>;

/// Wrap an async closure into a [`QueryOperation`].
pub fn query_operation<T, F, Fut>(f: F) -> QueryOperation<T>
where
    F: Fn(QueryArgs) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = std::result::Result<T, OperationError>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// Dedup identity: `key` alone, or `key/<json(args)>` when args are present.
pub fn key_with_args(
    key: &str,
    args: &[Value],
) -> String {
    if args.is_empty() {
        return key.to_string();
    }
    match serde_json::to_string(args) {
        Ok(json) => format!("{key}/{json}"),
        // Value serialization cannot fail in practice; fall back to the bare key
        Err(_) => key.to_string(),
    }
}

#[cfg(test)]
mod handle_test;
#[cfg(test)]
mod pending_test;
