//! Error hierarchy for the query cache and the dictionary change listener.
//!
//! All failures are handled locally and converted into state fields or log
//! output; none of the public operations (`execute`, `revalidate`,
//! `initialize`) panic or unwind into the caller.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Async query cache failures
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Dictionary change listener failures
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// Durable key-value store failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration loading/validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The supplied operation panicked instead of yielding an awaitable
    /// result. Programmer error; surfaced through the state `error` field
    /// and the `on_error` callback, never thrown to the caller.
    #[error("async operation did not produce an awaitable result: {0}")]
    OperationContract(String),

    /// The operation resolved with an error
    #[error("{0}")]
    OperationFailure(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// No access token could be obtained at initialization
    #[error("Failed to retrieve access token")]
    MissingAccessToken,

    /// Token endpoint request or envelope decoding failure
    #[error("Authentication request failed: {0}")]
    Auth(String),

    /// Push-connection failure; triggers unconditional listener cleanup
    #[error("Event stream transport error: {0}")]
    Transport(String),

    /// `initialize()` called on a listener that is not fresh. Reconnection
    /// requires a new instance.
    #[error("Listener already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Embedded database errors
    #[error(transparent)]
    Sled(#[from] sled::Error),

    /// Unparseable persisted payload; callers treat this as a cache miss
    #[error("Malformed persisted payload for '{key}': {source}")]
    MalformedPayload {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Persisted bytes are not valid UTF-8
    #[error("Persisted value for '{key}' is not valid UTF-8")]
    NonUtf8Value { key: String },
}
