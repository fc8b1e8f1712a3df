//! Dictionary change listener.
//!
//! A [`DictionaryListener`] holds one long-lived server-push connection and
//! dispatches dictionary change batches to application callbacks. Transport
//! errors tear the listener down; reconnection is the caller's job via a new
//! instance.

// Submodule declaration
// -----------------------------------------------------------------------------
mod event;
mod listener;
mod transport;

// Re-export
// -----------------------------------------------------------------------------
pub use event::*;
pub use listener::*;
pub use transport::*;
