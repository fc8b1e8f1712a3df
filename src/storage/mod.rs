// Submodule declaration
// -----------------------------------------------------------------------------
mod key_value;
mod sled_adapter;

// Re-export
// -----------------------------------------------------------------------------
pub use key_value::*;
pub use sled_adapter::*;

#[cfg(test)]
mod storage_test;
