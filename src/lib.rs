mod auth;
mod config;
mod constants;
mod errors;
mod listener;
mod query;
mod storage;
pub mod utils;

pub use auth::*;
pub use config::*;
pub use errors::*;
pub use listener::*;
pub use query::*;
pub use storage::*;

pub(crate) use constants::*;
