//! Configuration management module.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Config file (`config/dictsync.toml` or an explicit path)
//! 3. Environment variables (highest priority)
//!

mod editor;
mod internationalization;
pub use editor::*;
pub use internationalization::*;

//---
use crate::{Error, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Editor/CMS backend connection parameters
    #[serde(default)]
    pub editor: EditorConfig,
    /// Locale defaults for content consumers
    #[serde(default)]
    pub internationalization: InternationalizationConfig,
}

impl Settings {
    /// Load configuration from an optional file plus environment overlay.
    ///
    /// # Arguments
    /// * `path` - Optional explicit config file path; when absent the
    ///   default `config/dictsync` file is used if present
    ///
    /// # Returns
    /// Merged configuration with proper priority ordering
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        // 1. Config file
        match path {
            Some(custom) => config = config.add_source(File::with_name(custom).required(true)),
            None => config = config.add_source(File::with_name("config/dictsync").required(false)),
        }

        // 2. Environment variables (highest priority)
        config = config.add_source(
            Environment::with_prefix("DICTSYNC")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        config
            .build()?
            .try_deserialize()
            .map_err(|e| Error::Config(e))
    }
}
