use serde::Deserialize;

/// Locale defaults for dictionary consumers
#[derive(Debug, Deserialize, Clone)]
pub struct InternationalizationConfig {
    /// Locale used when no explicit locale is requested
    #[serde(default = "default_locale")]
    pub default_locale: String,
}

impl Default for InternationalizationConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}
