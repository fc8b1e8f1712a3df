use serde::Deserialize;

/// Connection parameters for the editor/CMS backend that serves the OAuth
/// token endpoint and the dictionary event stream.
#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    /// Whether the editor integration is active
    #[serde(default)]
    pub enabled: bool,

    /// OAuth2 client id for the client-credentials grant
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret for the client-credentials grant
    #[serde(default)]
    pub client_secret: String,

    /// Base URL of the editor backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            backend_url: default_backend_url(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:3100".to_string()
}
