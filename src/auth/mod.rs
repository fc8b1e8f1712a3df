//! Access token acquisition for the editor backend.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::EditorConfig;
use crate::ListenerError;
use crate::OAUTH_TOKEN_ROUTE;

/// Source of bearer tokens for authenticated backend routes.
///
/// `Ok(None)` means the provider is not configured for authentication (for
/// example missing credentials), as opposed to a failed token request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> std::result::Result<Option<String>, ListenerError>;
}

/// OAuth2 client-credentials flow against the editor backend.
#[derive(Debug, Clone)]
pub struct OAuth2TokenProvider {
    http: reqwest::Client,
    backend_url: String,
    client_id: String,
    client_secret: String,
}

/// Token responses arrive wrapped in the backend's standard `data` envelope.
#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(rename = "accessToken")]
    access_token: String,
}

impl OAuth2TokenProvider {
    pub fn new(editor: &EditorConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            backend_url: editor.backend_url.trim_end_matches('/').to_string(),
            client_id: editor.client_id.clone(),
            client_secret: editor.client_secret.clone(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for OAuth2TokenProvider {
    async fn access_token(&self) -> std::result::Result<Option<String>, ListenerError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            debug!("no oauth credentials configured; skipping token request");
            return Ok(None);
        }

        let url = format!("{}/{}", self.backend_url, OAUTH_TOKEN_ROUTE);
        let envelope: TokenEnvelope = self
            .http
            .post(&url)
            .json(&json!({
                "grant_type": "client_credentials",
                "client_id": self.client_id,
                "client_secret": self.client_secret,
            }))
            .send()
            .await
            .map_err(|e| ListenerError::Auth(e.to_string()))?
            .error_for_status()
            .map_err(|e| ListenerError::Auth(e.to_string()))?
            .json()
            .await
            .map_err(|e| ListenerError::Auth(e.to_string()))?;

        Ok(Some(envelope.data.access_token))
    }
}

#[cfg(test)]
mod auth_test;
