//! Bearer credential acquisition for the FHIR API.
//!
//! Credentials come from a local token-issuing endpoint that holds the real
//! OAuth client secret. Every handler invocation that talks to the FHIR
//! server asks for a fresh one; nothing is pooled or cached here.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DispatchError;

/// A short-lived bearer token. Expiry is not tracked.
#[derive(Clone)]
pub struct Credential {
    pub token: String,
}

// Keep tokens out of logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire(&self) -> Result<Credential, DispatchError>;
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Fetches credentials from `GET <token_url>`
#[derive(Debug)]
pub struct TokenEndpoint {
    http_client: reqwest::Client,
    token_url: String,
}

impl TokenEndpoint {
    pub fn new(token_url: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let parsed = url::Url::parse(token_url)
            .map_err(|e| DispatchError::UrlError(format!("Invalid URL '{}': {}", token_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DispatchError::UrlError(format!(
                "URL must use http or https scheme, got: {}",
                parsed.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Auth(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            token_url: token_url.to_string(),
        })
    }
}

#[async_trait]
impl CredentialProvider for TokenEndpoint {
    async fn acquire(&self) -> Result<Credential, DispatchError> {
        let response = self
            .http_client
            .get(&self.token_url)
            .send()
            .await
            .map_err(|e| DispatchError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token endpoint returned {}", status);
            return Err(DispatchError::Auth(body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DispatchError::Auth(format!("Invalid token response: {}", e)))?;

        debug!("Acquired bearer credential");

        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(|token| Credential { token })
            .ok_or_else(|| DispatchError::Auth("Token response had no access_token".to_string()))
    }
}
