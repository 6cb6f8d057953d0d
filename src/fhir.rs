//! FHIR R4 client
//!
//! Thin request layer over the clinical-records API. Every call acquires its
//! own bearer credential, sends one request and hands back the raw status plus
//! a best-effort parsed body. Interpreting that outcome is the correlator's
//! job, not this module's.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::credentials::{CredentialProvider, TokenEndpoint};
use crate::envelope::parse_or_null;
use crate::error::DispatchError;

/// Media type for FHIR JSON documents (reads and writes)
pub const FHIR_JSON: &str = "application/fhir+json";

/// Status and parsed body of a completed FHIR call
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// FHIR client for API interactions
pub struct FhirClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl std::fmt::Debug for FhirClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FhirClient {
    /// Create a new FHIR client against `base_url` (e.g. `.../api/FHIR/R4`)
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let cleaned_url = base_url.trim_end_matches('/');
        info!("Creating FhirClient with base_url: {}", cleaned_url);

        // Validate URL
        let parsed = url::Url::parse(cleaned_url)
            .map_err(|e| DispatchError::UrlError(format!("Invalid URL '{}': {}", cleaned_url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DispatchError::UrlError(format!(
                "URL must use http or https scheme, got: {}",
                parsed.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::UrlError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: cleaned_url.to_string(),
            credentials,
        })
    }

    /// Build a client plus token-endpoint credential provider from config
    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        let credentials = TokenEndpoint::new(&config.token_url, config.request_timeout())?;
        Self::new(
            &config.fhir_base_url,
            Arc::new(credentials),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base}/{resource_type}` with a FHIR JSON document
    pub async fn create(
        &self,
        resource_type: &str,
        resource: &Value,
    ) -> Result<UpstreamResponse, DispatchError> {
        let credential = self.credentials.acquire().await?;
        let url = format!("{}/{}", self.base_url, resource_type);
        let body = serde_json::to_vec(resource)?;

        let request = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .bearer_auth(&credential.token)
            .body(body);

        self.execute(request, resource_type, "create").await
    }

    /// `GET {base}/{resource_type}?{params}`
    pub async fn search(
        &self,
        resource_type: &str,
        params: &[(&str, String)],
    ) -> Result<UpstreamResponse, DispatchError> {
        let credential = self.credentials.acquire().await?;
        let url = search_url(&self.base_url, resource_type, params);

        let request = self
            .http_client
            .get(&url)
            .header(ACCEPT, FHIR_JSON)
            .bearer_auth(&credential.token);

        self.execute(request, resource_type, "search").await
    }

    /// `GET {base}/{resource_type}/{id}`
    pub async fn read(&self, resource_type: &str, id: &str) -> Result<UpstreamResponse, DispatchError> {
        let credential = self.credentials.acquire().await?;
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            resource_type,
            urlencoding::encode(id)
        );

        let request = self
            .http_client
            .get(&url)
            .header(ACCEPT, FHIR_JSON)
            .bearer_auth(&credential.token);

        self.execute(request, resource_type, "read").await
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        resource_type: &str,
        interaction: &str,
    ) -> Result<UpstreamResponse, DispatchError> {
        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        info!(
            "FHIR {}.{} status {} in {}ms",
            resource_type,
            interaction,
            status,
            started.elapsed().as_millis()
        );
        for (name, value) in response.headers() {
            debug!("  {}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
        if status == StatusCode::CREATED {
            if let Some(location) = response.headers().get(reqwest::header::LOCATION) {
                info!("FHIR {} created at {:?}", resource_type, location);
            }
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                debug!("Failed to read FHIR response body: {}", e);
                Default::default()
            }
        };

        Ok(UpstreamResponse {
            status,
            body: parse_or_null(&bytes),
        })
    }
}

/// Build a search URL, skipping parameters whose value is empty
pub fn search_url(base_url: &str, resource_type: &str, params: &[(&str, String)]) -> String {
    let query = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        format!("{}/{}", base_url, resource_type)
    } else {
        format!("{}/{}?{}", base_url, resource_type, query)
    }
}
