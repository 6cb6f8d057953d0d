//! Error taxonomy for the dispatch core.
//!
//! None of these escape a handler: each one is converted into a failed
//! response envelope by the correlator. `Parse` never reaches an envelope at
//! all, it is swallowed by `envelope::parse_or_null`.

/// Error text returned when a sub-resource search has neither a `patientId`
/// argument nor a patient in the session context.
pub const NO_IDENTIFIER: &str = "no identifier available";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Credential acquisition failed (token endpoint status or transport)
    #[error("Token fetch error: {0}")]
    Auth(String),

    /// Network-level failure calling the resource API
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Required argument missing and no fallback available
    #[error("{0}")]
    Validation(String),

    /// Response body was not valid JSON
    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(String),
}

impl DispatchError {
    pub fn no_identifier() -> Self {
        DispatchError::Validation(NO_IDENTIFIER.to_string())
    }
}
