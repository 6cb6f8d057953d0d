use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Default FHIR R4 base URL (Epic sandbox)
pub const DEFAULT_FHIR_BASE_URL: &str = "https://fhir.epic.com/interconnect-fhir-oauth/api/FHIR/R4";

/// Default local token-issuing endpoint
pub const DEFAULT_TOKEN_URL: &str = "http://localhost:8080/getToken";

/// How requests inside one batch are scheduled relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchOrdering {
    /// Context-writing calls (patient search) finish before the rest start
    #[default]
    ContextFirst,
    /// Everything runs at once; a same-batch search and a context-fallback
    /// read race on the session context
    Concurrent,
}

impl std::str::FromStr for BatchOrdering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "context_first" => Ok(BatchOrdering::ContextFirst),
            "concurrent" => Ok(BatchOrdering::Concurrent),
            other => Err(format!("Unknown batch ordering: {}", other)),
        }
    }
}

/// Internal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    pub fhir_base_url: String,
    pub token_url: String,
    pub request_timeout_secs: u64,
    pub listen_port: u16,
    pub batch_ordering: BatchOrdering,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            fhir_base_url: DEFAULT_FHIR_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            request_timeout_secs: 30,
            listen_port: 7102,
            batch_ordering: BatchOrdering::ContextFirst,
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".ehr-dispatch"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file or return default
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default().with_env_overrides()
            }
        }
    }

    /// Load config from the default location, then apply env overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Ok(Self::load_from(&path)?.with_env_overrides())
    }

    /// Load config from a specific file; a missing file yields defaults
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `EHR_*` environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("EHR_FHIR_BASE_URL") {
            self.fhir_base_url = url;
        }
        if let Ok(url) = std::env::var("EHR_TOKEN_URL") {
            self.token_url = url;
        }
        if let Ok(port) = std::env::var("EHR_LISTEN_PORT") {
            match port.parse() {
                Ok(p) => self.listen_port = p,
                Err(_) => debug!("Ignoring invalid EHR_LISTEN_PORT: {}", port),
            }
        }
        if let Ok(ordering) = std::env::var("EHR_BATCH_ORDERING") {
            match ordering.parse() {
                Ok(o) => self.batch_ordering = o,
                Err(e) => debug!("Ignoring EHR_BATCH_ORDERING: {}", e),
            }
        }
        self
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.fhir_base_url, DEFAULT_FHIR_BASE_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.batch_ordering, BatchOrdering::ContextFirst);
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.listen_port, 7102);
        assert_eq!(config.batch_ordering, BatchOrdering::ContextFirst);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            token_url: "http://127.0.0.1:9999/token".to_string(),
            batch_ordering: BatchOrdering::Concurrent,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.token_url, "http://127.0.0.1:9999/token");
        assert_eq!(loaded.batch_ordering, BatchOrdering::Concurrent);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"listen_port": 9000}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.listen_port, 9000);
        assert_eq!(loaded.fhir_base_url, DEFAULT_FHIR_BASE_URL);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("EHR_TOKEN_URL", "http://10.0.0.5:8080/getToken");
        std::env::set_var("EHR_LISTEN_PORT", "not-a-port");
        std::env::set_var("EHR_BATCH_ORDERING", "concurrent");
        let config = Config::default().with_env_overrides();
        std::env::remove_var("EHR_TOKEN_URL");
        std::env::remove_var("EHR_LISTEN_PORT");
        std::env::remove_var("EHR_BATCH_ORDERING");

        assert_eq!(config.token_url, "http://10.0.0.5:8080/getToken");
        assert_eq!(config.listen_port, 7102);
        assert_eq!(config.batch_ordering, BatchOrdering::Concurrent);
    }

    #[test]
    fn test_batch_ordering_from_str() {
        assert_eq!("concurrent".parse::<BatchOrdering>(), Ok(BatchOrdering::Concurrent));
        assert_eq!("context_first".parse::<BatchOrdering>(), Ok(BatchOrdering::ContextFirst));
        assert!("random".parse::<BatchOrdering>().is_err());
    }
}
