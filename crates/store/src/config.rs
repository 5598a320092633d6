//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CATALOG_BASE_URL` - Remote catalog base URL (default: <https://fakestoreapi.com>)
//! - `CATALOG_TIMEOUT_SECS` - Per-request timeout in seconds (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (e.g., production)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_CATALOG_BASE_URL: &str = "https://fakestoreapi.com";
const DEFAULT_CATALOG_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Remote catalog configuration
    pub catalog: CatalogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote catalog configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL; products are read from `{base_url}/products`
    pub base_url: Url,
    /// Timeout applied to each catalog request
    pub timeout: Duration,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            catalog: CatalogConfig::from_lookup(&lookup)?,
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.trim().is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

impl CatalogConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("CATALOG_BASE_URL")
            .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string());
        let timeout = lookup("CATALOG_TIMEOUT_SECS")
            .unwrap_or_else(|| DEFAULT_CATALOG_TIMEOUT_SECS.to_string());

        Ok(Self {
            base_url: parse_base_url("CATALOG_BASE_URL", &base_url)?,
            timeout: parse_timeout("CATALOG_TIMEOUT_SECS", &timeout)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse an http(s) base URL.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` naming `var_name` if `value` is not
/// an absolute http or https URL.
pub fn parse_base_url(var_name: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{other}' (expected http or https)"),
        )),
    }
}

/// Parse a positive number of seconds.
fn parse_timeout(var_name: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be greater than 0".to_string(),
        ));
    }

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.catalog.base_url.as_str(), "https://fakestoreapi.com/");
        assert_eq!(config.catalog.timeout, Duration::from_secs(10));
        assert!(config.sentry_dsn.is_none());
        assert!(config.sentry_environment.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CATALOG_BASE_URL", "http://localhost:8080/api"),
            ("CATALOG_TIMEOUT_SECS", "3"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
            ("SENTRY_ENVIRONMENT", "staging"),
        ])
        .unwrap();
        assert_eq!(config.catalog.base_url.as_str(), "http://localhost:8080/api");
        assert_eq!(config.catalog.timeout, Duration::from_secs(3));
        assert_eq!(
            config.sentry_dsn.as_deref(),
            Some("https://key@sentry.example.com/1")
        );
        assert_eq!(config.sentry_environment.as_deref(), Some("staging"));
    }

    #[test]
    fn test_blank_sentry_dsn_is_ignored() {
        let config = load(&[("SENTRY_DSN", "  ")]).unwrap();
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = load(&[("CATALOG_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref var, _) if var == "CATALOG_BASE_URL"));
    }

    #[test]
    fn test_non_http_base_url() {
        let err = load(&[("CATALOG_BASE_URL", "ftp://files.example.com")]).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'ftp'"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = load(&[("CATALOG_TIMEOUT_SECS", "0")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid environment variable CATALOG_TIMEOUT_SECS: must be greater than 0"
        );
    }

    #[test]
    fn test_non_numeric_timeout_rejected() {
        assert!(load(&[("CATALOG_TIMEOUT_SECS", "soon")]).is_err());
    }
}
