//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PASAR_API_URL` - Base URL of the commerce backend (e.g., <https://api.example.com>)
//!
//! ## Optional
//! - `PASAR_FETCH_THROTTLE_MS` - Minimum interval between cart fetches (default: 1000)
//! - `PASAR_TOKEN_EXPIRY_BUFFER_MINS` - Remaining token lifetime that triggers
//!   the refresh routine (default: 15)
//! - `PASAR_VERIFY_INTERVAL_SECS` - Background verification interval (default: 300)
//! - `PASAR_REQUEST_TIMEOUT_SECS` - Per-request HTTP timeout (default: 30)

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client library configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the commerce backend.
    pub api_url: Url,
    /// Minimum interval between cart fetches. Coarse rate limiter, not a
    /// correctness guarantee.
    pub fetch_throttle: Duration,
    /// Remaining token lifetime below which the refresh routine fires.
    pub token_expiry_buffer: Duration,
    /// Interval for the background verification loop.
    pub verify_interval: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with default intervals for the given backend URL.
    #[must_use]
    pub const fn new(api_url: Url) -> Self {
        Self {
            api_url,
            fetch_throttle: Duration::from_millis(1000),
            token_expiry_buffer: Duration::from_secs(15 * 60),
            verify_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `PASAR_API_URL` is missing or any variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = get_required_env("PASAR_API_URL")?
            .parse::<Url>()
            .map_err(|e| ConfigError::InvalidEnvVar("PASAR_API_URL".to_string(), e.to_string()))?;

        let fetch_throttle =
            Duration::from_millis(get_parsed_or_default("PASAR_FETCH_THROTTLE_MS", 1000)?);
        let token_expiry_buffer =
            Duration::from_secs(get_parsed_or_default("PASAR_TOKEN_EXPIRY_BUFFER_MINS", 15)? * 60);
        let verify_interval =
            Duration::from_secs(get_parsed_or_default("PASAR_VERIFY_INTERVAL_SECS", 300)?);
        let request_timeout =
            Duration::from_secs(get_parsed_or_default("PASAR_REQUEST_TIMEOUT_SECS", 30)?);

        Ok(Self {
            api_url,
            fetch_throttle,
            token_expiry_buffer,
            verify_interval,
            request_timeout,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable parsed as `u64`, with a default when unset.
fn get_parsed_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = ClientConfig::new("https://api.example.com".parse().unwrap());
        assert_eq!(config.fetch_throttle, Duration::from_millis(1000));
        assert_eq!(config.token_expiry_buffer, Duration::from_secs(900));
        assert_eq!(config.verify_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_parsed_or_default_uses_default_when_unset() {
        assert_eq!(
            get_parsed_or_default("PASAR_TEST_UNSET_VAR", 42).unwrap(),
            42
        );
    }
}
