//! Survey API client configuration.
//!
//! One base URL for the whole API. Defaults to a local server; override via
//! environment variables or explicit construction.

use std::time::Duration;

use url::Url;

/// Default API location, matching the server's default port.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Configuration for connecting to the survey API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `http://127.0.0.1:8080`.
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Backoff applied to transport failures.
    pub retry: RetryPolicy,
}

/// Retries for requests that never reached the API.
///
/// A response with any status is final. Delays double from `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CONSURVEY_API_URL` (default: `http://127.0.0.1:8080`)
    /// - `CONSURVEY_TIMEOUT_SECS` (default: 30)
    /// - `CONSURVEY_MAX_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = RetryPolicy::default();
        Ok(Self {
            base_url: env_url("CONSURVEY_API_URL", DEFAULT_API_URL)?,
            timeout_secs: std::env::var("CONSURVEY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            retry: RetryPolicy {
                max_retries: std::env::var("CONSURVEY_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.max_retries),
                ..defaults
            },
        })
    }

    /// Configuration for an explicit base URL with the default timeout.
    pub fn for_url(raw: &str) -> Result<Self, ConfigError> {
        let base_url =
            Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_url_keeps_default_timeout() {
        let cfg = ClientConfig::for_url("http://127.0.0.1:9000").unwrap();
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(200));
        assert_eq!(policy.delay(1), Duration::from_millis(400));
        assert_eq!(policy.delay(2), Duration::from_millis(800));
    }

    #[test]
    fn for_url_rejects_garbage() {
        assert!(matches!(
            ClientConfig::for_url("not a url"),
            Err(ConfigError::InvalidUrl(..))
        ));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("CONSURVEY_NONEXISTENT_VAR_12345", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn env_url_rejects_invalid_url() {
        std::env::set_var("CONSURVEY_TEST_BAD_URL", "not a url");
        let result = env_url("CONSURVEY_TEST_BAD_URL", "https://example.com");
        std::env::remove_var("CONSURVEY_TEST_BAD_URL");
        assert!(result.is_err());
    }
}
