//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default backend origin for local development.
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Client configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend origin, without a trailing slash.
    pub api_url: String,
    /// Bearer token for user-scoped endpoints.
    pub api_token: Option<SecretString>,
    /// `X-Admin-Key` value for the review queue.
    pub admin_key: Option<SecretString>,
    /// Port the wizard HTTP surface binds to.
    pub bind_port: u16,
    /// Directory holding the session-scoped draft blob.
    pub session_dir: PathBuf,
    /// Fixed interval for the pending-verification poller.
    pub poll_interval: Duration,
    /// Per-request timeout for backend calls.
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            admin_key: None,
            bind_port: 8080,
            session_dir: PathBuf::from("./data/session"),
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = match std::env::var("APLITE_API_URL") {
            Ok(url) => normalize_api_url(&url)?,
            Err(_) => defaults.api_url,
        };

        let api_token = std::env::var("APLITE_API_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let admin_key = std::env::var("APLITE_ADMIN_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let bind_port = parse_env("APLITE_BIND_PORT")?.unwrap_or(defaults.bind_port);

        let session_dir = std::env::var("APLITE_SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_dir);

        let poll_interval = parse_env::<u64>("APLITE_POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let request_timeout = parse_env::<u64>("APLITE_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "APLITE_POLL_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            api_url,
            api_token,
            admin_key,
            bind_port,
            session_dir,
            poll_interval,
            request_timeout,
        })
    }
}

/// Validate an API origin and strip any trailing slash.
pub fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: "APLITE_API_URL".to_string(),
            message: format!("expected an http(s) origin, got {raw:?}"),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("could not parse {raw:?}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_trailing_slash_is_stripped() {
        assert_eq!(
            normalize_api_url("https://api.aplite.io/").unwrap(),
            "https://api.aplite.io"
        );
    }

    #[test]
    fn api_url_requires_http_scheme() {
        let err = normalize_api_url("api.aplite.io").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.admin_key.is_none());
    }

    #[test]
    fn unset_env_var_parses_to_none() {
        let parsed: Option<u16> = parse_env("APLITE_TEST_SURELY_UNSET_VAR").unwrap();
        assert!(parsed.is_none());
    }
}
