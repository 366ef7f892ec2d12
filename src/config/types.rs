//! Configuration types.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Bridge configuration, loaded from TOML.
///
/// Every field has a default except `webhook_url`, which must be
/// present and non-empty for the process to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Destination for admitted notifications.
    pub webhook_url: String,
    /// Bundle identifiers admitted by the source filter.
    pub allowed_apps: HashSet<String>,
    /// Fallback poll interval; also bounds every native wait.
    pub poll_interval_secs: u64,
    /// Per-request webhook timeout.
    pub request_timeout_secs: u64,
    /// Log level used when neither `RUST_LOG` nor `-v` is given.
    pub log_level: String,
    /// Explicit notification database path, skipping discovery.
    pub db_path: Option<PathBuf>,
    /// Cursor file location.
    pub state_path: Option<PathBuf>,
}

fn default_allowed_apps() -> HashSet<String> {
    ["com.microsoft.teams2", "com.microsoft.teams"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            allowed_apps: default_allowed_apps(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
            db_path: None,
            state_path: None,
        }
    }
}

impl BridgeConfig {
    /// Reject configurations that cannot start.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingWebhookUrl`] when the destination
    /// URL is absent or empty, [`ConfigError::InvalidWebhookUrl`] when
    /// it does not parse as a URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_url.trim().is_empty() {
            return Err(ConfigError::MissingWebhookUrl);
        }
        url::Url::parse(&self.webhook_url).map_err(|source| ConfigError::InvalidWebhookUrl {
            url: self.webhook_url.clone(),
            source,
        })?;
        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.webhook_url.is_empty());
        assert!(config.allowed_apps.contains("com.microsoft.teams2"));
        assert!(config.allowed_apps.contains("com.microsoft.teams"));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level, "info");
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_missing_webhook_url_is_fatal() {
        let config = BridgeConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingWebhookUrl)
        ));
    }

    #[test]
    fn test_whitespace_webhook_url_is_fatal() {
        let config = BridgeConfig {
            webhook_url: "   ".to_string(),
            ..BridgeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingWebhookUrl)
        ));
    }

    #[test]
    fn test_unparseable_webhook_url_is_fatal() {
        let config = BridgeConfig {
            webhook_url: "not a url".to_string(),
            ..BridgeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWebhookUrl { .. })
        ));
    }

    #[test]
    fn test_valid_webhook_url_passes() {
        let config = BridgeConfig {
            webhook_url: "https://hooks.example.com/t/abc123".to_string(),
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            webhook_url = "https://hooks.example.com/t/abc"
            poll_interval_secs = 10
        "#;
        let config: BridgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.webhook_url, "https://hooks.example.com/t/abc");
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.request_timeout_secs, 5);
        assert!(config.allowed_apps.contains("com.microsoft.teams2"));
    }

    #[test]
    fn test_full_toml_round_trip() {
        let toml_str = r#"
            webhook_url = "https://hooks.example.com/t/abc"
            allowed_apps = ["com.example.chat"]
            poll_interval_secs = 1
            request_timeout_secs = 3
            log_level = "debug"
            db_path = "/tmp/db"
            state_path = "/tmp/state.json"
        "#;
        let config: BridgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.allowed_apps.len(), 1);
        assert!(config.allowed_apps.contains("com.example.chat"));
        assert_eq!(config.db_path.as_deref(), Some(std::path::Path::new("/tmp/db")));
        assert_eq!(config.log_level, "debug");
    }
}
