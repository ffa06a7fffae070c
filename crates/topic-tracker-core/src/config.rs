//! Client configuration.
//!
//! Every field has a default matching the backend's development setup, so an
//! empty JSON object deserializes into a working configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::connection::ReconnectPolicy;
use crate::error::ConfigError;
use crate::typewriter::RevealPace;

/// Configuration for the tracker client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL (e.g., "http://localhost:8000").
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Whether the WebSocket reconnects automatically after unexpected closure.
    #[serde(default = "ClientConfig::default_should_reconnect")]
    pub should_reconnect: bool,

    /// Fixed delay between reconnect attempts in milliseconds.
    #[serde(default = "ClientConfig::default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Maximum consecutive reconnect attempts.
    #[serde(default = "ClientConfig::default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay between revealed characters in milliseconds.
    #[serde(default = "ClientConfig::default_reveal_interval")]
    pub reveal_interval_ms: u64,

    /// Delay before the first character of a reveal cycle in milliseconds.
    #[serde(default = "ClientConfig::default_reveal_start_delay")]
    pub reveal_start_delay_ms: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Sidebar refresh interval in seconds.
    #[serde(default = "ClientConfig::default_refresh_interval")]
    pub refresh_interval_seconds: u64,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://localhost:8000".to_string()
    }

    const fn default_should_reconnect() -> bool {
        true
    }

    const fn default_reconnect_interval() -> u64 {
        3000
    }

    const fn default_max_reconnect_attempts() -> u32 {
        5
    }

    const fn default_reveal_interval() -> u64 {
        30
    }

    const fn default_reveal_start_delay() -> u64 {
        50
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_refresh_interval() -> u64 {
        10
    }

    /// Check the configuration for values the client cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a non-HTTP base URL or a zero interval or timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.base_url.clone()));
        }
        if self.reveal_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reveal_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.refresh_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Reconnect policy for the connection manager.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.should_reconnect,
            interval: Duration::from_millis(self.reconnect_interval_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }

    /// Reveal pace for the streaming assembler.
    #[must_use]
    pub fn reveal_pace(&self) -> RevealPace {
        RevealPace {
            start_delay: Duration::from_millis(self.reveal_start_delay_ms),
            interval: Duration::from_millis(self.reveal_interval_ms),
        }
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the sidebar refresh interval as a `Duration`.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            should_reconnect: Self::default_should_reconnect(),
            reconnect_interval_ms: Self::default_reconnect_interval(),
            max_reconnect_attempts: Self::default_max_reconnect_attempts(),
            reveal_interval_ms: Self::default_reveal_interval(),
            reveal_start_delay_ms: Self::default_reveal_start_delay(),
            request_timeout_seconds: Self::default_request_timeout(),
            refresh_interval_seconds: Self::default_refresh_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert!(config.should_reconnect);
        assert_eq!(config.reconnect_interval_ms, 3000);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reveal_interval_ms, 30);
        assert_eq!(config.reveal_start_delay_ms, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"https://tracker.example.com/","max_reconnect_attempts":2}"#)
                .unwrap();
        assert_eq!(config.base_url(), "https://tracker.example.com");
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.reconnect_interval_ms, 3000);
    }

    #[test]
    fn derived_settings() {
        let config = ClientConfig::default();
        let policy = config.reconnect_policy();
        assert!(policy.enabled);
        assert_eq!(policy.interval, Duration::from_secs(3));
        assert_eq!(policy.max_attempts, 5);

        let pace = config.reveal_pace();
        assert_eq!(pace.start_delay, Duration::from_millis(50));
        assert_eq!(pace.interval, Duration::from_millis(30));

        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_values() {
        let config = ClientConfig {
            base_url: "ftp://nowhere".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        let config = ClientConfig {
            reveal_interval_ms: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "reveal_interval_ms", .. })
        ));

        let config = ClientConfig {
            request_timeout_seconds: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "request_timeout_seconds", .. })
        ));
    }
}
