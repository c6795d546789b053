//! Configuration loading for the VANTAGE client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use vantage_core::DurationMs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_endpoint: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: DurationMs,
    pub refresh_interval_ms: DurationMs,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Time-to-live for cached reads, in milliseconds.
    pub ttl_ms: DurationMs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: DurationMs,
    pub max_delay_ms: DurationMs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: DurationMs,
    pub max_ms: DurationMs,
    pub multiplier: f64,
    pub jitter_ms: DurationMs,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (set VANTAGE_CLIENT_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Load from the path named by `VANTAGE_CLIENT_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_env().ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.ws_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ws_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth.api_key.is_none() && self.auth.bearer_token.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "auth",
                reason: "api_key or bearer_token must be provided".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.retry.base_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.base_delay_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_ms",
                reason: "must be >= base_delay_ms".to_string(),
            });
        }
        if self.reconnect.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("VANTAGE_CLIENT_CONFIG").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ClientConfig {
        ClientConfig {
            api_base_url: "http://localhost:8080".to_string(),
            ws_endpoint: "ws://localhost:8080/api/v1/events".to_string(),
            auth: AuthConfig {
                api_key: Some("test-key".to_string()),
                bearer_token: None,
            },
            request_timeout_ms: 5_000,
            refresh_interval_ms: 30_000,
            cache: CacheConfig { ttl_ms: 10_000 },
            retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 100,
                max_delay_ms: 5_000,
            },
            reconnect: ReconnectConfig {
                initial_ms: 500,
                max_ms: 30_000,
                multiplier: 2.0,
                jitter_ms: 100,
            },
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = valid_config();
        config.api_base_url = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "api_base_url",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_auth_rejected() {
        let mut config = valid_config();
        config.auth.api_key = None;
        config.auth.bearer_token = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "auth", .. })
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = valid_config();
        config.cache.ttl_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "cache.ttl_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_max_delay_below_base_rejected() {
        let mut config = valid_config();
        config.retry.max_delay_ms = 50;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "retry.max_delay_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_from_path_parses_toml() {
        let toml = r#"
            api_base_url = "http://localhost:8080"
            ws_endpoint = "ws://localhost:8080/api/v1/events"
            request_timeout_ms = 5000
            refresh_interval_ms = 30000

            [auth]
            api_key = "test-key"

            [cache]
            ttl_ms = 10000

            [retry]
            max_retries = 3
            base_delay_ms = 100
            max_delay_ms = 5000

            [reconnect]
            initial_ms = 500
            max_ms = 30000
            multiplier = 2.0
            jitter_ms = 100
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vantage.toml");
        std::fs::write(&path, toml).expect("write config");

        let config = ClientConfig::from_path(&path).expect("parse config");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.cache_ttl(), Duration::from_millis(10_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            api_base_url = "http://localhost:8080"
            surprise = true
        "#;
        let parsed: Result<ClientConfig, _> = toml::from_str(toml);
        assert!(parsed.is_err());
    }
}
