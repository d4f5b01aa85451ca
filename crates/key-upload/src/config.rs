//! Configuration loading and validation for the key upload service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::events::TokenTable;
use crate::server::middleware::REQUEST_TIMEOUT;
use crate::store::memory::QuotaPolicy;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`), used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint of the OTEL collector. Span export is off when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// How far an upload timestamp may be from the server clock, either way.
    #[serde(default = "default_max_timestamp_skew")]
    pub max_timestamp_skew_secs: u64,

    /// Lifetime key budget of one app public key.
    #[serde(default = "default_max_keys_per_app_key")]
    pub max_keys_per_app_key: usize,

    /// How long after first use an app public key may keep uploading.
    #[serde(default = "default_app_key_window")]
    pub app_key_window_secs: u64,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Comma-separated `token=region` pairs accepted on `/events`.
    #[serde(default)]
    pub auth_tokens: String,
}

fn default_listen_port() -> u16 {
    8000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_max_timestamp_skew() -> u64 {
    3600
}
fn default_max_keys_per_app_key() -> usize {
    28
}
fn default_app_key_window() -> u64 {
    15 * 24 * 3600
}
fn default_request_timeout() -> u64 {
    REQUEST_TIMEOUT.as_secs()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or is out of range.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.log_level, "LOG_LEVEL")?;
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }

        if self.max_timestamp_skew_secs == 0 {
            anyhow::bail!("MAX_TIMESTAMP_SKEW_SECS must be > 0");
        }
        if self.max_keys_per_app_key == 0 {
            anyhow::bail!("MAX_KEYS_PER_APP_KEY must be >= 1");
        }
        if self.app_key_window_secs == 0 {
            anyhow::bail!("APP_KEY_WINDOW_SECS must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        self.token_table()?;
        Ok(())
    }

    pub fn max_timestamp_skew(&self) -> Duration {
        Duration::from_secs(self.max_timestamp_skew_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Budget and reuse window applied to app public keys.
    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            max_keys: self.max_keys_per_app_key,
            window: Duration::from_secs(self.app_key_window_secs),
        }
    }

    /// Parse `AUTH_TOKENS` into a [`TokenTable`].
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable if an entry is malformed.
    pub fn token_table(&self) -> Result<TokenTable> {
        TokenTable::parse(&self.auth_tokens).context("AUTH_TOKENS is invalid")
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            listen_port: default_listen_port(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
            max_timestamp_skew_secs: default_max_timestamp_skew(),
            max_keys_per_app_key: default_max_keys_per_app_key(),
            app_key_window_secs: default_app_key_window(),
            request_timeout_secs: default_request_timeout(),
            auth_tokens: String::new(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_listen_port(), 8000);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_max_timestamp_skew(), 3600);
        assert_eq!(default_max_keys_per_app_key(), 28);
        assert_eq!(default_app_key_window(), 1_296_000);
        assert_eq!(default_request_timeout(), 30);
    }

    #[test]
    fn defaults_validate() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_skew() {
        let cfg = Config {
            max_timestamp_skew_secs: 0,
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let cfg = Config {
            max_keys_per_app_key: 0,
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_window_and_timeout() {
        assert!(Config { app_key_window_secs: 0, ..base() }.validate().is_err());
        assert!(Config { request_timeout_secs: 0, ..base() }.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_otlp_endpoint() {
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("  ".into()),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_tokens() {
        let cfg = Config {
            auth_tokens: "abc=ON,broken".into(),
            ..base()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("AUTH_TOKENS"));
    }

    #[test]
    fn derived_values() {
        let cfg = Config {
            auth_tokens: "abc=ON".into(),
            ..base()
        };
        assert_eq!(cfg.max_timestamp_skew(), Duration::from_secs(3600));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        let policy = cfg.quota_policy();
        assert_eq!(policy.max_keys, 28);
        assert_eq!(policy.window, Duration::from_secs(1_296_000));
        assert_eq!(cfg.token_table().unwrap().len(), 1);
    }
}
