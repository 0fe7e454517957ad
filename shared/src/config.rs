use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, num::NonZeroUsize, time::Duration};
use thiserror::Error;

use crate::capabilities::{ValidatedUrl, DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};
use crate::error::{AppError, ErrorKind};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_ADDRESS_CACHE_CAPACITY: usize = 128;

/// Settings pushed in by the shell. Every field is optional; anything left
/// out keeps its built-in default.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    pub api_base_url: Option<String>,
    pub geocode_url: Option<String>,
    pub geocode_api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub address_cache_capacity: Option<usize>,
}

// Keeps the API key out of logs.
impl fmt::Debug for ConfigInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigInput")
            .field("api_base_url", &self.api_base_url)
            .field("geocode_url", &self.geocode_url)
            .field("geocode_api_key_present", &self.geocode_api_key.is_some())
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("address_cache_capacity", &self.address_cache_capacity)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
    #[error("request timeout {0}ms outside 1000..=300000ms")]
    TimeoutOutOfRange(u64),
    #[error("address cache capacity must be greater than zero")]
    ZeroCacheCapacity,
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

/// Validated runtime configuration.
pub struct CoreConfig {
    api_base_url: String,
    geocode_url: String,
    geocode_api_key: Option<SecretString>,
    request_timeout: Duration,
    address_cache_capacity: NonZeroUsize,
}

impl CoreConfig {
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn geocode_url(&self) -> &str {
        &self.geocode_url
    }

    pub fn geocode_api_key(&self) -> Option<&str> {
        self.geocode_api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn address_cache_capacity(&self) -> NonZeroUsize {
        self.address_cache_capacity
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            geocode_api_key: None,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            address_cache_capacity: NonZeroUsize::new(DEFAULT_ADDRESS_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl TryFrom<ConfigInput> for CoreConfig {
    type Error = ConfigError;

    fn try_from(input: ConfigInput) -> Result<Self, Self::Error> {
        let api_base_url = parse_url(
            "api_base_url",
            input.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL),
        )?;
        let geocode_url = parse_url(
            "geocode_url",
            input.geocode_url.as_deref().unwrap_or(DEFAULT_GEOCODE_URL),
        )?;

        let timeout_ms = input.request_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
            return Err(ConfigError::TimeoutOutOfRange(timeout_ms));
        }

        let address_cache_capacity = NonZeroUsize::new(
            input
                .address_cache_capacity
                .unwrap_or(DEFAULT_ADDRESS_CACHE_CAPACITY),
        )
        .ok_or(ConfigError::ZeroCacheCapacity)?;

        Ok(Self {
            api_base_url,
            geocode_url,
            geocode_api_key: input
                .geocode_api_key
                .filter(|key| !key.trim().is_empty())
                .map(SecretString::new),
            request_timeout: Duration::from_millis(timeout_ms),
            address_cache_capacity,
        })
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("geocode_url", &self.geocode_url)
            .field("geocode_api_key_present", &self.geocode_api_key.is_some())
            .field("request_timeout", &self.request_timeout)
            .field("address_cache_capacity", &self.address_cache_capacity)
            .finish()
    }
}

/// Validates and normalizes a base URL, dropping any trailing slash.
fn parse_url(field: &'static str, raw: &str) -> Result<String, ConfigError> {
    let url = ValidatedUrl::new(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoreConfig::default();
        assert_eq!(
            CoreConfig::try_from(ConfigInput::default()).unwrap().api_base_url(),
            config.api_base_url()
        );
        assert_eq!(config.api_base_url(), "http://localhost:3000");
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.address_cache_capacity().get(), 128);
        assert!(config.geocode_api_key().is_none());
    }

    #[test]
    fn overrides_apply() {
        let config = CoreConfig::try_from(ConfigInput {
            api_base_url: Some("https://rides.example.com/api".into()),
            geocode_api_key: Some("k-123".into()),
            request_timeout_ms: Some(5_000),
            address_cache_capacity: Some(4),
            ..ConfigInput::default()
        })
        .unwrap();
        assert_eq!(config.api_base_url(), "https://rides.example.com/api");
        assert_eq!(config.geocode_api_key(), Some("k-123"));
        assert_eq!(config.request_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.address_cache_capacity().get(), 4);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_url = ConfigInput {
            api_base_url: Some("ftp://nope".into()),
            ..ConfigInput::default()
        };
        assert!(matches!(
            CoreConfig::try_from(bad_url),
            Err(ConfigError::InvalidUrl { field: "api_base_url", .. })
        ));

        let bad_timeout = ConfigInput {
            request_timeout_ms: Some(10),
            ..ConfigInput::default()
        };
        assert_eq!(
            CoreConfig::try_from(bad_timeout).unwrap_err(),
            ConfigError::TimeoutOutOfRange(10)
        );

        let zero_cache = ConfigInput {
            address_cache_capacity: Some(0),
            ..ConfigInput::default()
        };
        assert_eq!(
            CoreConfig::try_from(zero_cache).unwrap_err(),
            ConfigError::ZeroCacheCapacity
        );
    }

    #[test]
    fn debug_hides_api_key() {
        let input = ConfigInput {
            geocode_api_key: Some("super-secret".into()),
            ..ConfigInput::default()
        };
        assert!(!format!("{input:?}").contains("super-secret"));
        let config = CoreConfig::try_from(input).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
