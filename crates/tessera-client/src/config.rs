use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "tessera.yaml";
pub const DEFAULT_API_VERSION: &str = "2024-10-01";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_TOKEN_EXPIRATION_BUFFER_SECS: i64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("publishable key or base url is required")]
    MissingPublishableKey,
    #[error("invalid publishable key: {0}")]
    InvalidPublishableKey(&'static str),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    #[serde(default)]
    pub publishable_key: Option<String>,
    /// Overrides the URL derived from the publishable key.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub application_id: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_token_timeout_secs")]
    pub token_timeout_secs: u64,
    #[serde(default = "default_token_expiration_buffer_secs")]
    pub token_expiration_buffer_secs: i64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            publishable_key: None,
            base_url: None,
            application_id: String::new(),
            api_version: default_api_version(),
            debug: false,
            request_timeout_secs: default_request_timeout_secs(),
            token_timeout_secs: default_token_timeout_secs(),
            token_expiration_buffer_secs: default_token_expiration_buffer_secs(),
        }
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_token_timeout_secs() -> u64 {
    DEFAULT_TOKEN_TIMEOUT_SECS
}

fn default_token_expiration_buffer_secs() -> i64 {
    DEFAULT_TOKEN_EXPIRATION_BUFFER_SECS
}

impl SdkConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let path =
            env::var("TESSERA_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(&path);
        config.apply_env_overrides();
        config
    }

    /// Reads a YAML config file. A missing or unreadable file yields defaults.
    #[must_use]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(event = "config_read_failed", path = %path.display(), error = %err);
                return Self::default();
            }
        };
        match serde_yaml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!(event = "config_parse_failed", path = %path.display(), error = %err);
                Self::default()
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("TESSERA_PUBLISHABLE_KEY") {
            self.publishable_key = Some(value);
        }
        if let Some(value) = lookup("TESSERA_BASE_URL") {
            self.base_url = Some(value);
        }
        if let Some(value) = lookup("TESSERA_APPLICATION_ID") {
            self.application_id = value;
        }
        if let Some(value) = lookup("TESSERA_API_VERSION") {
            self.api_version = value;
        }
        if let Some(value) = lookup("TESSERA_DEBUG") {
            match parse_bool(&value) {
                Some(debug) => self.debug = debug,
                None => warn!(event = "config_invalid", field = "TESSERA_DEBUG", value = %value),
            }
        }
        if let Some(value) = lookup("TESSERA_REQUEST_TIMEOUT_SECS") {
            match parse_positive(&value) {
                Some(secs) => self.request_timeout_secs = secs,
                None => warn!(
                    event = "config_invalid",
                    field = "TESSERA_REQUEST_TIMEOUT_SECS",
                    value = %value
                ),
            }
        }
        if let Some(value) = lookup("TESSERA_TOKEN_TIMEOUT_SECS") {
            match parse_positive(&value) {
                Some(secs) => self.token_timeout_secs = secs,
                None => warn!(
                    event = "config_invalid",
                    field = "TESSERA_TOKEN_TIMEOUT_SECS",
                    value = %value
                ),
            }
        }
        if let Some(value) = lookup("TESSERA_TOKEN_EXPIRATION_BUFFER_SECS") {
            match value.trim().parse::<i64>() {
                Ok(secs) if secs >= 0 => self.token_expiration_buffer_secs = secs,
                _ => warn!(
                    event = "config_invalid",
                    field = "TESSERA_TOKEN_EXPIRATION_BUFFER_SECS",
                    value = %value
                ),
            }
        }
    }

    /// Explicit `base_url` first, then the host encoded in the publishable key.
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        if let Some(base_url) = self.base_url.as_deref() {
            return Ok(Url::parse(base_url.trim())?);
        }
        let key = self
            .publishable_key
            .as_deref()
            .ok_or(ConfigError::MissingPublishableKey)?;
        PublishableKey::parse(key)?.api_base_url()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    #[must_use]
    pub fn token_expiration_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_expiration_buffer_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEnvironment {
    Test,
    Live,
}

/// `pk_test_<b64>` or `pk_live_<b64>`, where the payload decodes to
/// `<frontend-api-host>$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishableKey {
    pub environment: KeyEnvironment,
    pub frontend_api: String,
}

impl PublishableKey {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let (environment, encoded) = if let Some(rest) = raw.strip_prefix("pk_test_") {
            (KeyEnvironment::Test, rest)
        } else if let Some(rest) = raw.strip_prefix("pk_live_") {
            (KeyEnvironment::Live, rest)
        } else {
            return Err(ConfigError::InvalidPublishableKey("unknown prefix"));
        };
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .or_else(|_| {
                base64::engine::general_purpose::STANDARD_NO_PAD
                    .decode(encoded.trim_end_matches('='))
            })
            .map_err(|_| ConfigError::InvalidPublishableKey("payload is not base64"))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| ConfigError::InvalidPublishableKey("payload is not utf-8"))?;
        let host = decoded
            .strip_suffix('$')
            .ok_or(ConfigError::InvalidPublishableKey("payload is not terminated"))?;
        if host.is_empty() || host.contains('/') {
            return Err(ConfigError::InvalidPublishableKey("payload is not a host"));
        }
        Ok(Self {
            environment,
            frontend_api: host.to_string(),
        })
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&format!("https://{}/v1", self.frontend_api))?)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_positive(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|value| *value > 0)
}
