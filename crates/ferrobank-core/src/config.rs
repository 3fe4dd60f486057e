//! `config.toml` model.
//!
//! ```toml
//! [http]
//! timeout_ms = 30000
//! max_retries = 3
//!
//! [sync]
//! requesting_party_id = "team042"
//!
//! [[providers]]
//! id = "vbank"
//! name = "VBank"
//! base_url = "https://vbank.open.bankingapi.ru"
//! client_id = "team042"
//! ```
//!
//! `FERROBANK_CLIENT_SECRET_<PROVIDER_ID>` (id upper-cased, `-` as `_`)
//! overrides a provider's `client_secret`.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api_client::ApiClient;
use crate::consent::RequestingParty;
use crate::http_client::{HttpClient, DEFAULT_TIMEOUT_MS};
use crate::oauth::DEFAULT_GATEWAY_TOKEN_URL;
use crate::retry::RetryConfig;
use crate::sync::{SyncSettings, DEFAULT_MAX_CONCURRENCY, DEFAULT_TRANSACTION_LIMIT};
use crate::throttling::RequestThrottle;
use crate::{
    ApiError, OAuthConfig, ProviderDescriptor, ProviderVariant, DEFAULT_REDIRECT_URI,
    DEFAULT_SCOPES,
};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const CLIENT_SECRET_ENV_PREFIX: &str = "FERROBANK_CLIENT_SECRET_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Provider(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    pub requests_per_minute: Option<u32>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
            jitter: false,
            requests_per_minute: None,
        }
    }
}

impl HttpSettings {
    pub fn retry_config(&self) -> RetryConfig {
        let mut retry = RetryConfig::exponential(
            Duration::from_millis(self.base_delay_ms),
            self.max_retries,
        )
        .with_jitter(self.jitter);
        retry.backoff = retry
            .backoff
            .with_max(Duration::from_millis(self.max_delay_ms));
        retry
    }

    /// API client over `transport` with this section's timeout, retry and
    /// throttle settings.
    pub fn api_client(&self, transport: std::sync::Arc<dyn HttpClient>) -> ApiClient {
        let client = ApiClient::new(transport)
            .with_timeout_ms(self.timeout_ms)
            .with_retry(self.retry_config());
        match self.requests_per_minute {
            Some(limit) if limit > 0 => client.with_throttle(RequestThrottle::per_minute(limit)),
            _ => client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub freshness_window_secs: u64,
    pub lookback_days: Option<u32>,
    pub transaction_limit: u32,
    pub max_concurrency: usize,
    pub requesting_party_id: Option<String>,
    pub requesting_party_name: Option<String>,
    pub default_currency: String,
    pub large_transaction_threshold: Option<Decimal>,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            freshness_window_secs: 300,
            lookback_days: None,
            transaction_limit: DEFAULT_TRANSACTION_LIMIT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            requesting_party_id: None,
            requesting_party_name: None,
            default_currency: String::from("RUB"),
            large_transaction_threshold: None,
        }
    }
}

impl SyncSection {
    pub fn settings(&self) -> SyncSettings {
        let requesting_party = self.requesting_party_id.as_ref().map(|id| RequestingParty {
            id: id.clone(),
            name: self
                .requesting_party_name
                .clone()
                .unwrap_or_else(|| id.clone()),
        });
        SyncSettings {
            freshness_window: Duration::from_secs(self.freshness_window_secs),
            lookback_days: self.lookback_days,
            transaction_limit: self.transaction_limit,
            max_concurrency: self.max_concurrency,
            requesting_party,
            large_transaction_threshold: self.large_transaction_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSection {
    pub gateway_token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for OAuthSection {
    fn default() -> Self {
        Self {
            gateway_token_url: String::from(DEFAULT_GATEWAY_TOKEN_URL),
            redirect_uri: String::from(DEFAULT_REDIRECT_URI),
            scopes: DEFAULT_SCOPES.iter().map(|scope| (*scope).to_owned()).collect(),
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub variant: ProviderVariant,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpSettings,
    pub sync: SyncSection,
    pub oauth: OAuthSection,
    pub providers: Vec<ProviderEntry>,
}

impl AppConfig {
    pub fn from_toml(input: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(input) => Self::from_toml(&input, path),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Validated descriptors with environment secrets applied.
    pub fn descriptors(&self) -> Result<Vec<ProviderDescriptor>, ConfigError> {
        self.descriptors_with(|provider_id| env::var(client_secret_env_var(provider_id)).ok())
    }

    pub fn descriptors_with(
        &self,
        secret_lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Vec<ProviderDescriptor>, ConfigError> {
        self.providers
            .iter()
            .map(|entry| self.descriptor(entry, secret_lookup(&entry.id)))
            .collect()
    }

    fn descriptor(
        &self,
        entry: &ProviderEntry,
        env_secret: Option<String>,
    ) -> Result<ProviderDescriptor, ConfigError> {
        let mut oauth = OAuthConfig::for_base_url(&entry.base_url, entry.client_id.clone());
        oauth.redirect_uri = entry
            .redirect_uri
            .clone()
            .unwrap_or_else(|| self.oauth.redirect_uri.clone());
        oauth.scopes = entry
            .scopes
            .clone()
            .unwrap_or_else(|| self.oauth.scopes.clone());
        if let Some(endpoint) = &entry.authorization_endpoint {
            oauth.authorization_endpoint = endpoint.clone();
        }
        if let Some(endpoint) = &entry.token_endpoint {
            oauth.token_endpoint = endpoint.clone();
        }
        oauth.client_secret = env_secret
            .or_else(|| entry.client_secret.clone())
            .filter(|secret| !secret.is_empty());

        ProviderDescriptor::new(
            entry.id.clone(),
            entry.name.clone(),
            entry.base_url.clone(),
            oauth,
            entry.variant,
        )
        .map_err(|error| {
            ConfigError::Provider(ApiError::invalid_provider_configuration(format!(
                "provider '{}': {error}",
                entry.id
            )))
        })
    }
}

pub fn client_secret_env_var(provider_id: &str) -> String {
    let normalized: String = provider_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{CLIENT_SECRET_ENV_PREFIX}{normalized}")
}
