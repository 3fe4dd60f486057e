use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{UtcDateTime, ValidationError};

pub const DEFAULT_SCOPES: [&str; 3] = ["accounts", "transactions", "balance"];
pub const DEFAULT_REDIRECT_URI: &str = "ferrobank://oauth/callback";

/// Integration protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderVariant {
    /// Bearer tokens, consent headers and endpoint-path probing.
    #[default]
    Standard,
    /// Signed requests with client-credentials-only authentication.
    Gateway,
}

impl ProviderVariant {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Gateway => "gateway",
        }
    }
}

impl Display for ProviderVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderVariant {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "gateway" | "gost" => Ok(Self::Gateway),
            other => Err(ValidationError::UnknownVariant {
                field: "provider variant",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

impl OAuthConfig {
    /// Endpoints derived from the provider base URL with the default scope set.
    pub fn for_base_url(base_url: &str, client_id: impl Into<String>) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            authorization_endpoint: format!("{base}/oauth/authorize"),
            token_endpoint: format!("{base}/oauth/token"),
            client_id: client_id.into(),
            client_secret: None,
            scopes: DEFAULT_SCOPES.iter().map(|scope| (*scope).to_owned()).collect(),
            redirect_uri: String::from(DEFAULT_REDIRECT_URI),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }
}

/// Immutable description of one configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub oauth: OAuthConfig,
    pub variant: ProviderVariant,
}

impl ProviderDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        oauth: OAuthConfig,
        variant: ProviderVariant,
    ) -> Result<Self, ValidationError> {
        let descriptor = Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            oauth,
            variant,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "provider id" });
        }
        if self.oauth.client_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "client id" });
        }
        reqwest::Url::parse(&self.base_url).map_err(|error| ValidationError::InvalidUrl {
            value: self.base_url.clone(),
            reason: error.to_string(),
        })?;
        Ok(())
    }

    pub const fn is_gateway(&self) -> bool {
        matches!(self.variant, ProviderVariant::Gateway)
    }
}

/// Durable record of a provider the user has connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedProvider {
    pub provider_id: String,
    pub name: String,
    pub base_url: String,
    pub client_id: String,
    pub consent_id: Option<String>,
    pub requesting_party_id: Option<String>,
    pub connected_at: UtcDateTime,
    pub is_active: bool,
    /// Last successful account sync; drives the freshness window.
    pub last_synced_at: Option<UtcDateTime>,
}

impl ConnectedProvider {
    pub fn from_descriptor(
        descriptor: &ProviderDescriptor,
        requesting_party_id: Option<String>,
        connected_at: UtcDateTime,
    ) -> Self {
        Self {
            provider_id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            base_url: descriptor.base_url.clone(),
            client_id: descriptor.oauth.client_id.clone(),
            consent_id: None,
            requesting_party_id,
            connected_at,
            is_active: true,
            last_synced_at: None,
        }
    }
}
