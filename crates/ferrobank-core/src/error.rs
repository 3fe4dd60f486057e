//! Error taxonomy shared by the transport, auth, consent and sync layers.
//!
//! | Kind | Retried | Code |
//! |------|---------|------|
//! | [`ApiErrorKind::Network`] | yes | `api.network` |
//! | [`ApiErrorKind::Timeout`] | yes | `api.timeout` |
//! | [`ApiErrorKind::Server`] | yes | `api.server` |
//! | [`ApiErrorKind::RateLimited`] | yes | `api.rate_limited` |
//! | everything else | no | `api.*` |

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Validation errors raised while building domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("timestamp is not a recognised ISO-8601 value: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("amount is not a valid decimal: '{value}'")]
    InvalidAmount { value: String },

    #[error("unknown {field} value '{value}'")]
    UnknownVariant { field: &'static str, value: String },

    #[error("field '{field}' cannot be empty")]
    EmptyField { field: &'static str },

    #[error("invalid url '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },
}

/// Classification of network, protocol and auth failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    InvalidUrl,
    InvalidResponse,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    Server,
    Http,
    Network,
    Timeout,
    Decoding,
    Encoding,
    Cancelled,
    NoRefreshToken,
    NoAccessToken,
    ConsentExhausted,
    InvalidProviderConfiguration,
    InvalidAccountConfiguration,
}

/// Structured API error carried through every network-facing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    status: Option<u16>,
}

impl ApiError {
    fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Maps a non-2xx HTTP response onto the taxonomy. The provider's JSON
    /// `message` field, when present, becomes the error message.
    pub fn from_status(status: u16, body: &str) -> Self {
        let provider_message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            });

        let error = match status {
            401 => Self::unauthorized(provider_message.unwrap_or_else(|| {
                String::from("provider rejected the access token")
            })),
            403 => Self::forbidden(
                provider_message.unwrap_or_else(|| String::from("access forbidden")),
            ),
            404 => Self::not_found(
                provider_message.unwrap_or_else(|| String::from("resource not found")),
            ),
            429 => Self::rate_limited(
                provider_message.unwrap_or_else(|| String::from("provider rate limit exceeded")),
            ),
            500..=599 => Self::new(
                ApiErrorKind::Server,
                provider_message.unwrap_or_else(|| format!("provider server error {status}")),
            ),
            _ => Self::new(
                ApiErrorKind::Http,
                provider_message.unwrap_or_else(|| format!("http error {status}")),
            ),
        };
        error.with_status(status)
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidUrl, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidResponse, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::RateLimited, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, message)
    }

    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decoding, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Encoding, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ApiErrorKind::Cancelled, "request cancelled by user")
    }

    pub fn no_refresh_token(provider_id: &str) -> Self {
        Self::new(
            ApiErrorKind::NoRefreshToken,
            format!("no refresh token stored for provider '{provider_id}'"),
        )
    }

    pub fn no_access_token(provider_id: &str) -> Self {
        Self::new(
            ApiErrorKind::NoAccessToken,
            format!("no access token available for provider '{provider_id}'"),
        )
    }

    pub fn consent_exhausted(candidates: usize) -> Self {
        Self::new(
            ApiErrorKind::ConsentExhausted,
            format!("consent endpoint not found after trying {candidates} candidate paths"),
        )
    }

    pub fn invalid_provider_configuration(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidProviderConfiguration, message)
    }

    pub fn invalid_account_configuration(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidAccountConfiguration, message)
    }

    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            ApiErrorKind::Network
                | ApiErrorKind::Timeout
                | ApiErrorKind::Server
                | ApiErrorKind::RateLimited
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ApiErrorKind::InvalidUrl => "api.invalid_url",
            ApiErrorKind::InvalidResponse => "api.invalid_response",
            ApiErrorKind::Unauthorized => "api.unauthorized",
            ApiErrorKind::Forbidden => "api.forbidden",
            ApiErrorKind::NotFound => "api.not_found",
            ApiErrorKind::RateLimited => "api.rate_limited",
            ApiErrorKind::Server => "api.server",
            ApiErrorKind::Http => "api.http",
            ApiErrorKind::Network => "api.network",
            ApiErrorKind::Timeout => "api.timeout",
            ApiErrorKind::Decoding => "api.decoding",
            ApiErrorKind::Encoding => "api.encoding",
            ApiErrorKind::Cancelled => "api.cancelled",
            ApiErrorKind::NoRefreshToken => "auth.no_refresh_token",
            ApiErrorKind::NoAccessToken => "auth.no_access_token",
            ApiErrorKind::ConsentExhausted => "consent.exhausted",
            ApiErrorKind::InvalidProviderConfiguration => "config.invalid_provider",
            ApiErrorKind::InvalidAccountConfiguration => "config.invalid_account",
        }
    }

    /// Short, non-technical description suitable for end users.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ApiErrorKind::Unauthorized | ApiErrorKind::NoRefreshToken | ApiErrorKind::NoAccessToken => {
                "Your session with this bank has expired. Please reconnect this bank."
            }
            ApiErrorKind::Forbidden => "The bank has not granted access to this data. Please renew consent.",
            ApiErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.",
            ApiErrorKind::Network => "Connection problem. Please check your internet connection.",
            ApiErrorKind::Timeout | ApiErrorKind::Server => {
                "The bank is not responding right now. Please try again later."
            }
            ApiErrorKind::Cancelled => "The request was cancelled.",
            ApiErrorKind::ConsentExhausted => "This bank does not support data-sharing consent requests.",
            ApiErrorKind::InvalidProviderConfiguration | ApiErrorKind::InvalidAccountConfiguration => {
                "This bank connection is misconfigured."
            }
            _ => "Something went wrong while talking to the bank.",
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ApiError {}

/// Durable-storage failures reported by repository implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("stored value for '{field}' is corrupt: {message}")]
    Corrupt { field: &'static str, message: String },
}

/// Failures of the external secret storage.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("secret encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Provider-scoped failure surfaced by the sync orchestrator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("provider '{0}' is not configured")]
    UnknownProvider(String),

    #[error("provider '{0}' is disconnected")]
    ProviderInactive(String),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Api(error) => error.code(),
            Self::Storage(_) => "storage.failure",
            Self::UnknownProvider(_) => "config.unknown_provider",
            Self::ProviderInactive(_) => "config.provider_inactive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_taxonomy() {
        assert_eq!(ApiError::from_status(401, "").kind(), ApiErrorKind::Unauthorized);
        assert_eq!(ApiError::from_status(403, "").kind(), ApiErrorKind::Forbidden);
        assert_eq!(ApiError::from_status(404, "").kind(), ApiErrorKind::NotFound);
        assert_eq!(ApiError::from_status(429, "").kind(), ApiErrorKind::RateLimited);
        assert_eq!(ApiError::from_status(503, "").kind(), ApiErrorKind::Server);
        assert_eq!(ApiError::from_status(418, "").kind(), ApiErrorKind::Http);
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(ApiError::from_status(500, "").retryable());
        assert!(ApiError::from_status(429, "").retryable());
        assert!(ApiError::timeout("slow").retryable());
        assert!(ApiError::network("reset").retryable());
        assert!(!ApiError::from_status(400, "").retryable());
        assert!(!ApiError::from_status(401, "").retryable());
        assert!(!ApiError::decoding("bad json").retryable());
    }

    #[test]
    fn provider_message_is_preserved_for_generic_http_errors() {
        let error = ApiError::from_status(422, r#"{"message":"limit must be <= 100"}"#);
        assert_eq!(error.kind(), ApiErrorKind::Http);
        assert_eq!(error.status(), Some(422));
        assert_eq!(error.message(), "limit must be <= 100");
        assert_eq!(error.code(), "api.http");
    }

    #[test]
    fn unauthorized_translates_to_reconnect_hint() {
        let error = ApiError::from_status(401, "");
        assert!(error.user_message().contains("reconnect"));
    }
}
