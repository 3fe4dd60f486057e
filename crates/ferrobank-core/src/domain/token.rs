use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// Window before expiry in which a token is treated as due for refresh.
pub const REFRESH_LEAD: Duration = Duration::from_secs(300);

/// OAuth token envelope as returned by provider token endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    String::from("Bearer")
}

/// Stored credentials for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// `None` means the token never expires.
    pub expires_at: Option<UtcDateTime>,
    pub scope: Option<String>,
}

impl TokenRecord {
    pub fn from_response(response: &TokenResponse, issued_at: UtcDateTime) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            id_token: response.id_token.clone(),
            // An expiry beyond the calendar range is treated as no expiry.
            expires_at: response
                .expires_in
                .and_then(|seconds| issued_at.checked_add(Duration::from_secs(seconds))),
            scope: response.scope.clone(),
        }
    }

    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn near_expiry_at(&self, now: UtcDateTime) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now + REFRESH_LEAD)
    }

    /// True when expired or within [`REFRESH_LEAD`] of expiry.
    pub fn needs_refresh_at(&self, now: UtcDateTime) -> bool {
        self.is_expired_at(now) || self.near_expiry_at(now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(UtcDateTime::now())
    }

    pub fn near_expiry(&self) -> bool {
        self.near_expiry_at(UtcDateTime::now())
    }
}
