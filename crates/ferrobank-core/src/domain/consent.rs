use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// Permission scopes requested for account data sharing.
pub const CONSENT_PERMISSIONS: [&str; 3] =
    ["ReadAccountsDetail", "ReadBalances", "ReadTransactionsDetail"];

labelled_enum! {
    ConsentStatus, "consent status" {
        Approved => "approved",
        Pending => "pending",
        Rejected => "rejected",
        Revoked => "revoked",
    }
}

/// Outcome of a consent-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consent {
    pub consent_id: String,
    pub status: ConsentStatus,
    pub message: Option<String>,
    pub request_id: Option<String>,
    pub auto_approved: bool,
}

impl Consent {
    pub fn is_usable(&self) -> bool {
        matches!(self.status, ConsentStatus::Approved | ConsentStatus::Pending)
    }
}

/// Consent state as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentDetails {
    pub consent_id: String,
    pub status: ConsentStatus,
    pub created_at: Option<UtcDateTime>,
    pub status_updated_at: Option<UtcDateTime>,
    pub permissions: Vec<String>,
    pub expires_at: Option<UtcDateTime>,
}
