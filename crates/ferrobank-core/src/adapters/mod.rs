//! Bank adapter contract and its two provider protocols.
//!
//! | Adapter | Auth | Routing |
//! |---------|------|---------|
//! | [`StandardAdapter`] | bearer + `X-Requesting-Bank` / `X-Consent-Id` | account listing probes candidate paths |
//! | [`GatewayAdapter`] | bearer + per-request SHA-256 signature | fixed routes under the gateway prefix |
//!
//! [`AdapterFactory`] picks one from the descriptor's variant.

use std::future::Future;
use std::pin::Pin;

use crate::{Account, ApiError, Balance, Card, ProviderVariant, Transaction, UtcDateTime};

mod factory;
mod gateway;
pub mod signing;
mod standard;
mod wire;

pub use factory::{AdapterContext, AdapterFactory, ProviderAdapter};
pub use gateway::{GatewayAdapter, GATEWAY_PATH_PREFIX};
pub use standard::{StandardAdapter, ACCOUNT_CANDIDATE_PATHS};
pub use wire::{ProviderProduct, PublicProviderInfo};

/// Transaction page request for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub account_id: String,
    pub from: Option<UtcDateTime>,
    pub to: Option<UtcDateTime>,
    pub limit: Option<u32>,
}

impl TransactionQuery {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            from: None,
            to: None,
            limit: None,
        }
    }

    pub fn with_range(mut self, from: UtcDateTime, to: UtcDateTime) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Canonical operations every provider protocol supports.
pub trait BankAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    fn variant(&self) -> ProviderVariant;

    fn list_accounts<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Account>, ApiError>> + Send + 'a>>;

    fn get_balance<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Balance, ApiError>> + Send + 'a>>;

    fn list_transactions<'a>(
        &'a self,
        query: TransactionQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Transaction>, ApiError>> + Send + 'a>>;

    fn get_card_info<'a>(
        &'a self,
        card_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Card, ApiError>> + Send + 'a>>;

    /// True when listing accounts succeeds.
    fn check_connection<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { self.list_accounts().await.is_ok() })
    }
}
