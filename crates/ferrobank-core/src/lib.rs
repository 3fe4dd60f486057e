//! # Ferrobank Core
//!
//! Multi-provider Open Banking aggregation: authentication, consent,
//! account and transaction sync, budgets and forecasting.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Standard and gateway bank adapters, adapter factory |
//! | [`analyzer`] | Keyword categorisation, category totals, anomalies |
//! | [`api_client`] | Retrying, throttled JSON client over [`HttpClient`] |
//! | [`budget`] | Budget spend recomputation and alerts |
//! | [`config`] | `config.toml` model and provider descriptors |
//! | [`consent`] | Consent creation, status and revocation |
//! | [`domain`] | Domain models (Account, Transaction, Budget, TokenRecord) |
//! | [`error`] | Error taxonomy |
//! | [`forecast`] | Blended income/expense forecasts |
//! | [`freshness`] | Per-provider sync freshness window |
//! | [`http_client`] | Transport abstraction and reqwest implementation |
//! | [`notification`] | Fire-and-forget notification sink |
//! | [`oauth`] | Client credentials, authorization code + PKCE, refresh |
//! | [`repository`] | Durable-storage contract, in-memory implementation |
//! | [`secret_store`] | Secret storage for tokens and client secrets |
//! | [`sync`] | Sync orchestrator |
//! | [`token_store`] | Cached token records backed by the secret store |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ SyncOrchestrator │──────────────┐
//! └───┬──────────┬───┘              ▼
//!     │          │          ┌───────────────┐
//!     ▼          ▼          │  Repository   │
//! ┌────────┐ ┌────────────┐ └───────────────┘
//! │ OAuth  │ │  Adapters  │
//! │Consent │ │ std / gw   │
//! └───┬────┘ └─────┬──────┘
//!     └─────┬──────┘
//!           ▼
//!   ┌───────────────┐     ┌──────────────┐
//!   │   ApiClient   │────▶│  HttpClient  │
//!   │ retry+throttle│     │  (reqwest)   │
//!   └───────────────┘     └──────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use ferrobank_core::{ApiError, ApiErrorKind};
//!
//! fn describe(error: &ApiError) -> &'static str {
//!     match error.kind() {
//!         ApiErrorKind::Unauthorized => "reconnect",
//!         ApiErrorKind::Forbidden => "renew consent",
//!         _ if error.retryable() => "try again later",
//!         _ => "failed",
//!     }
//! }
//! ```

#[macro_use]
pub mod domain;

pub mod adapters;
pub mod analyzer;
pub mod api_client;
pub mod budget;
pub mod config;
pub mod consent;
pub mod error;
pub mod forecast;
pub mod freshness;
pub mod http_client;
pub mod notification;
pub mod oauth;
pub mod pkce;
pub mod redact;
pub mod repository;
pub mod retry;
pub mod secret_store;
pub mod sync;
pub mod throttling;
pub mod token_store;

#[cfg(test)]
mod testing;

// Domain models
pub use domain::{
    parse_amount, validate_currency_code, Account, AccountStatus, AccountType, Balance, Budget,
    BudgetCategory, BudgetPeriod, Card, CardStatus, CardType, ConnectedProvider, Consent,
    ConsentDetails, ConsentStatus, OAuthConfig, ProviderDescriptor, ProviderVariant, TokenRecord,
    TokenResponse, Transaction, TransactionCategory, TransactionStatus, TransactionType,
    UtcDateTime, CONSENT_PERMISSIONS, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, REFRESH_LEAD,
};

// Error types
pub use error::{ApiError, ApiErrorKind, SecretStoreError, StorageError, SyncError, ValidationError};

// Transport
pub use api_client::ApiClient;
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use retry::{Backoff, RetryConfig};
pub use throttling::RequestThrottle;

// Auth and consent
pub use consent::{ConsentGateway, RequestingParty};
pub use oauth::{AuthorizationHandle, AuthorizationOutcome, OAuthGateway, UserAgent};
pub use secret_store::{FileSecretStore, InMemorySecretStore, SecretStore};
pub use token_store::TokenStore;

// Sync, analytics, storage
pub use analyzer::TransactionAnalyzer;
pub use budget::BudgetRecalculator;
pub use config::{AppConfig, ConfigError};
pub use forecast::{
    CategoryForecast, Forecast, ForecastDirection, ForecastEngine, ForecastMethod, ForecastPeriod,
};
pub use freshness::FreshnessTracker;
pub use notification::{NotificationSink, RecordingNotificationSink, TracingNotificationSink};
pub use repository::{InMemoryRepository, Repository};
pub use sync::{ConnectOutcome, SyncOrchestrator, SyncReport, SyncSettings};
