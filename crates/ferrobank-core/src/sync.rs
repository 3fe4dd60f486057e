//! # Sync Orchestrator
//!
//! Drives one provider at a time through:
//!
//! | Step | On failure |
//! |------|------------|
//! | active check | provider sync fails |
//! | freshness check | n/a, a fresh provider returns stored accounts and skips transactions |
//! | token acquisition | provider sync fails |
//! | consent (standard providers without one) | logged, sync continues without consent |
//! | adapter construction + account listing | provider sync fails |
//! | account upsert, persisted freshness mark | provider sync fails |
//!
//! Failures are scoped to the provider; [`SyncOrchestrator::sync_all`]
//! keeps going with the remaining providers and reports each outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapters::{
    AdapterContext, AdapterFactory, BankAdapter, ProviderAdapter, PublicProviderInfo,
    TransactionQuery,
};
use crate::analyzer::TransactionAnalyzer;
use crate::api_client::ApiClient;
use crate::budget::BudgetRecalculator;
use crate::consent::{ConsentGateway, RequestingParty};
use crate::freshness::{FreshnessTracker, DEFAULT_FRESHNESS_WINDOW};
use crate::notification::{NotificationSink, TracingNotificationSink};
use crate::oauth::{AuthorizationOutcome, OAuthGateway, UserAgent};
use crate::repository::Repository;
use crate::secret_store::SecretStore;
use crate::token_store::TokenStore;
use crate::{
    Account, ApiError, Balance, Card, ConnectedProvider, ConsentDetails, ProviderDescriptor,
    ProviderVariant, StorageError, SyncError, Transaction, UtcDateTime,
};

pub const DEFAULT_TRANSACTION_LIMIT: u32 = 100;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Upper bound applied to a configured look-back.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

const SECONDS_PER_DAY: u64 = 86_400;

/// Tunables for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub freshness_window: Duration,
    /// Transaction look-back when no start date is given; `None` means one
    /// calendar month.
    pub lookback_days: Option<u32>,
    pub transaction_limit: u32,
    pub max_concurrency: usize,
    pub requesting_party: Option<RequestingParty>,
    pub large_transaction_threshold: Option<Decimal>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            lookback_days: None,
            transaction_limit: DEFAULT_TRANSACTION_LIMIT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            requesting_party: None,
            large_transaction_threshold: None,
        }
    }
}

/// Result of connecting a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(ConnectedProvider),
    Cancelled,
}

/// Counts for one account's transaction page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionSyncOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

/// Accounts after a sync; `fetched` is false when they came from storage.
struct AccountSync {
    accounts: Vec<Account>,
    fetched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderSyncReport {
    pub provider_id: String,
    pub provider_name: String,
    pub accounts_synced: usize,
    pub transactions_inserted: usize,
    pub transactions_skipped: usize,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl ProviderSyncReport {
    fn new(provider: &ConnectedProvider) -> Self {
        Self {
            provider_id: provider.provider_id.clone(),
            provider_name: provider.name.clone(),
            ..Self::default()
        }
    }

    fn fail(mut self, error: &SyncError) -> Self {
        self.error_code = Some(error.code().to_owned());
        self.error_message = Some(error.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error_code.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub providers: Vec<ProviderSyncReport>,
    pub budgets_updated: usize,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.providers
            .iter()
            .filter(|report| !report.is_success())
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Explicitly wired sync services. Cloning shares the token cache and the
/// repository, which also holds the freshness marks.
#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    repository: Arc<dyn Repository>,
    oauth: OAuthGateway,
    consent: ConsentGateway,
    adapters: AdapterFactory,
    freshness: FreshnessTracker,
    notifications: Arc<dyn NotificationSink>,
    analyzer: TransactionAnalyzer,
    settings: SyncSettings,
    providers: BTreeMap<String, ProviderDescriptor>,
}

impl SyncOrchestrator {
    pub fn new(
        api: ApiClient,
        repository: Arc<dyn Repository>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        let tokens = TokenStore::new(secrets.clone());
        Self {
            freshness: FreshnessTracker::new(DEFAULT_FRESHNESS_WINDOW, repository.clone()),
            repository,
            oauth: OAuthGateway::new(api.clone(), tokens, secrets),
            consent: ConsentGateway::new(api.clone()),
            adapters: AdapterFactory::new(api),
            notifications: Arc::new(TracingNotificationSink),
            analyzer: TransactionAnalyzer::new(),
            settings: SyncSettings::default(),
            providers: BTreeMap::new(),
        }
    }

    pub fn with_providers(mut self, providers: impl IntoIterator<Item = ProviderDescriptor>) -> Self {
        self.providers = providers
            .into_iter()
            .map(|descriptor| (descriptor.id.clone(), descriptor))
            .collect();
        self
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.freshness = FreshnessTracker::new(settings.freshness_window, self.repository.clone());
        self.settings = settings;
        self
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_gateway_token_url(mut self, url: impl Into<String>) -> Self {
        self.oauth = self.oauth.with_gateway_token_url(url);
        self
    }

    pub fn oauth(&self) -> &OAuthGateway {
        &self.oauth
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.values()
    }

    pub fn descriptor(&self, provider_id: &str) -> Result<&ProviderDescriptor, SyncError> {
        self.providers
            .get(provider_id)
            .ok_or_else(|| SyncError::UnknownProvider(provider_id.to_owned()))
    }

    /// Stored provider record; disconnected providers are rejected.
    fn connected(&self, provider_id: &str) -> Result<ConnectedProvider, SyncError> {
        let provider = self
            .repository
            .get_provider(provider_id)?
            .ok_or_else(|| {
                SyncError::Storage(StorageError::NotFound {
                    entity: "provider",
                    id: provider_id.to_owned(),
                })
            })?;
        ensure_active(provider)
    }

    /// Obtains a first token and records the provider as connected. With a
    /// user agent, standard providers run the interactive flow; otherwise
    /// the client-credentials exchange is used. A cancelled interactive flow
    /// persists nothing.
    pub async fn connect_provider(
        &self,
        provider_id: &str,
        user_agent: Option<&dyn UserAgent>,
    ) -> Result<ConnectOutcome, SyncError> {
        let descriptor = self.descriptor(provider_id)?.clone();
        if let Some(secret) = descriptor.oauth.client_secret.as_deref() {
            self.oauth.store_client_secret(&descriptor.id, secret);
        }

        match (descriptor.variant, user_agent) {
            (ProviderVariant::Standard, Some(user_agent)) => {
                match self.oauth.authenticate(&descriptor, user_agent).await? {
                    AuthorizationOutcome::Authorized(_) => {}
                    AuthorizationOutcome::Cancelled => return Ok(ConnectOutcome::Cancelled),
                }
            }
            _ => {
                self.oauth.client_credentials(&descriptor).await?;
            }
        }

        let now = UtcDateTime::now();
        let provider = match self.repository.get_provider(provider_id)? {
            Some(mut existing) => {
                existing.is_active = true;
                existing.name = descriptor.name.clone();
                existing.base_url = descriptor.base_url.clone();
                existing.client_id = descriptor.oauth.client_id.clone();
                existing
            }
            None => ConnectedProvider::from_descriptor(
                &descriptor,
                self.settings
                    .requesting_party
                    .as_ref()
                    .map(|party| party.id.clone()),
                now,
            ),
        };
        self.repository.upsert_provider(&provider)?;
        self.freshness.invalidate(provider_id)?;
        info!(provider = provider_id, "provider connected");
        Ok(ConnectOutcome::Connected(provider))
    }

    /// Deactivates the provider and drops its credentials. Accounts and
    /// transactions stay in storage.
    pub async fn disconnect_provider(&self, provider_id: &str) -> Result<(), SyncError> {
        self.repository.deactivate_provider(provider_id)?;
        self.oauth.disconnect(provider_id).await;
        self.freshness.invalidate(provider_id)?;
        info!(provider = provider_id, "provider disconnected");
        Ok(())
    }

    /// Forgets the last sync time of one provider, or of all of them.
    pub async fn invalidate(&self, provider_id: Option<&str>) -> Result<(), SyncError> {
        match provider_id {
            Some(provider_id) => self.freshness.invalidate(provider_id)?,
            None => {
                for provider in self.repository.active_providers()? {
                    self.freshness.invalidate(&provider.provider_id)?;
                }
            }
        }
        Ok(())
    }

    pub async fn sync_accounts(&self, provider_id: &str) -> Result<Vec<Account>, SyncError> {
        let provider = self.connected(provider_id)?;
        Ok(self.run_account_sync(&provider).await?.accounts)
    }

    async fn run_account_sync(&self, provider: &ConnectedProvider) -> Result<AccountSync, SyncError> {
        let provider_id = provider.provider_id.as_str();
        let result = self.sync_accounts_for(provider).await;
        match &result {
            Ok(sync) => {
                info!(
                    provider = provider_id,
                    count = sync.accounts.len(),
                    fetched = sync.fetched,
                    "accounts synced"
                );
                self.notifications.sync_success(&provider.name);
            }
            Err(error) => {
                warn!(provider = provider_id, code = error.code(), %error, "account sync failed");
                self.notifications.sync_error(&provider.name);
            }
        }
        result
    }

    async fn sync_accounts_for(&self, provider: &ConnectedProvider) -> Result<AccountSync, SyncError> {
        let provider_id = provider.provider_id.as_str();
        if self.freshness.is_fresh(provider_id)? {
            debug!(provider = provider_id, "within freshness window, using stored accounts");
            return Ok(AccountSync {
                accounts: self.repository.accounts_for_provider(provider_id)?,
                fetched: false,
            });
        }

        let descriptor = self.descriptor(provider_id)?;
        let token = self.oauth.access_token_for(descriptor).await?;

        let consent_id = match &provider.consent_id {
            Some(consent_id) => Some(consent_id.clone()),
            None => self.try_create_consent(descriptor, provider, &token).await?,
        };

        let adapter = self.adapters.create(
            descriptor,
            AdapterContext::new(token)
                .with_consent_id(consent_id)
                .with_requesting_party(provider.requesting_party_id.clone()),
        );
        let accounts = adapter.list_accounts().await?;

        let now = UtcDateTime::now();
        let mut stored = Vec::with_capacity(accounts.len());
        for mut account in accounts {
            account.last_synced_at = Some(now);
            self.repository.upsert_account(&account)?;
            stored.push(account);
        }
        self.freshness.mark(provider_id, now)?;
        Ok(AccountSync {
            accounts: stored,
            fetched: true,
        })
    }

    /// Best-effort consent creation. Only storage failures propagate.
    async fn try_create_consent(
        &self,
        descriptor: &ProviderDescriptor,
        provider: &ConnectedProvider,
        token: &str,
    ) -> Result<Option<String>, StorageError> {
        if descriptor.is_gateway() {
            return Ok(None);
        }
        let Some(party) = self.requesting_party(provider) else {
            debug!(provider = %provider.provider_id, "no requesting party configured, skipping consent");
            return Ok(None);
        };

        match self
            .consent
            .create_account_consent(token, &provider.client_id, &party, &descriptor.base_url)
            .await
        {
            Ok(consent) => {
                self.repository
                    .set_consent(&provider.provider_id, Some(&consent.consent_id))?;
                Ok(Some(consent.consent_id))
            }
            Err(error) => {
                warn!(
                    provider = %provider.provider_id,
                    code = error.code(),
                    %error,
                    "consent creation failed, continuing without consent"
                );
                Ok(None)
            }
        }
    }

    fn requesting_party(&self, provider: &ConnectedProvider) -> Option<RequestingParty> {
        let configured = self.settings.requesting_party.as_ref();
        let id = provider
            .requesting_party_id
            .clone()
            .or_else(|| configured.map(|party| party.id.clone()))?;
        let name = configured
            .map(|party| party.name.clone())
            .unwrap_or_else(|| id.clone());
        Some(RequestingParty { id, name })
    }

    /// Fetches one transaction page and inserts the records not yet stored.
    /// `from` defaults to the configured look-back before now.
    pub async fn sync_transactions(
        &self,
        account: &Account,
        from: Option<UtcDateTime>,
        to: Option<UtcDateTime>,
    ) -> Result<TransactionSyncOutcome, SyncError> {
        let provider = self
            .repository
            .get_provider(&account.provider_id)?
            .ok_or_else(|| {
                ApiError::invalid_account_configuration(format!(
                    "account '{}' has no owning provider '{}'",
                    account.account_id, account.provider_id
                ))
            })?;
        let provider = ensure_active(provider)?;
        let adapter = self.adapter_for(&provider).await?;

        let now = UtcDateTime::now();
        let from = from.unwrap_or_else(|| self.default_from(now));
        let to = to.unwrap_or(now);
        let page = adapter
            .list_transactions(
                TransactionQuery::new(&account.account_id)
                    .with_range(from, to)
                    .with_limit(self.settings.transaction_limit),
            )
            .await?;

        let mut outcome = TransactionSyncOutcome::default();
        for transaction in page {
            let transaction = self.analyzer.categorize_if_missing(transaction);
            if self.repository.insert_transaction_if_absent(&transaction)? {
                outcome.inserted += 1;
                self.flag_large(&transaction);
            } else {
                outcome.skipped += 1;
            }
        }
        debug!(
            provider = %account.provider_id,
            account = %account.account_id,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "transactions synced"
        );
        Ok(outcome)
    }

    fn default_from(&self, now: UtcDateTime) -> UtcDateTime {
        match self.settings.lookback_days {
            Some(days) => {
                let days = days.min(MAX_LOOKBACK_DAYS);
                now - Duration::from_secs(u64::from(days) * SECONDS_PER_DAY)
            }
            None => now.months_before(1),
        }
    }

    fn flag_large(&self, transaction: &Transaction) {
        if let Some(threshold) = self.settings.large_transaction_threshold {
            if self.analyzer.is_large(transaction, threshold) {
                self.notifications
                    .large_transaction(transaction.magnitude(), transaction.description.as_deref());
            }
        }
    }

    /// Syncs every active provider, at most `max_concurrency` at a time,
    /// then recomputes budgets over the full transaction set.
    pub async fn sync_all(&self) -> Result<SyncReport, SyncError> {
        let providers = self.repository.active_providers()?;
        let concurrency = self.settings.max_concurrency.max(1);

        let mut reports: Vec<ProviderSyncReport> = stream::iter(providers)
            .map(|provider| self.sync_provider(provider))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        reports.sort_by(|left, right| left.provider_id.cmp(&right.provider_id));
        self.finish(reports)
    }

    /// Same as [`Self::sync_all`] restricted to one connected provider.
    pub async fn sync_one(&self, provider_id: &str) -> Result<SyncReport, SyncError> {
        let provider = self.connected(provider_id)?;
        let report = self.sync_provider(provider).await;
        self.finish(vec![report])
    }

    fn finish(&self, reports: Vec<ProviderSyncReport>) -> Result<SyncReport, SyncError> {
        let transactions = self.repository.all_transactions()?;
        let budgets = BudgetRecalculator::new(self.repository.clone(), self.notifications.clone())
            .recalculate_all(&transactions, UtcDateTime::now())?;

        let report = SyncReport {
            providers: reports,
            budgets_updated: budgets.len(),
        };
        info!(
            providers = report.providers.len(),
            failed = report.failed(),
            budgets = report.budgets_updated,
            "sync finished"
        );
        Ok(report)
    }

    async fn sync_provider(&self, provider: ConnectedProvider) -> ProviderSyncReport {
        let report = ProviderSyncReport::new(&provider);
        let AccountSync { accounts, fetched } = match self.run_account_sync(&provider).await {
            Ok(sync) => sync,
            Err(error) => return report.fail(&error),
        };

        let mut report = ProviderSyncReport {
            accounts_synced: accounts.len(),
            ..report
        };
        if !fetched {
            debug!(provider = %provider.provider_id, "within freshness window, skipping transactions");
            return report;
        }
        for account in &accounts {
            match self.sync_transactions(account, None, None).await {
                Ok(outcome) => {
                    report.transactions_inserted += outcome.inserted;
                    report.transactions_skipped += outcome.skipped;
                }
                Err(error) => {
                    warn!(
                        provider = %provider.provider_id,
                        account = %account.account_id,
                        %error,
                        "transaction sync failed"
                    );
                    return report.fail(&error);
                }
            }
        }
        report
    }

    /// Sum of balances over active accounts of connected providers in
    /// `currency`. Read-only; no network.
    pub fn total_balance(&self, currency: &str) -> Result<Decimal, SyncError> {
        Ok(self
            .active_accounts_in(currency)?
            .iter()
            .map(|account| account.balance)
            .sum())
    }

    pub fn total_available_balance(&self, currency: &str) -> Result<Decimal, SyncError> {
        Ok(self
            .active_accounts_in(currency)?
            .iter()
            .map(|account| account.available_balance)
            .sum())
    }

    fn active_accounts_in(&self, currency: &str) -> Result<Vec<Account>, SyncError> {
        Ok(self
            .repository
            .active_accounts()?
            .into_iter()
            .filter(|account| account.currency.eq_ignore_ascii_case(currency))
            .collect())
    }

    /// Refreshes one account's balances from the provider and stores them.
    pub async fn get_balance(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Balance, SyncError> {
        let provider = self.connected(provider_id)?;
        let balance = self.adapter_for(&provider).await?.get_balance(account_id).await?;

        if let Some(mut account) = self.repository.get_account(provider_id, account_id)? {
            account.balance = balance.balance;
            account.available_balance = balance.available_balance;
            account.last_synced_at = Some(balance.last_updated);
            self.repository.upsert_account(&account)?;
        }
        Ok(balance)
    }

    pub async fn get_card_info(&self, provider_id: &str, card_id: &str) -> Result<Card, SyncError> {
        let provider = self.connected(provider_id)?;
        Ok(self.adapter_for(&provider).await?.get_card_info(card_id).await?)
    }

    /// Public profile of a gateway provider.
    pub async fn public_info(&self, provider_id: &str) -> Result<PublicProviderInfo, SyncError> {
        let provider = self.connected(provider_id)?;
        let adapter = self.adapter_for(&provider).await?;
        let gateway = adapter.as_gateway().ok_or_else(|| {
            ApiError::invalid_provider_configuration(format!(
                "provider '{provider_id}' does not publish public info"
            ))
        })?;
        Ok(gateway.get_public_info().await?)
    }

    pub async fn consent_status(&self, provider_id: &str) -> Result<ConsentDetails, SyncError> {
        let provider = self.connected(provider_id)?;
        let consent_id = stored_consent(&provider)?;
        let descriptor = self.descriptor(provider_id)?;
        let token = self.oauth.tokens().access_token(provider_id).await;
        Ok(self
            .consent
            .get_consent_status(token.as_deref(), consent_id, &descriptor.base_url)
            .await?)
    }

    /// Revokes the stored consent at the provider and forgets it locally.
    pub async fn revoke_consent(&self, provider_id: &str) -> Result<(), SyncError> {
        let provider = self.connected(provider_id)?;
        let consent_id = stored_consent(&provider)?;
        let descriptor = self.descriptor(provider_id)?;
        let token = self.oauth.tokens().access_token(provider_id).await;
        self.consent
            .revoke_consent(token.as_deref(), consent_id, &descriptor.base_url)
            .await?;
        self.repository.set_consent(provider_id, None)?;
        self.freshness.invalidate(provider_id)?;
        Ok(())
    }

    async fn adapter_for(&self, provider: &ConnectedProvider) -> Result<ProviderAdapter, SyncError> {
        let descriptor = self.descriptor(&provider.provider_id)?;
        let token = self.oauth.access_token_for(descriptor).await?;
        Ok(self.adapters.create(
            descriptor,
            AdapterContext::new(token)
                .with_consent_id(provider.consent_id.clone())
                .with_requesting_party(provider.requesting_party_id.clone()),
        ))
    }
}

fn ensure_active(provider: ConnectedProvider) -> Result<ConnectedProvider, SyncError> {
    if provider.is_active {
        Ok(provider)
    } else {
        Err(SyncError::ProviderInactive(provider.provider_id))
    }
}

fn stored_consent(provider: &ConnectedProvider) -> Result<&str, ApiError> {
    provider.consent_id.as_deref().ok_or_else(|| {
        ApiError::not_found(format!(
            "no consent stored for provider '{}'",
            provider.provider_id
        ))
    })
}
