use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use crate::adapters::wire::{
    normalize_account, normalize_balance, normalize_card, normalize_transaction, AccountsEnvelope,
    BalancePayload, CardPayload, TransactionsEnvelope,
};
use crate::adapters::{BankAdapter, TransactionQuery};
use crate::api_client::{probe_paths, ApiClient};
use crate::http_client::{HttpAuth, HttpRequest};
use crate::{
    Account, ApiError, ApiErrorKind, Balance, Card, ProviderDescriptor, ProviderVariant,
    Transaction, UtcDateTime,
};

pub const ACCOUNT_CANDIDATE_PATHS: [&str; 3] = ["/accounts", "/api/v1/accounts", "/api/accounts"];

/// Open Banking adapter: bearer token plus requesting-party and consent
/// headers.
#[derive(Debug, Clone)]
pub struct StandardAdapter {
    api: ApiClient,
    provider: ProviderDescriptor,
    access_token: String,
    consent_id: Option<String>,
    requesting_party_id: Option<String>,
    account_paths: Vec<String>,
}

impl StandardAdapter {
    pub fn new(api: ApiClient, provider: ProviderDescriptor, access_token: impl Into<String>) -> Self {
        Self {
            api,
            provider,
            access_token: access_token.into(),
            consent_id: None,
            requesting_party_id: None,
            account_paths: ACCOUNT_CANDIDATE_PATHS
                .iter()
                .map(|path| (*path).to_owned())
                .collect(),
        }
    }

    pub fn with_consent_id(mut self, consent_id: Option<String>) -> Self {
        self.consent_id = consent_id;
        self
    }

    pub fn with_requesting_party(mut self, requesting_party_id: Option<String>) -> Self {
        self.requesting_party_id = requesting_party_id;
        self
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        let mut request = request
            .with_auth(&HttpAuth::BearerToken(self.access_token.clone()))
            .with_header("accept", "application/json");
        if let Some(party) = &self.requesting_party_id {
            request = request.with_header("x-requesting-bank", party);
        }
        if let Some(consent_id) = &self.consent_id {
            request = request.with_header("x-consent-id", consent_id);
        }
        request
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.provider.base_url)
    }

    async fn fetch_accounts(&self) -> Result<Vec<Account>, ApiError> {
        let client_id = self.provider.oauth.client_id.as_str();
        let envelope: AccountsEnvelope = probe_paths(
            &self.account_paths,
            |path| {
                let request = self.authorized(
                    HttpRequest::get(self.url(path)).with_query("client_id", client_id),
                );
                debug!(provider = %self.provider.id, path, "listing accounts");
                self.api.execute_json(request)
            },
            |tried, last| {
                last.unwrap_or_else(|| {
                    ApiError::not_found(format!(
                        "no account listing endpoint answered after {tried} paths"
                    ))
                })
            },
        )
        .await
        .map_err(|error| {
            if error.kind() == ApiErrorKind::Forbidden {
                ApiError::forbidden(format!(
                    "consent missing for provider '{}': {}",
                    self.provider.id,
                    error.message()
                ))
            } else {
                error
            }
        })?;

        let synced_at = UtcDateTime::now();
        let accounts = envelope
            .accounts
            .into_iter()
            .map(|payload| normalize_account(payload, &self.provider.id, synced_at))
            .collect::<Result<Vec<_>, _>>()?;
        info!(provider = %self.provider.id, count = accounts.len(), "accounts listed");
        Ok(accounts)
    }
}

impl BankAdapter for StandardAdapter {
    fn provider_id(&self) -> &str {
        &self.provider.id
    }

    fn variant(&self) -> ProviderVariant {
        ProviderVariant::Standard
    }

    fn list_accounts<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Account>, ApiError>> + Send + 'a>> {
        Box::pin(self.fetch_accounts())
    }

    fn get_balance<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Balance, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.url(&format!(
                "/api/v1/accounts/{}/balances",
                urlencoding::encode(account_id)
            ));
            let payload: BalancePayload = self
                .api
                .execute_json(self.authorized(HttpRequest::get(url)))
                .await?;
            normalize_balance(payload)
        })
    }

    fn list_transactions<'a>(
        &'a self,
        query: TransactionQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Transaction>, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let mut request = HttpRequest::get(self.url(&format!(
                "/api/v1/accounts/{}/transactions",
                urlencoding::encode(&query.account_id)
            )));
            if let Some(from) = query.from {
                request = request.with_query("from_booking_date_time", &from.format_rfc3339());
            }
            if let Some(to) = query.to {
                request = request.with_query("to_booking_date_time", &to.format_rfc3339());
            }
            if let Some(limit) = query.limit {
                request = request.with_query("limit", &limit.to_string());
            }
            let request = self.authorized(request.with_query("page", "1"));

            let envelope: TransactionsEnvelope = self.api.execute_json(request).await?;
            envelope
                .transactions
                .into_iter()
                .map(|payload| normalize_transaction(payload, &query.account_id, &self.provider.id))
                .collect()
        })
    }

    fn get_card_info<'a>(
        &'a self,
        card_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Card, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.url(&format!("/cards/{}", urlencoding::encode(card_id)));
            let payload: CardPayload = self
                .api
                .execute_json(self.authorized(HttpRequest::get(url)))
                .await?;
            Ok(normalize_card(payload, &self.provider.id))
        })
    }
}
