use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use crate::adapters::signing::sign_request;
use crate::adapters::wire::{
    normalize_account, normalize_balance, normalize_card, normalize_transaction, AccountsEnvelope,
    BalancePayload, CardPayload, PublicProviderInfo, TransactionsEnvelope,
};
use crate::adapters::{BankAdapter, TransactionQuery};
use crate::api_client::ApiClient;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::{
    Account, ApiError, Balance, Card, ProviderDescriptor, ProviderVariant, Transaction,
    UtcDateTime,
};

pub const GATEWAY_PATH_PREFIX: &str = "/api/rb/rewardsPay/hackathon/v1";

/// Signed-request gateway adapter. Every request is signed right before
/// dispatch, after all other headers are in place.
#[derive(Debug, Clone)]
pub struct GatewayAdapter {
    api: ApiClient,
    provider: ProviderDescriptor,
    access_token: String,
}

impl GatewayAdapter {
    pub fn new(api: ApiClient, provider: ProviderDescriptor, access_token: impl Into<String>) -> Self {
        Self {
            api,
            provider,
            access_token: access_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{GATEWAY_PATH_PREFIX}{path}", self.provider.base_url)
    }

    fn signed(&self, request: HttpRequest) -> HttpRequest {
        let request = request
            .with_auth(&HttpAuth::BearerToken(self.access_token.clone()))
            .with_header("accept", "application/json");
        sign_request(request, UtcDateTime::now().unix_timestamp())
    }

    /// Public provider profile. Only the gateway protocol serves it.
    pub async fn get_public_info(&self) -> Result<PublicProviderInfo, ApiError> {
        let url = self.url(&format!(
            "/banks/{}/public",
            urlencoding::encode(&self.provider.id)
        ));
        self.api.execute_json(self.signed(HttpRequest::get(url))).await
    }
}

impl BankAdapter for GatewayAdapter {
    fn provider_id(&self) -> &str {
        &self.provider.id
    }

    fn variant(&self) -> ProviderVariant {
        ProviderVariant::Gateway
    }

    fn list_accounts<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Account>, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            debug!(provider = %self.provider.id, "listing gateway accounts");
            let envelope: AccountsEnvelope = self
                .api
                .execute_json(self.signed(HttpRequest::get(self.url("/accounts"))))
                .await?;
            let synced_at = UtcDateTime::now();
            let accounts = envelope
                .accounts
                .into_iter()
                .map(|payload| normalize_account(payload, &self.provider.id, synced_at))
                .collect::<Result<Vec<_>, _>>()?;
            info!(provider = %self.provider.id, count = accounts.len(), "accounts listed");
            Ok(accounts)
        })
    }

    fn get_balance<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Balance, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.url(&format!(
                "/accounts/{}/balance",
                urlencoding::encode(account_id)
            ));
            let payload: BalancePayload = self
                .api
                .execute_json(self.signed(HttpRequest::get(url)))
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
                "/accounts/{}/transactions",
                urlencoding::encode(&query.account_id)
            )));
            if let Some(from) = query.from {
                request = request.with_query("from_date", &from.format_rfc3339());
            }
            if let Some(to) = query.to {
                request = request.with_query("to_date", &to.format_rfc3339());
            }
            if let Some(limit) = query.limit {
                request = request.with_query("limit", &limit.to_string());
            }

            let envelope: TransactionsEnvelope =
                self.api.execute_json(self.signed(request)).await?;
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
                .execute_json(self.signed(HttpRequest::get(url)))
                .await?;
            Ok(normalize_card(payload, &self.provider.id))
        })
    }
}
