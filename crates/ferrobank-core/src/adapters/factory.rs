use std::future::Future;
use std::pin::Pin;

use crate::adapters::{BankAdapter, GatewayAdapter, StandardAdapter, TransactionQuery};
use crate::api_client::ApiClient;
use crate::{Account, ApiError, Balance, Card, ProviderDescriptor, ProviderVariant, Transaction};

/// Per-sync inputs for adapter construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterContext {
    pub access_token: String,
    pub consent_id: Option<String>,
    pub requesting_party_id: Option<String>,
}

impl AdapterContext {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            consent_id: None,
            requesting_party_id: None,
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
}

/// Exactly one of the two protocol adapters.
#[derive(Debug, Clone)]
pub enum ProviderAdapter {
    Standard(StandardAdapter),
    Gateway(GatewayAdapter),
}

impl ProviderAdapter {
    fn inner(&self) -> &dyn BankAdapter {
        match self {
            Self::Standard(adapter) => adapter,
            Self::Gateway(adapter) => adapter,
        }
    }

    pub fn as_gateway(&self) -> Option<&GatewayAdapter> {
        match self {
            Self::Gateway(adapter) => Some(adapter),
            Self::Standard(_) => None,
        }
    }
}

impl BankAdapter for ProviderAdapter {
    fn provider_id(&self) -> &str {
        self.inner().provider_id()
    }

    fn variant(&self) -> ProviderVariant {
        self.inner().variant()
    }

    fn list_accounts<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Account>, ApiError>> + Send + 'a>> {
        self.inner().list_accounts()
    }

    fn get_balance<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Balance, ApiError>> + Send + 'a>> {
        self.inner().get_balance(account_id)
    }

    fn list_transactions<'a>(
        &'a self,
        query: TransactionQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Transaction>, ApiError>> + Send + 'a>> {
        self.inner().list_transactions(query)
    }

    fn get_card_info<'a>(
        &'a self,
        card_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Card, ApiError>> + Send + 'a>> {
        self.inner().get_card_info(card_id)
    }
}

/// Selects the adapter by the descriptor's variant. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    api: ApiClient,
}

impl AdapterFactory {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn create(&self, provider: &ProviderDescriptor, context: AdapterContext) -> ProviderAdapter {
        match provider.variant {
            ProviderVariant::Standard => ProviderAdapter::Standard(
                StandardAdapter::new(self.api.clone(), provider.clone(), context.access_token)
                    .with_consent_id(context.consent_id)
                    .with_requesting_party(context.requesting_party_id),
            ),
            ProviderVariant::Gateway => ProviderAdapter::Gateway(GatewayAdapter::new(
                self.api.clone(),
                provider.clone(),
                context.access_token,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::ScriptedHttpClient;
    use crate::OAuthConfig;

    fn descriptor(variant: ProviderVariant) -> ProviderDescriptor {
        ProviderDescriptor::new(
            "bank",
            "Bank",
            "https://bank.test",
            OAuthConfig::for_base_url("https://bank.test", "client"),
            variant,
        )
        .expect("descriptor")
    }

    #[test]
    fn variant_selects_adapter() {
        let factory = AdapterFactory::new(ApiClient::new(Arc::new(ScriptedHttpClient::new())));

        let standard = factory.create(&descriptor(ProviderVariant::Standard), AdapterContext::new("t"));
        let gateway = factory.create(&descriptor(ProviderVariant::Gateway), AdapterContext::new("t"));

        assert_eq!(standard.variant(), ProviderVariant::Standard);
        assert!(standard.as_gateway().is_none());
        assert_eq!(gateway.variant(), ProviderVariant::Gateway);
        assert_eq!(gateway.provider_id(), "bank");
    }
}
