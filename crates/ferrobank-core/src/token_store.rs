//! Per-provider token cache backed by durable secret storage.
//!
//! Readers share a `tokio::sync::RwLock`; writers are exclusive and write
//! through to the [`SecretStore`] before the in-memory entry changes. Secret
//! storage failures are logged and never fail the caller.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::secret_store::{token_key, SecretStore, TOKEN_KEY_PREFIX};
use crate::{TokenRecord, TokenResponse, UtcDateTime};

#[derive(Clone)]
pub struct TokenStore {
    cache: Arc<RwLock<HashMap<String, TokenRecord>>>,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            secrets,
        }
    }

    pub async fn save(&self, provider_id: &str, response: &TokenResponse) -> TokenRecord {
        self.save_at(provider_id, response, UtcDateTime::now()).await
    }

    /// Stores `response` with expiry `issued_at + expires_in`.
    pub async fn save_at(
        &self,
        provider_id: &str,
        response: &TokenResponse,
        issued_at: UtcDateTime,
    ) -> TokenRecord {
        let record = TokenRecord::from_response(response, issued_at);
        self.put(provider_id, record.clone()).await;
        record
    }

    pub async fn put(&self, provider_id: &str, record: TokenRecord) {
        let mut cache = self.cache.write().await;
        match serde_json::to_vec(&record) {
            Ok(bytes) => {
                if let Err(error) = self.secrets.save(&token_key(provider_id), &bytes) {
                    warn!(provider = provider_id, %error, "failed to persist token record");
                }
            }
            Err(error) => warn!(provider = provider_id, %error, "failed to encode token record"),
        }
        cache.insert(provider_id.to_owned(), record);
    }

    /// Cache first; on a miss the durable copy is loaded and cached.
    pub async fn get(&self, provider_id: &str) -> Option<TokenRecord> {
        if let Some(record) = self.cache.read().await.get(provider_id) {
            return Some(record.clone());
        }

        let record = self.load_durable(provider_id)?;
        let mut cache = self.cache.write().await;
        Some(
            cache
                .entry(provider_id.to_owned())
                .or_insert(record)
                .clone(),
        )
    }

    pub async fn access_token(&self, provider_id: &str) -> Option<String> {
        self.get(provider_id).await.map(|record| record.access_token)
    }

    pub async fn refresh_token(&self, provider_id: &str) -> Option<String> {
        self.get(provider_id)
            .await
            .and_then(|record| record.refresh_token)
    }

    pub async fn needs_refresh(&self, provider_id: &str) -> bool {
        self.needs_refresh_at(provider_id, UtcDateTime::now()).await
    }

    /// True when no record exists, or the record is expired or near expiry.
    pub async fn needs_refresh_at(&self, provider_id: &str, now: UtcDateTime) -> bool {
        match self.get(provider_id).await {
            Some(record) => record.needs_refresh_at(now),
            None => true,
        }
    }

    pub async fn delete(&self, provider_id: &str) {
        let mut cache = self.cache.write().await;
        if let Err(error) = self.secrets.delete(&token_key(provider_id)) {
            warn!(provider = provider_id, %error, "failed to delete stored token");
        }
        cache.remove(provider_id);
    }

    /// Removes every token record, including durable ones this process
    /// never loaded. Other secrets such as client secrets are kept.
    pub async fn delete_all(&self) {
        let mut cache = self.cache.write().await;
        let mut provider_ids: BTreeSet<String> = cache.keys().cloned().collect();
        match self.secrets.keys() {
            Ok(keys) => provider_ids.extend(
                keys.iter()
                    .filter_map(|key| key.strip_prefix(TOKEN_KEY_PREFIX))
                    .map(str::to_owned),
            ),
            Err(error) => warn!(%error, "failed to list stored tokens"),
        }
        for provider_id in &provider_ids {
            if let Err(error) = self.secrets.delete(&token_key(provider_id)) {
                warn!(provider = %provider_id, %error, "failed to delete stored token");
            }
        }
        cache.clear();
    }

    fn load_durable(&self, provider_id: &str) -> Option<TokenRecord> {
        let bytes = match self.secrets.get(&token_key(provider_id)) {
            Ok(bytes) => bytes?,
            Err(error) => {
                warn!(provider = provider_id, %error, "failed to read stored token");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(provider = provider_id, %error, "stored token record is corrupt");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::secret_store::InMemorySecretStore;

    fn response(expires_in: Option<u64>) -> TokenResponse {
        TokenResponse {
            access_token: String::from("access-1"),
            refresh_token: Some(String::from("refresh-1")),
            id_token: None,
            token_type: String::from("Bearer"),
            expires_in,
            scope: Some(String::from("accounts")),
        }
    }

    #[tokio::test]
    async fn save_writes_through_to_secret_storage() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let store = TokenStore::new(secrets.clone());

        store.save("bank-a", &response(Some(3600))).await;

        assert!(secrets.get("access_token_bank-a").expect("get").is_some());
        assert_eq!(store.access_token("bank-a").await.as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token("bank-a").await.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn cache_miss_falls_back_to_durable_copy() {
        let secrets = Arc::new(InMemorySecretStore::new());
        TokenStore::new(secrets.clone())
            .save("bank-a", &response(None))
            .await;

        let fresh_process = TokenStore::new(secrets);
        let record = fresh_process.get("bank-a").await.expect("loaded from secrets");
        assert_eq!(record.access_token, "access-1");
        assert_eq!(record.expires_at, None);
    }

    #[tokio::test]
    async fn missing_record_needs_refresh() {
        let store = TokenStore::new(Arc::new(InMemorySecretStore::new()));
        assert!(store.needs_refresh("unknown").await);
    }

    #[tokio::test]
    async fn delete_removes_cache_and_durable_copy() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let store = TokenStore::new(secrets.clone());
        let issued = UtcDateTime::now();
        store.save_at("bank-a", &response(Some(3600)), issued).await;
        assert!(!store.needs_refresh_at("bank-a", issued + Duration::from_secs(60)).await);

        store.delete("bank-a").await;

        assert!(store.get("bank-a").await.is_none());
        assert!(secrets.is_empty());
    }

    #[tokio::test]
    async fn delete_all_reaches_tokens_saved_by_another_process() {
        // Given tokens written by an earlier process next to a client secret
        let secrets = Arc::new(InMemorySecretStore::new());
        let earlier = TokenStore::new(secrets.clone());
        earlier.save("bank-a", &response(Some(3600))).await;
        earlier.save("bank-b", &response(None)).await;
        secrets
            .save(&crate::secret_store::client_secret_key("bank-a"), b"s3cret")
            .expect("save");

        // When a fresh store with an empty cache deletes everything
        let fresh_process = TokenStore::new(secrets.clone());
        fresh_process.delete_all().await;

        // Then no token survives but the client secret does
        assert!(fresh_process.get("bank-a").await.is_none());
        assert!(fresh_process.get("bank-b").await.is_none());
        assert_eq!(secrets.keys().expect("keys"), vec![String::from("bank-a_client_secret")]);
    }
}
