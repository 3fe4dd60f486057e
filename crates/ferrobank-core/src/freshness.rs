use std::sync::Arc;
use std::time::Duration;

use crate::repository::Repository;
use crate::{StorageError, UtcDateTime};

pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(300);

/// Per-provider sync freshness. The last successful sync is stored on the
/// provider record, so the window holds across restarts and across
/// orchestrators sharing one repository.
#[derive(Debug, Clone)]
pub struct FreshnessTracker {
    window: Duration,
    repository: Arc<dyn Repository>,
}

impl FreshnessTracker {
    pub fn new(window: Duration, repository: Arc<dyn Repository>) -> Self {
        Self { window, repository }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_fresh(&self, provider_id: &str) -> Result<bool, StorageError> {
        self.is_fresh_at(provider_id, UtcDateTime::now())
    }

    pub fn is_fresh_at(&self, provider_id: &str, now: UtcDateTime) -> Result<bool, StorageError> {
        Ok(self
            .last_synced(provider_id)?
            .is_some_and(|last| last + self.window > now))
    }

    pub fn mark(&self, provider_id: &str, at: UtcDateTime) -> Result<(), StorageError> {
        self.repository.set_last_synced(provider_id, Some(at))
    }

    pub fn invalidate(&self, provider_id: &str) -> Result<(), StorageError> {
        self.repository.set_last_synced(provider_id, None)
    }

    pub fn last_synced(&self, provider_id: &str) -> Result<Option<UtcDateTime>, StorageError> {
        Ok(self
            .repository
            .get_provider(provider_id)?
            .and_then(|provider| provider.last_synced_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::{ConnectedProvider, OAuthConfig, ProviderDescriptor, ProviderVariant};

    fn repository_with(provider_id: &str) -> Arc<InMemoryRepository> {
        let descriptor = ProviderDescriptor::new(
            provider_id,
            "Bank",
            "https://bank.test",
            OAuthConfig::for_base_url("https://bank.test", "team042"),
            ProviderVariant::Standard,
        )
        .expect("descriptor");
        let repository = Arc::new(InMemoryRepository::new());
        repository
            .upsert_provider(&ConnectedProvider::from_descriptor(
                &descriptor,
                None,
                UtcDateTime::now(),
            ))
            .expect("upsert");
        repository
    }

    #[test]
    fn entry_expires_after_window() {
        let tracker = FreshnessTracker::new(Duration::from_secs(300), repository_with("bank"));
        let synced_at = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("valid");
        tracker.mark("bank", synced_at).expect("mark");

        assert!(tracker
            .is_fresh_at("bank", synced_at + Duration::from_secs(299))
            .expect("read"));
        assert!(!tracker
            .is_fresh_at("bank", synced_at + Duration::from_secs(300))
            .expect("read"));
        assert!(!tracker.is_fresh_at("other", synced_at).expect("read"));
    }

    #[test]
    fn invalidate_forces_next_sync() {
        let tracker = FreshnessTracker::new(DEFAULT_FRESHNESS_WINDOW, repository_with("bank"));
        tracker.mark("bank", UtcDateTime::now()).expect("mark");
        tracker.invalidate("bank").expect("invalidate");
        assert!(!tracker.is_fresh("bank").expect("read"));
        assert_eq!(tracker.last_synced("bank").expect("read"), None);
    }

    #[test]
    fn second_tracker_over_same_repository_sees_the_mark() {
        let repository = repository_with("bank");
        FreshnessTracker::new(DEFAULT_FRESHNESS_WINDOW, repository.clone())
            .mark("bank", UtcDateTime::now())
            .expect("mark");

        let restarted = FreshnessTracker::new(DEFAULT_FRESHNESS_WINDOW, repository);
        assert!(restarted.is_fresh("bank").expect("read"));
    }
}
