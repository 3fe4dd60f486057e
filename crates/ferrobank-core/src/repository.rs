//! Durable-storage contract consumed by the sync orchestrator.
//!
//! Implementations must make each upsert/insert atomic. Providers are never
//! hard-deleted; deactivation keeps accounts and transactions queryable.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Account, Budget, ConnectedProvider, StorageError, Transaction, UtcDateTime};

pub trait Repository: Send + Sync {
    fn upsert_provider(&self, provider: &ConnectedProvider) -> Result<(), StorageError>;

    fn get_provider(&self, provider_id: &str) -> Result<Option<ConnectedProvider>, StorageError>;

    fn active_providers(&self) -> Result<Vec<ConnectedProvider>, StorageError>;

    fn set_consent(&self, provider_id: &str, consent_id: Option<&str>) -> Result<(), StorageError>;

    /// Records (or with `None` forgets) the last successful account sync.
    fn set_last_synced(
        &self,
        provider_id: &str,
        synced_at: Option<UtcDateTime>,
    ) -> Result<(), StorageError>;

    /// Clears the active flag; history stays linked.
    fn deactivate_provider(&self, provider_id: &str) -> Result<(), StorageError>;

    /// Insert or replace keyed by `(account_id, provider_id)`.
    fn upsert_account(&self, account: &Account) -> Result<(), StorageError>;

    fn get_account(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<Account>, StorageError>;

    fn accounts_for_provider(&self, provider_id: &str) -> Result<Vec<Account>, StorageError>;

    /// Accounts with active status whose provider is active.
    fn active_accounts(&self) -> Result<Vec<Account>, StorageError>;

    /// Inserts unless `(provider_id, transaction_id)` already exists. Returns
    /// whether a row was written; existing rows are never updated.
    fn insert_transaction_if_absent(&self, transaction: &Transaction)
        -> Result<bool, StorageError>;

    /// Transactions booked in `[from, to]`, oldest first.
    fn transactions_between(
        &self,
        from: UtcDateTime,
        to: UtcDateTime,
    ) -> Result<Vec<Transaction>, StorageError>;

    fn all_transactions(&self) -> Result<Vec<Transaction>, StorageError>;

    /// Newest first.
    fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StorageError>;

    fn save_budget(&self, budget: &Budget) -> Result<(), StorageError>;

    fn budgets(&self) -> Result<Vec<Budget>, StorageError>;
}

impl std::fmt::Debug for dyn Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Repository")
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    providers: BTreeMap<String, ConnectedProvider>,
    accounts: BTreeMap<(String, String), Account>,
    transactions: BTreeMap<(String, String), Transaction>,
    budgets: BTreeMap<String, Budget>,
}

/// Process-local repository for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_provider(
        &self,
        provider_id: &str,
        update: impl FnOnce(&mut ConnectedProvider),
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        let provider = state
            .providers
            .get_mut(provider_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "provider",
                id: provider_id.to_owned(),
            })?;
        update(provider);
        Ok(())
    }
}

impl Repository for InMemoryRepository {
    fn upsert_provider(&self, provider: &ConnectedProvider) -> Result<(), StorageError> {
        self.state()
            .providers
            .insert(provider.provider_id.clone(), provider.clone());
        Ok(())
    }

    fn get_provider(&self, provider_id: &str) -> Result<Option<ConnectedProvider>, StorageError> {
        Ok(self.state().providers.get(provider_id).cloned())
    }

    fn active_providers(&self) -> Result<Vec<ConnectedProvider>, StorageError> {
        Ok(self
            .state()
            .providers
            .values()
            .filter(|provider| provider.is_active)
            .cloned()
            .collect())
    }

    fn set_consent(&self, provider_id: &str, consent_id: Option<&str>) -> Result<(), StorageError> {
        self.update_provider(provider_id, |provider| {
            provider.consent_id = consent_id.map(str::to_owned);
        })
    }

    fn set_last_synced(
        &self,
        provider_id: &str,
        synced_at: Option<UtcDateTime>,
    ) -> Result<(), StorageError> {
        self.update_provider(provider_id, |provider| provider.last_synced_at = synced_at)
    }

    fn deactivate_provider(&self, provider_id: &str) -> Result<(), StorageError> {
        self.update_provider(provider_id, |provider| provider.is_active = false)
    }

    fn upsert_account(&self, account: &Account) -> Result<(), StorageError> {
        self.state().accounts.insert(
            (account.provider_id.clone(), account.account_id.clone()),
            account.clone(),
        );
        Ok(())
    }

    fn get_account(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<Account>, StorageError> {
        Ok(self
            .state()
            .accounts
            .get(&(provider_id.to_owned(), account_id.to_owned()))
            .cloned())
    }

    fn accounts_for_provider(&self, provider_id: &str) -> Result<Vec<Account>, StorageError> {
        Ok(self
            .state()
            .accounts
            .values()
            .filter(|account| account.provider_id == provider_id)
            .cloned()
            .collect())
    }

    fn active_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let state = self.state();
        Ok(state
            .accounts
            .values()
            .filter(|account| account.is_active())
            .filter(|account| {
                state
                    .providers
                    .get(&account.provider_id)
                    .is_some_and(|provider| provider.is_active)
            })
            .cloned()
            .collect())
    }

    fn insert_transaction_if_absent(
        &self,
        transaction: &Transaction,
    ) -> Result<bool, StorageError> {
        let key = (
            transaction.provider_id.clone(),
            transaction.transaction_id.clone(),
        );
        let mut state = self.state();
        if state.transactions.contains_key(&key) {
            return Ok(false);
        }
        state.transactions.insert(key, transaction.clone());
        Ok(true)
    }

    fn transactions_between(
        &self,
        from: UtcDateTime,
        to: UtcDateTime,
    ) -> Result<Vec<Transaction>, StorageError> {
        let mut transactions: Vec<Transaction> = self
            .state()
            .transactions
            .values()
            .filter(|transaction| transaction.booked_at >= from && transaction.booked_at <= to)
            .cloned()
            .collect();
        transactions.sort_by_key(|transaction| transaction.booked_at);
        Ok(transactions)
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        let mut transactions: Vec<Transaction> =
            self.state().transactions.values().cloned().collect();
        transactions.sort_by_key(|transaction| transaction.booked_at);
        Ok(transactions)
    }

    fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StorageError> {
        let mut transactions = self.all_transactions()?;
        transactions.reverse();
        transactions.truncate(limit);
        Ok(transactions)
    }

    fn save_budget(&self, budget: &Budget) -> Result<(), StorageError> {
        self.state()
            .budgets
            .insert(budget.budget_id.clone(), budget.clone());
        Ok(())
    }

    fn budgets(&self) -> Result<Vec<Budget>, StorageError> {
        Ok(self.state().budgets.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{TransactionStatus, TransactionType};

    fn transaction(id: &str, day: &str) -> Transaction {
        Transaction::new(
            id,
            "acc-1",
            "bank-a",
            Decimal::from(100),
            "RUB",
            UtcDateTime::parse(day).expect("date"),
            TransactionType::Expense,
            TransactionStatus::Completed,
        )
    }

    #[test]
    fn duplicate_transaction_is_not_inserted() {
        let repository = InMemoryRepository::new();

        assert!(repository
            .insert_transaction_if_absent(&transaction("t1", "2024-01-06"))
            .expect("insert"));
        assert!(!repository
            .insert_transaction_if_absent(&transaction("t1", "2024-01-06"))
            .expect("insert"));
        assert_eq!(repository.all_transactions().expect("all").len(), 1);
    }

    #[test]
    fn recent_transactions_are_newest_first() {
        let repository = InMemoryRepository::new();
        for (id, day) in [("a", "2024-01-01"), ("b", "2024-03-01"), ("c", "2024-02-01")] {
            repository
                .insert_transaction_if_absent(&transaction(id, day))
                .expect("insert");
        }

        let recent = repository.recent_transactions(2).expect("recent");
        let ids: Vec<_> = recent.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn consent_on_unknown_provider_is_not_found() {
        let repository = InMemoryRepository::new();
        let error = repository
            .set_consent("missing", Some("c-1"))
            .expect_err("unknown provider");
        assert!(matches!(error, StorageError::NotFound { .. }));
    }
}
