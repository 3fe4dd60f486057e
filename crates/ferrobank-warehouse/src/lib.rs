//! # Ferrobank Warehouse
//!
//! `DuckDB`-backed implementation of [`ferrobank_core::Repository`].
//!
//! ## Overview
//!
//! Connected providers, accounts, transactions and budgets are persisted in a
//! single database file under the ferrobank home directory. Every write runs
//! inside its own transaction and rolls back on failure.
//!
//! | Table | Key |
//! |-------|-----|
//! | `providers` | `provider_id` |
//! | `accounts` | `(provider_id, account_id)` |
//! | `transactions` | `(provider_id, transaction_id)` |
//! | `budgets` | `budget_id` |
//!
//! Monetary values are stored as decimal text and timestamps as RFC 3339
//! text so nothing is lost to floating point or time zone conversion.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrobank_core::Repository;
//! use ferrobank_warehouse::Warehouse;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     for transaction in warehouse.recent_transactions(10)? {
//!         println!("{} {}", transaction.transaction_id, transaction.amount);
//!     }
//!     Ok(())
//! }
//! ```

mod duckdb;
mod error;
mod migrations;

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ::duckdb::{params, Connection, Row};
use ferrobank_core::{
    Account, AccountStatus, Budget, BudgetCategory, ConnectedProvider, Repository, StorageError,
    Transaction, UtcDateTime,
};
use rust_decimal::Decimal;

pub use crate::duckdb::DuckDbConnectionManager;
pub use crate::error::WarehouseError;

/// Environment variable overriding the ferrobank home directory.
pub const HOME_ENV: &str = "FERROBANK_HOME";

const DB_FILE_NAME: &str = "ferrobank.duckdb";

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for ferrobank data.
    pub ferrobank_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_home())
    }
}

impl WarehouseConfig {
    pub fn in_home(ferrobank_home: impl Into<PathBuf>) -> Self {
        let ferrobank_home = ferrobank_home.into();
        let db_path = ferrobank_home.join(DB_FILE_NAME);
        Self {
            ferrobank_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Durable store for the sync engine.
#[derive(Debug, Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        self.manager.with_connection(|connection| {
            migrations::apply_migrations(connection).map_err(WarehouseError::from)
        })
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn home(&self) -> &Path {
        self.config.ferrobank_home.as_path()
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, WarehouseError>,
    ) -> Result<T, StorageError> {
        self.manager.with_connection(f).map_err(StorageError::from)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, WarehouseError>,
    ) -> Result<T, StorageError> {
        self.manager
            .with_connection(|connection| {
                connection.execute_batch("BEGIN TRANSACTION")?;
                let result = f(connection);
                finalize_transaction(connection, result)
            })
            .map_err(StorageError::from)
    }

    fn update_provider(
        &self,
        provider_id: &str,
        sql: &str,
        value: &dyn ::duckdb::ToSql,
    ) -> Result<(), StorageError> {
        self.write(|connection| {
            let changed = connection.execute(sql, params![value, provider_id])?;
            if changed == 0 {
                return Err(WarehouseError::RecordNotFound {
                    entity: "provider",
                    id: provider_id.to_owned(),
                });
            }
            Ok(())
        })
    }
}

const PROVIDER_COLUMNS: &str = "provider_id, name, base_url, client_id, consent_id, \
     requesting_party_id, connected_at, is_active, last_synced_at";

const ACCOUNT_COLUMNS: &str = "a.account_id, a.provider_id, a.account_number, a.account_type, \
     a.currency, a.balance, a.available_balance, a.status, a.name, a.opened_date, a.last_synced_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, account_id, provider_id, amount, currency, \
     booked_at, description, merchant_name, category, transaction_type, status";

const BUDGET_COLUMNS: &str =
    "budget_id, name, period, period_start, period_end, total_limit, categories, created_at";

impl Repository for Warehouse {
    fn upsert_provider(&self, provider: &ConnectedProvider) -> Result<(), StorageError> {
        self.write(|connection| {
            connection.execute(
                "INSERT OR REPLACE INTO providers \
                 (provider_id, name, base_url, client_id, consent_id, requesting_party_id, \
                  connected_at, is_active, last_synced_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    provider.provider_id,
                    provider.name,
                    provider.base_url,
                    provider.client_id,
                    provider.consent_id,
                    provider.requesting_party_id,
                    provider.connected_at.format_rfc3339(),
                    provider.is_active,
                    provider.last_synced_at.map(UtcDateTime::format_rfc3339),
                ],
            )?;
            Ok(())
        })
    }

    fn get_provider(&self, provider_id: &str) -> Result<Option<ConnectedProvider>, StorageError> {
        self.read(|connection| {
            let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE provider_id = ?");
            let rows = query_rows(connection, &sql, params![provider_id], ProviderRow::read)?;
            rows.into_iter().next().map(ProviderRow::into_domain).transpose()
        })
    }

    fn active_providers(&self) -> Result<Vec<ConnectedProvider>, StorageError> {
        self.read(|connection| {
            let sql = format!(
                "SELECT {PROVIDER_COLUMNS} FROM providers WHERE is_active ORDER BY provider_id"
            );
            query_rows(connection, &sql, [], ProviderRow::read)?
                .into_iter()
                .map(ProviderRow::into_domain)
                .collect()
        })
    }

    fn set_consent(&self, provider_id: &str, consent_id: Option<&str>) -> Result<(), StorageError> {
        self.update_provider(
            provider_id,
            "UPDATE providers SET consent_id = ? WHERE provider_id = ?",
            &consent_id,
        )
    }

    fn set_last_synced(
        &self,
        provider_id: &str,
        synced_at: Option<UtcDateTime>,
    ) -> Result<(), StorageError> {
        self.update_provider(
            provider_id,
            "UPDATE providers SET last_synced_at = ? WHERE provider_id = ?",
            &synced_at.map(UtcDateTime::format_rfc3339),
        )
    }

    fn deactivate_provider(&self, provider_id: &str) -> Result<(), StorageError> {
        self.update_provider(
            provider_id,
            "UPDATE providers SET is_active = ? WHERE provider_id = ?",
            &false,
        )
    }

    fn upsert_account(&self, account: &Account) -> Result<(), StorageError> {
        self.write(|connection| {
            connection.execute(
                "INSERT OR REPLACE INTO accounts \
                 (provider_id, account_id, account_number, account_type, currency, balance, \
                  available_balance, status, name, opened_date, last_synced_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    account.provider_id,
                    account.account_id,
                    account.account_number,
                    account.account_type.as_str(),
                    account.currency,
                    account.balance.to_string(),
                    account.available_balance.to_string(),
                    account.status.as_str(),
                    account.name,
                    account.opened_date.map(UtcDateTime::format_rfc3339),
                    account.last_synced_at.map(UtcDateTime::format_rfc3339),
                ],
            )?;
            Ok(())
        })
    }

    fn get_account(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<Account>, StorageError> {
        self.read(|connection| {
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts a \
                 WHERE a.provider_id = ? AND a.account_id = ?"
            );
            let rows = query_rows(
                connection,
                &sql,
                params![provider_id, account_id],
                AccountRow::read,
            )?;
            rows.into_iter().next().map(AccountRow::into_domain).transpose()
        })
    }

    fn accounts_for_provider(&self, provider_id: &str) -> Result<Vec<Account>, StorageError> {
        self.read(|connection| {
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts a \
                 WHERE a.provider_id = ? ORDER BY a.account_id"
            );
            query_rows(connection, &sql, params![provider_id], AccountRow::read)?
                .into_iter()
                .map(AccountRow::into_domain)
                .collect()
        })
    }

    fn active_accounts(&self) -> Result<Vec<Account>, StorageError> {
        self.read(|connection| {
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts a \
                 JOIN providers p ON p.provider_id = a.provider_id \
                 WHERE a.status = ? AND p.is_active \
                 ORDER BY a.provider_id, a.account_id"
            );
            query_rows(
                connection,
                &sql,
                params![AccountStatus::Active.as_str()],
                AccountRow::read,
            )?
            .into_iter()
            .map(AccountRow::into_domain)
            .collect()
        })
    }

    fn insert_transaction_if_absent(
        &self,
        transaction: &Transaction,
    ) -> Result<bool, StorageError> {
        self.write(|connection| {
            let existing: i64 = connection.query_row(
                "SELECT COUNT(*) FROM transactions WHERE provider_id = ? AND transaction_id = ?",
                params![transaction.provider_id, transaction.transaction_id],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Ok(false);
            }

            connection.execute(
                "INSERT INTO transactions \
                 (provider_id, transaction_id, account_id, amount, currency, booked_at, \
                  booked_at_epoch, description, merchant_name, category, transaction_type, status) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    transaction.provider_id,
                    transaction.transaction_id,
                    transaction.account_id,
                    transaction.amount.to_string(),
                    transaction.currency,
                    transaction.booked_at.format_rfc3339(),
                    transaction.booked_at.unix_timestamp(),
                    transaction.description,
                    transaction.merchant_name,
                    transaction.category.map(|category| category.as_str()),
                    transaction.transaction_type.as_str(),
                    transaction.status.as_str(),
                ],
            )?;
            Ok(true)
        })
    }

    fn transactions_between(
        &self,
        from: UtcDateTime,
        to: UtcDateTime,
    ) -> Result<Vec<Transaction>, StorageError> {
        let transactions = self.read(|connection| {
            let sql = format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions \
                 WHERE booked_at_epoch BETWEEN ? AND ? \
                 ORDER BY booked_at_epoch, provider_id, transaction_id"
            );
            query_rows(
                connection,
                &sql,
                params![from.unix_timestamp(), to.unix_timestamp()],
                TransactionRow::read,
            )?
            .into_iter()
            .map(TransactionRow::into_domain)
            .collect::<Result<Vec<_>, _>>()
        })?;

        // Epoch filtering is second-granular; trim sub-second edges exactly.
        Ok(transactions
            .into_iter()
            .filter(|transaction| transaction.booked_at >= from && transaction.booked_at <= to)
            .collect())
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        self.read(|connection| {
            let sql = format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions \
                 ORDER BY booked_at_epoch, provider_id, transaction_id"
            );
            query_rows(connection, &sql, [], TransactionRow::read)?
                .into_iter()
                .map(TransactionRow::into_domain)
                .collect()
        })
    }

    fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.read(|connection| {
            let sql = format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions \
                 ORDER BY booked_at_epoch DESC, provider_id, transaction_id LIMIT ?"
            );
            query_rows(connection, &sql, params![limit], TransactionRow::read)?
                .into_iter()
                .map(TransactionRow::into_domain)
                .collect()
        })
    }

    fn save_budget(&self, budget: &Budget) -> Result<(), StorageError> {
        self.write(|connection| {
            let categories = serde_json::to_string(&budget.categories)?;
            connection.execute(
                "INSERT OR REPLACE INTO budgets \
                 (budget_id, name, period, period_start, period_end, total_limit, categories, \
                  created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    budget.budget_id,
                    budget.name,
                    budget.period.as_str(),
                    budget.start.format_rfc3339(),
                    budget.end.format_rfc3339(),
                    budget.total_limit.to_string(),
                    categories,
                    budget.created_at.format_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn budgets(&self) -> Result<Vec<Budget>, StorageError> {
        self.read(|connection| {
            let sql = format!("SELECT {BUDGET_COLUMNS} FROM budgets ORDER BY created_at, budget_id");
            query_rows(connection, &sql, [], BudgetRow::read)?
                .into_iter()
                .map(BudgetRow::into_domain)
                .collect()
        })
    }
}

struct ProviderRow {
    provider_id: String,
    name: String,
    base_url: String,
    client_id: String,
    consent_id: Option<String>,
    requesting_party_id: Option<String>,
    connected_at: String,
    is_active: bool,
    last_synced_at: Option<String>,
}

impl ProviderRow {
    fn read(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            provider_id: row.get(0)?,
            name: row.get(1)?,
            base_url: row.get(2)?,
            client_id: row.get(3)?,
            consent_id: row.get(4)?,
            requesting_party_id: row.get(5)?,
            connected_at: row.get(6)?,
            is_active: row.get(7)?,
            last_synced_at: row.get(8)?,
        })
    }

    fn into_domain(self) -> Result<ConnectedProvider, WarehouseError> {
        Ok(ConnectedProvider {
            provider_id: self.provider_id,
            name: self.name,
            base_url: self.base_url,
            client_id: self.client_id,
            consent_id: self.consent_id,
            requesting_party_id: self.requesting_party_id,
            connected_at: parse_timestamp("connected_at", &self.connected_at)?,
            is_active: self.is_active,
            last_synced_at: parse_optional_timestamp("last_synced_at", self.last_synced_at)?,
        })
    }
}

struct AccountRow {
    account_id: String,
    provider_id: String,
    account_number: String,
    account_type: String,
    currency: String,
    balance: String,
    available_balance: String,
    status: String,
    name: Option<String>,
    opened_date: Option<String>,
    last_synced_at: Option<String>,
}

impl AccountRow {
    fn read(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            account_id: row.get(0)?,
            provider_id: row.get(1)?,
            account_number: row.get(2)?,
            account_type: row.get(3)?,
            currency: row.get(4)?,
            balance: row.get(5)?,
            available_balance: row.get(6)?,
            status: row.get(7)?,
            name: row.get(8)?,
            opened_date: row.get(9)?,
            last_synced_at: row.get(10)?,
        })
    }

    fn into_domain(self) -> Result<Account, WarehouseError> {
        Ok(Account {
            account_id: self.account_id,
            provider_id: self.provider_id,
            account_number: self.account_number,
            account_type: parse_label("account_type", &self.account_type)?,
            currency: self.currency,
            balance: parse_decimal("balance", &self.balance)?,
            available_balance: parse_decimal("available_balance", &self.available_balance)?,
            status: parse_label("status", &self.status)?,
            name: self.name,
            opened_date: parse_optional_timestamp("opened_date", self.opened_date)?,
            last_synced_at: parse_optional_timestamp("last_synced_at", self.last_synced_at)?,
        })
    }
}

struct TransactionRow {
    transaction_id: String,
    account_id: String,
    provider_id: String,
    amount: String,
    currency: String,
    booked_at: String,
    description: Option<String>,
    merchant_name: Option<String>,
    category: Option<String>,
    transaction_type: String,
    status: String,
}

impl TransactionRow {
    fn read(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            transaction_id: row.get(0)?,
            account_id: row.get(1)?,
            provider_id: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            booked_at: row.get(5)?,
            description: row.get(6)?,
            merchant_name: row.get(7)?,
            category: row.get(8)?,
            transaction_type: row.get(9)?,
            status: row.get(10)?,
        })
    }

    fn into_domain(self) -> Result<Transaction, WarehouseError> {
        Ok(Transaction {
            transaction_id: self.transaction_id,
            account_id: self.account_id,
            provider_id: self.provider_id,
            amount: parse_decimal("amount", &self.amount)?,
            currency: self.currency,
            booked_at: parse_timestamp("booked_at", &self.booked_at)?,
            description: self.description,
            merchant_name: self.merchant_name,
            category: self
                .category
                .as_deref()
                .map(|value| parse_label("category", value))
                .transpose()?,
            transaction_type: parse_label("transaction_type", &self.transaction_type)?,
            status: parse_label("status", &self.status)?,
        })
    }
}

struct BudgetRow {
    budget_id: String,
    name: String,
    period: String,
    start: String,
    end: String,
    total_limit: String,
    categories: String,
    created_at: String,
}

impl BudgetRow {
    fn read(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            budget_id: row.get(0)?,
            name: row.get(1)?,
            period: row.get(2)?,
            start: row.get(3)?,
            end: row.get(4)?,
            total_limit: row.get(5)?,
            categories: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_domain(self) -> Result<Budget, WarehouseError> {
        let categories: Vec<BudgetCategory> = serde_json::from_str(&self.categories)?;
        Ok(Budget {
            budget_id: self.budget_id,
            name: self.name,
            period: parse_label("period", &self.period)?,
            start: parse_timestamp("period_start", &self.start)?,
            end: parse_timestamp("period_end", &self.end)?,
            total_limit: parse_decimal("total_limit", &self.total_limit)?,
            categories,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

fn query_rows<T, P>(
    connection: &Connection,
    sql: &str,
    params: P,
    read: fn(&Row<'_>) -> Result<T, ::duckdb::Error>,
) -> Result<Vec<T>, WarehouseError>
where
    P: ::duckdb::Params,
{
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map(params, read)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal, WarehouseError> {
    Decimal::from_str(value).map_err(|error| WarehouseError::invalid(field, error))
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<UtcDateTime, WarehouseError> {
    UtcDateTime::parse(value).map_err(|error| WarehouseError::invalid(field, error))
}

fn parse_optional_timestamp(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<UtcDateTime>, WarehouseError> {
    value
        .as_deref()
        .map(|value| parse_timestamp(field, value))
        .transpose()
}

fn parse_label<T>(field: &'static str, value: &str) -> Result<T, WarehouseError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|error: T::Err| WarehouseError::invalid(field, error))
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = connection.execute_batch("ROLLBACK") {
                tracing::warn!(error = %rollback, "warehouse rollback failed");
            }
            Err(error)
        }
    }
}

/// `FERROBANK_HOME`, then `$HOME/.ferrobank`, then `.ferrobank`.
pub fn resolve_home() -> PathBuf {
    if let Some(path) = env::var_os(HOME_ENV) {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".ferrobank");
    }

    PathBuf::from(".ferrobank")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrobank_core::{
        AccountType, BudgetPeriod, TransactionCategory, TransactionStatus, TransactionType,
    };
    use tempfile::{tempdir, TempDir};

    fn open(temp: &TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig {
            max_pool_size: 2,
            ..WarehouseConfig::in_home(temp.path().join("home"))
        })
        .expect("warehouse open")
    }

    fn at(value: &str) -> UtcDateTime {
        UtcDateTime::parse(value).expect("timestamp")
    }

    fn provider(id: &str) -> ConnectedProvider {
        ConnectedProvider {
            provider_id: id.to_owned(),
            name: format!("{id} bank"),
            base_url: format!("https://{id}.test"),
            client_id: "team-1".to_owned(),
            consent_id: None,
            requesting_party_id: Some("team-1".to_owned()),
            connected_at: at("2024-03-01T09:00:00Z"),
            is_active: true,
            last_synced_at: None,
        }
    }

    #[test]
    fn provider_round_trips_and_consent_updates() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);

        warehouse.upsert_provider(&provider("vbank")).expect("upsert");
        warehouse
            .set_consent("vbank", Some("consent-7"))
            .expect("set consent");

        let stored = warehouse
            .get_provider("vbank")
            .expect("read")
            .expect("provider present");
        assert_eq!(stored.consent_id.as_deref(), Some("consent-7"));
        assert_eq!(stored.connected_at, at("2024-03-01T09:00:00Z"));
        assert!(stored.is_active);
    }

    #[test]
    fn last_sync_time_survives_reopening_the_warehouse() {
        // Given a provider synced in an earlier session
        let temp = tempdir().expect("tempdir");
        {
            let warehouse = open(&temp);
            warehouse.upsert_provider(&provider("vbank")).expect("upsert");
            warehouse
                .set_last_synced("vbank", Some(at("2024-03-02T10:00:00Z")))
                .expect("mark synced");
        }

        // When the warehouse is opened again
        let reopened = open(&temp);
        let stored = reopened.get_provider("vbank").expect("read").expect("present");

        // Then the sync time is still there and can be cleared
        assert_eq!(stored.last_synced_at, Some(at("2024-03-02T10:00:00Z")));
        reopened.set_last_synced("vbank", None).expect("clear");
        let cleared = reopened.get_provider("vbank").expect("read").expect("present");
        assert_eq!(cleared.last_synced_at, None);
    }

    #[test]
    fn updating_unknown_provider_is_not_found() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);

        let error = warehouse
            .deactivate_provider("ghost")
            .expect_err("unknown provider");

        assert!(matches!(error, StorageError::NotFound { entity: "provider", .. }));
    }

    #[test]
    fn account_decimals_survive_storage() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);
        let account = Account {
            account_id: "acc-1".to_owned(),
            provider_id: "vbank".to_owned(),
            account_number: "40817810000000000001".to_owned(),
            account_type: AccountType::Savings,
            currency: "RUB".to_owned(),
            balance: Decimal::new(1234567, 2),
            available_balance: Decimal::new(100001, 3),
            status: AccountStatus::Active,
            name: None,
            opened_date: Some(at("2020-01-15")),
            last_synced_at: None,
        };

        warehouse.upsert_account(&account).expect("upsert");

        let stored = warehouse
            .get_account("vbank", "acc-1")
            .expect("read")
            .expect("account present");
        assert_eq!(stored, account);
    }

    #[test]
    fn duplicate_transaction_is_not_rewritten() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);
        let original = Transaction::new(
            "tx-1",
            "acc-1",
            "vbank",
            Decimal::new(1500, 0),
            "RUB",
            at("2024-03-02T12:30:00Z"),
            TransactionType::Expense,
            TransactionStatus::Completed,
        )
        .with_category(TransactionCategory::Food);
        let replay = original.clone().with_description("changed upstream");

        assert!(warehouse.insert_transaction_if_absent(&original).expect("insert"));
        assert!(!warehouse.insert_transaction_if_absent(&replay).expect("replay"));

        let stored = warehouse.all_transactions().expect("read");
        assert_eq!(stored, vec![original]);
    }

    #[test]
    fn budget_categories_persist_across_reopen() {
        let temp = tempdir().expect("tempdir");
        let budget = Budget::new(
            "March",
            Decimal::new(50000, 0),
            BudgetPeriod::Monthly,
            at("2024-03-10T00:00:00Z"),
        )
        .with_category(TransactionCategory::Food, Decimal::new(15000, 0));

        {
            let warehouse = open(&temp);
            warehouse.save_budget(&budget).expect("save");
        }

        let reopened = open(&temp);
        assert_eq!(reopened.budgets().expect("budgets"), vec![budget]);
    }
}
