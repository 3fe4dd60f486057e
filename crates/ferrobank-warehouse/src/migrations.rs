//! Versioned schema migrations.

use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_providers_accounts",
        sql: r#"
CREATE TABLE IF NOT EXISTS providers (
    provider_id VARCHAR PRIMARY KEY,
    name VARCHAR NOT NULL,
    base_url VARCHAR NOT NULL,
    client_id VARCHAR NOT NULL,
    consent_id VARCHAR,
    requesting_party_id VARCHAR,
    connected_at VARCHAR NOT NULL,
    is_active BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    provider_id VARCHAR NOT NULL,
    account_id VARCHAR NOT NULL,
    account_number VARCHAR NOT NULL,
    account_type VARCHAR NOT NULL,
    currency VARCHAR NOT NULL,
    balance VARCHAR NOT NULL,
    available_balance VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    name VARCHAR,
    opened_date VARCHAR,
    last_synced_at VARCHAR,
    PRIMARY KEY (provider_id, account_id)
);
"#,
    },
    Migration {
        version: "0002_transactions",
        sql: r#"
CREATE TABLE IF NOT EXISTS transactions (
    provider_id VARCHAR NOT NULL,
    transaction_id VARCHAR NOT NULL,
    account_id VARCHAR NOT NULL,
    amount VARCHAR NOT NULL,
    currency VARCHAR NOT NULL,
    booked_at VARCHAR NOT NULL,
    booked_at_epoch BIGINT NOT NULL,
    description VARCHAR,
    merchant_name VARCHAR,
    category VARCHAR,
    transaction_type VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    PRIMARY KEY (provider_id, transaction_id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_booked_at ON transactions (booked_at_epoch);
"#,
    },
    Migration {
        version: "0003_budgets",
        sql: r#"
CREATE TABLE IF NOT EXISTS budgets (
    budget_id VARCHAR PRIMARY KEY,
    name VARCHAR NOT NULL,
    period VARCHAR NOT NULL,
    period_start VARCHAR NOT NULL,
    period_end VARCHAR NOT NULL,
    total_limit VARCHAR NOT NULL,
    categories VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL
);
"#,
    },
    Migration {
        version: "0004_provider_last_sync",
        sql: r#"
ALTER TABLE providers ADD COLUMN IF NOT EXISTS last_synced_at VARCHAR;
"#,
    },
];

pub(crate) fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version VARCHAR PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
            tracing::debug!(version = migration.version, "applied warehouse migration");
        }
    }

    Ok(())
}
