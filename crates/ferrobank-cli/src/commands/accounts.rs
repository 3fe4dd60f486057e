use serde::Serialize;

use ferrobank_core::{validate_currency_code, Account, Transaction};
use rust_decimal::Decimal;

use crate::cli::{BalanceArgs, TransactionsArgs};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::CommandResult;

#[derive(Debug, Serialize)]
struct AccountsResponseData {
    accounts: Vec<Account>,
}

#[derive(Debug, Serialize)]
struct BalanceResponseData {
    currency: String,
    balance: Decimal,
    available_balance: Decimal,
}

#[derive(Debug, Serialize)]
struct TransactionsResponseData {
    transactions: Vec<Transaction>,
}

pub fn list(context: &AppContext) -> Result<CommandResult, CliError> {
    let accounts = context.repository().active_accounts()?;
    CommandResult::ok(AccountsResponseData { accounts })
}

pub fn balance(args: &BalanceArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let currency = args
        .currency
        .clone()
        .unwrap_or_else(|| context.config.sync.default_currency.clone())
        .to_ascii_uppercase();
    validate_currency_code(&currency)?;

    let orchestrator = &context.orchestrator;
    CommandResult::ok(BalanceResponseData {
        balance: orchestrator.total_balance(&currency)?,
        available_balance: orchestrator.total_available_balance(&currency)?,
        currency,
    })
}

pub fn transactions(args: &TransactionsArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let transactions = context.repository().recent_transactions(args.limit)?;
    CommandResult::ok(TransactionsResponseData { transactions })
}
