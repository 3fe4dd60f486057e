//! Provider payloads and their normalization into canonical entities.
//!
//! Both adapter variants share these shapes; only routes and request
//! decoration differ between them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{deserialize_amount, deserialize_optional_amount, mask_card_number};
use crate::{
    validate_currency_code, Account, AccountStatus, AccountType, ApiError, Balance, Card,
    CardStatus, CardType, Transaction, TransactionCategory, TransactionStatus, TransactionType,
    UtcDateTime,
};

#[derive(Debug, Deserialize)]
pub(crate) struct AccountsEnvelope {
    pub(crate) accounts: Vec<AccountPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionsEnvelope {
    pub(crate) transactions: Vec<TransactionPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountPayload {
    id: String,
    account_number: String,
    account_type: AccountType,
    currency: String,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    balance: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    available_balance: Option<Decimal>,
    status: AccountStatus,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    opened_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BalancePayload {
    account_id: String,
    #[serde(deserialize_with = "deserialize_amount")]
    balance: Decimal,
    #[serde(deserialize_with = "deserialize_amount")]
    available_balance: Decimal,
    currency: String,
    last_updated: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionPayload {
    id: String,
    #[serde(default)]
    account_id: Option<String>,
    #[serde(deserialize_with = "deserialize_amount")]
    amount: Decimal,
    currency: String,
    transaction_date: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    merchant_name: Option<String>,
    #[serde(rename = "type")]
    transaction_type: TransactionType,
    status: TransactionStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CardPayload {
    id: String,
    account_id: String,
    card_number: String,
    card_type: CardType,
    #[serde(default)]
    expiration_date: Option<String>,
    #[serde(default)]
    holder_name: Option<String>,
    status: CardStatus,
}

/// Public provider profile served by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProviderInfo {
    pub bank_name: String,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub products: Vec<ProviderProduct>,
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProduct {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub(crate) fn normalize_account(
    payload: AccountPayload,
    provider_id: &str,
    synced_at: UtcDateTime,
) -> Result<Account, ApiError> {
    let currency = normalize_currency(&payload.currency)?;
    let balance = payload.balance.unwrap_or(Decimal::ZERO);
    Ok(Account {
        account_id: payload.id,
        provider_id: provider_id.to_owned(),
        account_number: payload.account_number,
        account_type: payload.account_type,
        currency,
        balance,
        available_balance: payload.available_balance.unwrap_or(balance),
        status: payload.status,
        name: payload.name.filter(|name| !name.trim().is_empty()),
        opened_date: lenient_timestamp(payload.opened_date),
        last_synced_at: Some(synced_at),
    })
}

pub(crate) fn normalize_balance(payload: BalancePayload) -> Result<Balance, ApiError> {
    Ok(Balance {
        currency: normalize_currency(&payload.currency)?,
        last_updated: strict_timestamp("last_updated", &payload.last_updated)?,
        account_id: payload.account_id,
        balance: payload.balance,
        available_balance: payload.available_balance,
    })
}

/// Builds the canonical transaction. The amount sign follows the payload's
/// type regardless of the sign the provider sent.
pub(crate) fn normalize_transaction(
    payload: TransactionPayload,
    account_id: &str,
    provider_id: &str,
) -> Result<Transaction, ApiError> {
    let booked_at = strict_timestamp("transaction_date", &payload.transaction_date)?;
    let currency = normalize_currency(&payload.currency)?;
    let account_id = payload
        .account_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| account_id.to_owned());

    let mut transaction = Transaction::new(
        payload.id,
        account_id,
        provider_id,
        payload.amount,
        currency,
        booked_at,
        payload.transaction_type,
        payload.status,
    );
    transaction.description = payload.description.filter(|text| !text.trim().is_empty());
    transaction.merchant_name = payload.merchant_name.filter(|text| !text.trim().is_empty());
    transaction.category = payload
        .category
        .and_then(|label| label.parse::<TransactionCategory>().ok());
    Ok(transaction)
}

pub(crate) fn normalize_card(payload: CardPayload, provider_id: &str) -> Card {
    Card {
        card_id: payload.id,
        account_id: payload.account_id,
        provider_id: provider_id.to_owned(),
        card_number: mask_card_number(&payload.card_number),
        card_type: payload.card_type,
        expiration_date: payload.expiration_date,
        holder_name: payload.holder_name,
        status: payload.status,
    }
}

fn normalize_currency(value: &str) -> Result<String, ApiError> {
    let currency = value.trim().to_ascii_uppercase();
    validate_currency_code(&currency).map_err(|error| ApiError::decoding(error.to_string()))?;
    Ok(currency)
}

fn strict_timestamp(field: &str, value: &str) -> Result<UtcDateTime, ApiError> {
    UtcDateTime::parse(value)
        .map_err(|error| ApiError::decoding(format!("field '{field}': {error}")))
}

fn lenient_timestamp(value: Option<String>) -> Option<UtcDateTime> {
    value.and_then(|value| UtcDateTime::parse(&value).ok())
}
