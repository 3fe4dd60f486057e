use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

labelled_enum! {
    AccountType, "account type" {
        Current => "current",
        Savings => "savings",
        Deposit => "deposit",
        Credit => "credit",
        Investment => "investment",
    }
}

labelled_enum! {
    AccountStatus, "account status" {
        Active => "active",
        Blocked => "blocked",
        Closed => "closed",
        Pending => "pending",
    }
}

labelled_enum! {
    CardType, "card type" {
        Debit => "debit",
        Credit => "credit",
        Prepaid => "prepaid",
    }
}

labelled_enum! {
    CardStatus, "card status" {
        Active => "active",
        Blocked => "blocked",
        Expired => "expired",
        Pending => "pending",
    }
}

/// Provider-scoped account. Identity is `(account_id, provider_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub provider_id: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub currency: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub status: AccountStatus,
    pub name: Option<String>,
    pub opened_date: Option<UtcDateTime>,
    pub last_synced_at: Option<UtcDateTime>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.account_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub currency: String,
    pub last_updated: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: String,
    pub account_id: String,
    pub provider_id: String,
    /// Masked to the last four digits.
    pub card_number: String,
    pub card_type: CardType,
    pub expiration_date: Option<String>,
    pub holder_name: Option<String>,
    pub status: CardStatus,
}

pub(crate) fn mask_card_number(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= 4 {
        return number.to_owned();
    }
    let last_four: String = digits[digits.len() - 4..].iter().collect();
    format!("**** {last_four}")
}
