use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

labelled_enum! {
    TransactionType, "transaction type" {
        Income => "income",
        Expense => "expense",
        Transfer => "transfer",
    }
}

labelled_enum! {
    TransactionStatus, "transaction status" {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

labelled_enum! {
    TransactionCategory, "transaction category" {
        Salary => "salary",
        Bonus => "bonus",
        Investment => "investment",
        Gift => "gift",
        OtherIncome => "other_income",
        Food => "food",
        Transport => "transport",
        Utilities => "utilities",
        Shopping => "shopping",
        Entertainment => "entertainment",
        Health => "health",
        Education => "education",
        Bills => "bills",
        Subscriptions => "subscriptions",
        OtherExpense => "other_expense",
    }
}

impl TransactionCategory {
    pub const fn is_income(self) -> bool {
        matches!(
            self,
            Self::Salary | Self::Bonus | Self::Investment | Self::Gift | Self::OtherIncome
        )
    }
}

/// Provider-scoped transaction. The sign of `amount` always agrees with
/// `transaction_type`: income is non-negative, expense is non-positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    pub provider_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub booked_at: UtcDateTime,
    pub description: Option<String>,
    pub merchant_name: Option<String>,
    pub category: Option<TransactionCategory>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
}

impl Transaction {
    /// Builds a transaction, normalizing the amount sign to the type.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: impl Into<String>,
        account_id: impl Into<String>,
        provider_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        booked_at: UtcDateTime,
        transaction_type: TransactionType,
        status: TransactionStatus,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            account_id: account_id.into(),
            provider_id: provider_id.into(),
            amount: signed_amount(amount, transaction_type),
            currency: currency.into(),
            booked_at,
            description: None,
            merchant_name: None,
            category: None,
            transaction_type,
            status,
        }
    }

    pub fn with_category(mut self, category: TransactionCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant_name = Some(merchant.into());
        self
    }

    pub fn is_income(&self) -> bool {
        self.transaction_type == TransactionType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Unsigned amount, used by every aggregation.
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }
}

pub(crate) fn signed_amount(amount: Decimal, transaction_type: TransactionType) -> Decimal {
    match transaction_type {
        TransactionType::Income => amount.abs(),
        TransactionType::Expense => -amount.abs(),
        TransactionType::Transfer => amount,
    }
}
