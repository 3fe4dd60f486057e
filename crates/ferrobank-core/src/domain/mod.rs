//! # Domain Models
//!
//! Canonical entities the sync engine normalizes provider payloads into.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ProviderDescriptor`] | Configured provider: base URL, OAuth config, variant |
//! | [`ConnectedProvider`] | Durable aggregate root for a connected provider |
//! | [`TokenRecord`] | Access/refresh tokens with expiry tracking |
//! | [`Account`] | Provider-scoped account, upserted by `(account_id, provider_id)` |
//! | [`Transaction`] | Provider-scoped transaction, inserted at most once |
//! | [`Consent`] | Result of a consent negotiation |
//! | [`Budget`] | Spending limits per category over a period |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Monetary values are [`rust_decimal::Decimal`] end to end.

/// Declares a fieldless enum with a stable snake_case label used on the wire,
/// in storage and in CLI output.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::ValidationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_lowercase();
                $(if normalized == $label {
                    return Ok($name::$variant);
                })+
                Err($crate::ValidationError::UnknownVariant {
                    field: $field,
                    value: value.to_owned(),
                })
            }
        }
    };
}

mod account;
mod budget;
mod consent;
mod money;
mod provider;
mod timestamp;
mod token;
mod transaction;

pub(crate) use account::mask_card_number;
pub use account::{Account, AccountStatus, AccountType, Balance, Card, CardStatus, CardType};
pub use budget::{Budget, BudgetCategory, BudgetPeriod};
pub use consent::{Consent, ConsentDetails, ConsentStatus, CONSENT_PERMISSIONS};
pub use money::{parse_amount, validate_currency_code};
pub(crate) use money::{deserialize_amount, deserialize_optional_amount};
pub use provider::{
    ConnectedProvider, OAuthConfig, ProviderDescriptor, ProviderVariant, DEFAULT_REDIRECT_URI,
    DEFAULT_SCOPES,
};
pub(crate) use timestamp::first_of_month;
pub use timestamp::UtcDateTime;
pub use token::{TokenRecord, TokenResponse, REFRESH_LEAD};
pub use transaction::{Transaction, TransactionCategory, TransactionStatus, TransactionType};
