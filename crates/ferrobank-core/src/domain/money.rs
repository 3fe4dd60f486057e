use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};

use crate::ValidationError;

/// Validates ISO-4217 style three-letter uppercase codes.
pub fn validate_currency_code(value: &str) -> Result<(), ValidationError> {
    if value.len() == 3 && value.bytes().all(|byte| byte.is_ascii_uppercase()) {
        return Ok(());
    }
    Err(ValidationError::InvalidCurrency {
        value: value.to_owned(),
    })
}

pub fn parse_amount(value: &str) -> Result<Decimal, ValidationError> {
    Decimal::from_str(value.trim()).map_err(|_| ValidationError::InvalidAmount {
        value: value.to_owned(),
    })
}

/// Deserializes a monetary amount from either a JSON string or a JSON number.
pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(AmountVisitor)
}

pub(crate) fn deserialize_optional_amount<'de, D>(
    deserializer: D,
) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(OptionalAmountVisitor)
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Decimal;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a decimal amount as string or number")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Decimal, E> {
        parse_amount(value).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Decimal, E> {
        Ok(Decimal::from(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Decimal, E> {
        Ok(Decimal::from(value))
    }

    // Shortest round-trip text keeps two-decimal amounts exact.
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Decimal, E> {
        parse_amount(&value.to_string()).map_err(E::custom)
    }
}

struct OptionalAmountVisitor;

impl<'de> Visitor<'de> for OptionalAmountVisitor {
    type Value = Option<Decimal>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("an optional decimal amount")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserialize_amount(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(deserialize_with = "deserialize_amount")]
        amount: Decimal,
        #[serde(default, deserialize_with = "deserialize_optional_amount")]
        available: Option<Decimal>,
    }

    #[test]
    fn amounts_decode_from_strings_and_numbers_without_drift() {
        let from_string: Payload =
            serde_json::from_str(r#"{"amount":"1200.10","available":null}"#).expect("string");
        assert_eq!(from_string.amount, Decimal::new(120010, 2));
        assert_eq!(from_string.available, None);

        let from_number: Payload =
            serde_json::from_str(r#"{"amount":0.1,"available":0.2}"#).expect("number");
        assert_eq!(from_number.amount, Decimal::new(1, 1));
        assert_eq!(from_number.available, Some(Decimal::new(2, 1)));
    }

    #[test]
    fn currency_codes_must_be_three_uppercase_letters() {
        assert!(validate_currency_code("RUB").is_ok());
        assert!(validate_currency_code("rub").is_err());
        assert!(validate_currency_code("RUBL").is_err());
    }
}
