//! Currency codes and base currencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RateError;

/// ISO 4217-like currency code.
///
/// Always three ASCII letters in uppercase. The only way to build one from
/// outside input is [`CurrencyCode::parse`], so every code that reaches a
/// comparison or the store is already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Normalize and validate a currency code.
    ///
    /// Surrounding whitespace is ignored and letters are uppercased, so
    /// `"usd"`, `" Usd "` and `"USD"` all yield the same code.
    pub fn parse(input: &str) -> Result<Self, RateError> {
        let trimmed = input.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RateError::InvalidInput(format!(
                "`{}` is not a three-letter currency code",
                input
            )));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = RateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Base currency of an API rate table.
///
/// Every rate in the table is quoted as units of the target currency per one
/// unit of the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BaseCurrency {
    Usd,
    Eur,
}

impl fmt::Display for BaseCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseCurrency::Usd => write!(f, "USD"),
            BaseCurrency::Eur => write!(f, "EUR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let expected = CurrencyCode("USD".to_string());
        assert_eq!(CurrencyCode::parse("usd").unwrap(), expected);
        assert_eq!(CurrencyCode::parse("Usd").unwrap(), expected);
        assert_eq!(CurrencyCode::parse(" USD\n").unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_malformed_codes() {
        for input in ["", "US", "USDT", "U5D", "us d", "€€€"] {
            let err = CurrencyCode::parse(input).unwrap_err();
            assert!(matches!(err, RateError::InvalidInput(_)), "{input}");
        }
    }

    #[test]
    fn test_serde_uses_plain_string() {
        let code = CurrencyCode::parse("gbp").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"GBP\"");

        let back: CurrencyCode = serde_json::from_str("\"jpy\"").unwrap();
        assert_eq!(back.as_str(), "JPY");

        assert!(serde_json::from_str::<CurrencyCode>("\"toolong\"").is_err());
    }

    #[test]
    fn test_base_currency_display() {
        assert_eq!(BaseCurrency::Usd.to_string(), "USD");
        assert_eq!(BaseCurrency::Eur.to_string(), "EUR");
    }

    proptest! {
        #[test]
        fn prop_any_case_mix_normalizes_to_same_code(code in "[A-Z]{3}", mask in 0u8..8) {
            let mixed: String = code
                .chars()
                .enumerate()
                .map(|(i, c)| if mask & (1 << i) != 0 { c.to_ascii_lowercase() } else { c })
                .collect();

            let parsed = CurrencyCode::parse(&mixed).unwrap();
            prop_assert_eq!(parsed.as_str(), code.as_str());
        }
    }
}
