//! Exchange rate snapshots and the provider abstraction that produces them

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while fetching a rate table from a remote source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Network or transport failure, including non-success HTTP statuses.
    #[error("Rate provider unavailable: {0}")]
    Unavailable(String),

    /// The response could not be read as a mapping of currency code to rate.
    #[error("Malformed rate provider response: {0}")]
    Malformed(String),
}

/// Immutable snapshot of exchange rates relative to the provider's own base currency.
///
/// Codes are kept exactly as the provider sent them. Every rate is strictly
/// positive; a code that is not in the table is absent, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<String, Decimal>",
    into = "HashMap<String, Decimal>"
)]
pub struct RateTable {
    rates: Arc<HashMap<String, Decimal>>,
}

impl RateTable {
    pub fn new(rates: HashMap<String, Decimal>) -> Result<Self, ProviderError> {
        if let Some((code, rate)) = rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO) {
            return Err(ProviderError::Malformed(format!(
                "non-positive rate {rate} for {code}"
            )));
        }
        Ok(Self {
            rates: Arc::new(rates),
        })
    }

    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.rates.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl TryFrom<HashMap<String, Decimal>> for RateTable {
    type Error = ProviderError;

    fn try_from(rates: HashMap<String, Decimal>) -> Result<Self, Self::Error> {
        Self::new(rates)
    }
}

impl From<RateTable> for HashMap<String, Decimal> {
    fn from(table: RateTable) -> Self {
        Arc::unwrap_or_clone(table.rates)
    }
}

/// A remote source of rate tables. Implementations never retry on their own.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<RateTable, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rates(pairs: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        pairs
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect()
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let table = RateTable::new(rates(&[("USD", dec!(1.0)), ("EUR", dec!(0.85))])).unwrap();

        assert_eq!(table.rate("EUR"), Some(dec!(0.85)));
        assert_eq!(table.rate("eur"), None);
        assert!(!table.contains("GBP"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_non_positive_rates_are_rejected() {
        let err = RateTable::new(rates(&[("USD", dec!(1.0)), ("XXX", dec!(0))])).unwrap_err();
        assert_eq!(
            err,
            ProviderError::Malformed("non-positive rate 0 for XXX".to_string())
        );

        assert!(RateTable::new(rates(&[("YYY", dec!(-2.5))])).is_err());
    }

    #[test]
    fn test_serializes_as_flat_mapping() {
        let table = RateTable::new(rates(&[("EUR", dec!(0.85))])).unwrap();

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!({ "EUR": "0.85" }));

        let back: RateTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);

        let invalid = serde_json::from_value::<RateTable>(serde_json::json!({ "EUR": "-1" }));
        assert!(invalid.is_err());
    }
}
