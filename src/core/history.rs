//! Conversion records and the store that keeps them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One completed conversion. Built once and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub base_currency: String,
    pub target_currency: String,
    pub amount: Decimal,
    pub converted_amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl ConversionRecord {
    pub fn new(base: &str, target: &str, amount: Decimal, converted_amount: Decimal) -> Self {
        Self {
            base_currency: base.to_string(),
            target_currency: target.to_string(),
            amount,
            converted_amount,
            timestamp: Utc::now(),
        }
    }
}

/// A record as held by a [`HistoryStore`], with the identifier the store assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: u64,
    pub record: ConversionRecord,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Conversion record {0} not found")]
    NotFound(u64),

    #[error("History storage error: {0}")]
    Storage(String),
}

/// Durable list of conversion records.
///
/// Stores assign identifiers on `append`; identifiers increase and are never
/// handed out twice by the same store.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: ConversionRecord) -> Result<HistoryEntry, HistoryError>;

    /// All entries in ascending identifier order.
    async fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError>;

    async fn find(&self, id: u64) -> Result<Option<HistoryEntry>, HistoryError>;

    /// Administrative override of an existing record.
    async fn update(&self, id: u64, record: ConversionRecord)
    -> Result<HistoryEntry, HistoryError>;

    async fn remove(&self, id: u64) -> Result<(), HistoryError>;
}
