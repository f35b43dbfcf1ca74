//! Core conversion abstractions

pub mod cache;
pub mod config;
pub mod error;
pub mod history;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use cache::{RATE_TABLE_TTL, RateCache, RateSnapshot, RateSnapshotStore};
pub use error::{ConvertError, ErrorKind, HistoryPersistenceFailed};
pub use history::{ConversionRecord, HistoryEntry, HistoryError, HistoryStore};
pub use rates::{ProviderError, RateProvider, RateTable};
