//! Conversion error types.

use crate::core::history::HistoryError;
use crate::core::rates::ProviderError;
use rust_decimal::Decimal;
use thiserror::Error;

/// How a transport layer should treat a failed conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller.
    ClientError,
    /// Transient failure, the same request may succeed later.
    Retryable,
    /// Anything else. Details stay in the logs.
    Internal,
}

/// Errors that stop a conversion from producing an amount.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Missing or blank currency code.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// One or more codes are not in the resolved rate table.
    #[error("Unknown currency code(s): {}", .codes.join(", "))]
    UnknownCurrency { codes: Vec<String> },

    /// The rate table could not be fetched or parsed.
    #[error("Exchange rates unavailable: {0}")]
    RateUnavailable(#[source] ProviderError),

    /// The decimal result does not fit.
    #[error("Converting {amount} {base} to {target} overflows")]
    ArithmeticOverflow {
        base: String,
        target: String,
        amount: Decimal,
    },
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::InvalidArgument(_) | ConvertError::UnknownCurrency { .. } => {
                ErrorKind::ClientError
            }
            ConvertError::RateUnavailable(_) => ErrorKind::Retryable,
            ConvertError::ArithmeticOverflow { .. } => ErrorKind::Internal,
        }
    }
}

/// A conversion whose result is valid but whose history record was not saved.
#[derive(Debug, Error)]
#[error("Failed to persist conversion history: {0}")]
pub struct HistoryPersistenceFailed(#[source] pub HistoryError);
