//! Oracle error types

use common::Address;
use ledger::{ErrorCategory, LedgerError};
use market_data::MarketDataError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Computed price for factory {factory} is not positive")]
    PriceNotPositive { factory: Address },

    #[error("Invalid oracle configuration: {0}")]
    Config(String),
}

impl OracleError {
    /// Label used for rejection metrics
    pub fn category(&self) -> &'static str {
        match self {
            OracleError::MarketData(err) if err.is_retryable() => ErrorCategory::Staleness.as_str(),
            OracleError::MarketData(_) => "market_data",
            OracleError::Ledger(err) => err.category().as_str(),
            OracleError::PriceNotPositive { .. } => ErrorCategory::Validation.as_str(),
            OracleError::Config(_) => "config",
        }
    }
}
