//! Settlement error types

use ledger::{Categorized, ErrorCategory, LedgerError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    /// Vault bookkeeping cannot back the payout
    #[error("Settlement accounting error: {0}")]
    Accounting(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl Categorized for SettlementError {
    fn category(&self) -> ErrorCategory {
        match self {
            SettlementError::Accounting(_) => ErrorCategory::State,
            SettlementError::Ledger(err) => err.category(),
        }
    }
}
