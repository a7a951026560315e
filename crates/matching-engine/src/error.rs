//! Matching engine error types

use common::Address;
use ledger::{Categorized, ErrorCategory, LedgerError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchingError {
    /// No maker position in the vault accepts the ceiling price
    #[error("No eligible sellers in vault")]
    NoEligibleSellers,

    /// The allocation names one maker position more than once
    #[error("Maker {0} appears more than once in the allocation")]
    DuplicateMaker(Address),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl MatchingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MatchingError::Validation(msg.into())
    }
}

impl Categorized for MatchingError {
    fn category(&self) -> ErrorCategory {
        match self {
            MatchingError::NoEligibleSellers => ErrorCategory::State,
            MatchingError::DuplicateMaker(_) | MatchingError::Validation(_) => ErrorCategory::Validation,
            MatchingError::Ledger(err) => err.category(),
        }
    }
}
