//! Ledger error types

use common::Pubkey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bank::TransferError;

/// Which side of a vault a capacity limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Maker,
    Taker,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Maker => write!(f, "maker"),
            Side::Taker => write!(f, "taker"),
        }
    }
}

/// Coarse classification callers use to decide between retrying,
/// adjusting parameters, or giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or out-of-range input; fix the request
    Validation,
    /// Vault is full on one side
    Capacity,
    /// Conflicts with current account state
    State,
    /// Price data too old; retry later
    Staleness,
    Authorization,
    /// A collaborator (token transfer) failed
    Collaborator,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Capacity => "capacity",
            ErrorCategory::State => "state",
            ErrorCategory::Staleness => "staleness",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Collaborator => "collaborator",
        }
    }
}

/// Errors returned by ledger operations. A failed operation leaves every
/// account and balance untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid strike: must be positive")]
    InvalidStrike,

    #[error("Invalid maturity {maturity}: {reason}")]
    InvalidMaturity { maturity: u64, reason: String },

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid {field} key: {value}")]
    InvalidKey { field: String, value: String },

    #[error("Invalid lot size exponent {0}")]
    InvalidLotSize(i8),

    #[error("Allocation is empty")]
    EmptyAllocation,

    #[error("Maker position {maker} does not belong to vault {vault}")]
    MakerNotInVault { maker: Pubkey, vault: Pubkey },

    #[error("Premium {premium} does not cover fees {fees}")]
    PremiumTooLow { premium: u64, fees: u64 },

    #[error("Max fair price {max} is below the current fair price {fair}")]
    MaxFairPriceTooLow { max: u64, fair: u64 },

    #[error("Vault is full: no more {0} positions")]
    CapacityExceeded(Side),

    #[error("Account {0} already exists")]
    AlreadyExists(Pubkey),

    #[error("{side} already holds position {position} in this vault")]
    AlreadyEntered { side: Side, position: Pubkey },

    #[error("Ticket is missing or already used")]
    TicketInvalid,

    #[error("An unused ticket already exists for this requester")]
    TicketAlreadyIssued,

    #[error("Vault factory has already matured")]
    FactoryMatured,

    #[error("Vault factory has not reached maturity")]
    NotMatured,

    #[error("No settlement price has been set")]
    SettlePriceMissing,

    #[error("Position {0} is already settled")]
    AlreadySettled(Pubkey),

    #[error("Vault factory is in emergency mode")]
    EmergencyMode,

    #[error("Vault factory is not in emergency mode")]
    NotEmergencyMode,

    #[error("Emergency mode is not available until {available_at}")]
    EmergencyGracePending { available_at: u64 },

    #[error("Operation not allowed within {freeze_seconds}s of maturity")]
    FrozenPeriod { freeze_seconds: u64 },

    #[error("Cannot reduce position to {requested}: {volume_sold} already sold")]
    InsufficientUnsoldRemainder { requested: u64, volume_sold: u64 },

    #[error("Account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("Account {address} is not a {expected}")]
    WrongAccountKind { address: Pubkey, expected: &'static str },

    #[error("Fair price last updated at {updated_at}, older than {max_age}s")]
    FairPriceTooOld { updated_at: u64, max_age: u64 },

    #[error("{0} is not authorized for this operation")]
    Unauthorized(Pubkey),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        use LedgerError::*;
        match self {
            InvalidQuantity(_)
            | InvalidStrike
            | InvalidMaturity { .. }
            | InvalidPrice(_)
            | InvalidLotSize(_)
            | InvalidKey { .. }
            | EmptyAllocation
            | MakerNotInVault { .. }
            | PremiumTooLow { .. }
            | MaxFairPriceTooLow { .. }
            | Arithmetic(_) => ErrorCategory::Validation,
            CapacityExceeded(_) => ErrorCategory::Capacity,
            AlreadyExists(_)
            | AlreadyEntered { .. }
            | TicketInvalid
            | TicketAlreadyIssued
            | FactoryMatured
            | NotMatured
            | SettlePriceMissing
            | AlreadySettled(_)
            | EmergencyMode
            | NotEmergencyMode
            | EmergencyGracePending { .. }
            | FrozenPeriod { .. }
            | InsufficientUnsoldRemainder { .. }
            | AccountNotFound(_)
            | WrongAccountKind { .. } => ErrorCategory::State,
            FairPriceTooOld { .. } => ErrorCategory::Staleness,
            Unauthorized(_) => ErrorCategory::Authorization,
            Transfer(_) => ErrorCategory::Collaborator,
        }
    }
}

impl From<common::Error> for LedgerError {
    fn from(err: common::Error) -> Self {
        LedgerError::Arithmetic(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
