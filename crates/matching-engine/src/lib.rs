//! Maker allocation and taker buys for OpenHedge
//!
//! This crate decides which maker positions fill a taker's order and
//! executes the buy against the ledger.
//!
//! # Core Components
//!
//! - [`allocation`] - Eligible sellers and the bounded greedy selection
//! - [`fill`] - Taker buy: premium, fees, exposure and funding
//!
//! # Key Invariants
//!
//! - Fill priority is entry order; price only filters
//! - At most five maker positions per buy
//! - A short allocation is reported, never an error

pub mod allocation;
pub mod error;
pub mod fill;

pub use allocation::{
    allocate, ceiling_price, eligible_sellers, select, Allocation, AllocationEntry, MAX_POSITIONS_PER_FILL,
};
pub use error::MatchingError;
pub use fill::{taker_buy, BuyOutcome, BuyRequest};

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchingError>;
