//! Settlement for OpenHedge
//!
//! Pays out maker and taker positions once a factory has a settlement
//! price, and lets owners withdraw everything they committed when a factory
//! falls into emergency mode.

pub mod engine;
pub mod error;
pub mod outcome;

pub use engine::{maker_emergency_exit, settle_maker, settle_taker, taker_emergency_exit};
pub use error::SettlementError;
pub use outcome::SettleOutcome;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;
