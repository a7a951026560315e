//! Oracle for OpenHedge
//!
//! Answers fair-price and settlement tickets from candle data:
//!
//! - [`pairs`] - Base/quote pairs the oracle prices
//! - [`service`] - [`OracleService`], pricing a factory and consuming tickets
//! - `remote` - Candle feed over HTTP for the configured pairs (feature `client`)
//!
//! The oracle never writes factory prices directly. Every write goes
//! through a ticket consumption on the ledger with the oracle credential.

pub mod error;
pub mod pairs;
#[cfg(feature = "client")]
pub mod remote;
pub mod service;

pub use error::OracleError;
pub use pairs::{SupportedPair, SupportedPairs};
#[cfg(feature = "client")]
pub use remote::http_feed;
pub use service::{
    pricing_params, FairPriceUpdate, OracleService, SettlePriceUpdate, TicketSweep, UnansweredTicket,
};

pub type Result<T> = std::result::Result<T, OracleError>;
