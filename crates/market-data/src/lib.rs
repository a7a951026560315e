//! Market data for OpenHedge
//!
//! # Core Components
//!
//! - [`candles`] - Candle type, granularities and series normalization
//! - [`feed`] - The [`PriceFeed`] collaborator and an in-memory implementation
//! - [`volatility`] - Normal CDF, log-return variance, interest conversion
//! - [`black_scholes`] - Put/call fair premium from a candle sample
//! - [`pricer`] - Fair and settlement price pipelines over a feed
//!
//! # Key Invariants
//!
//! - Market data never writes ledger state
//! - Every price derived from candles passes a staleness check first

pub mod black_scholes;
pub mod candles;
pub mod error;
pub mod feed;
#[cfg(feature = "client")]
pub mod http;
pub mod pricer;
pub mod volatility;

pub use candles::{choose_granularity, Candle, CandleGranularity};
pub use error::MarketDataError;
pub use feed::{InMemoryFeed, PriceFeed};
#[cfg(feature = "client")]
pub use http::HttpCandleFeed;
pub use pricer::{FairPriceQuote, OptionPricer, PricingParams, SettlePriceQuote};

pub type Result<T> = std::result::Result<T, MarketDataError>;
