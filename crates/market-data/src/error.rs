//! Market data error types

use common::Pubkey;
use thiserror::Error;

/// Errors raised by feeds and the pricing model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Insufficient candle data: need at least {needed} candles, got {got}")]
    InsufficientCandleData { needed: usize, got: usize },

    #[error("Candle data is stale: newest candle starts at {newest}, reference {reference}, tolerance {max_age}s")]
    StaleCandleData { newest: u64, reference: u64, max_age: u64 },

    #[error("No reference price for {asset} since {not_before}")]
    StalePriceFeed { asset: Pubkey, not_before: u64 },

    #[error("Asset pair {base}/{quote} is not supported")]
    UnsupportedAssetPair { base: Pubkey, quote: Pubkey },

    #[error("Invalid pricing input: {0}")]
    InvalidInput(String),

    /// The remote provider returned an error or an undecodable body
    #[error("Provider error: {0}")]
    Provider(String),
}

impl MarketDataError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Staleness errors clear up by retrying later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketDataError::StaleCandleData { .. }
                | MarketDataError::StalePriceFeed { .. }
                | MarketDataError::Provider(_)
        )
    }
}
