//! Asset pairs the oracle is willing to price.

use common::{OptionSeries, Pubkey};
use config::AssetPairConfig;
use market_data::MarketDataError;
use std::collections::HashMap;

use crate::error::OracleError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedPair {
    pub symbol: String,
    pub base: Pubkey,
    pub quote: Pubkey,
    /// Identifier of the base asset at the candle provider
    pub feed_address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SupportedPairs {
    pairs: HashMap<(Pubkey, Pubkey), SupportedPair>,
}

impl SupportedPairs {
    pub fn new(pairs: impl IntoIterator<Item = SupportedPair>) -> Self {
        Self {
            pairs: pairs
                .into_iter()
                .map(|pair| ((pair.base, pair.quote), pair))
                .collect(),
        }
    }

    pub fn from_config(entries: &[AssetPairConfig]) -> Result<Self> {
        let pairs = entries
            .iter()
            .map(|entry| {
                Ok(SupportedPair {
                    symbol: entry.symbol.clone(),
                    base: parse_mint(&entry.symbol, "base", &entry.base)?,
                    quote: parse_mint(&entry.symbol, "quote", &entry.quote)?,
                    feed_address: entry.feed_address.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(pairs))
    }

    pub fn get(&self, base: &Pubkey, quote: &Pubkey) -> Option<&SupportedPair> {
        self.pairs.get(&(*base, *quote))
    }

    /// Fails unless the base/quote pair of `series` is configured
    pub fn check(&self, series: &OptionSeries) -> Result<&SupportedPair> {
        let (base, quote) = (series.base.mint, series.quote.mint);
        self.get(&base, &quote)
            .ok_or(OracleError::MarketData(MarketDataError::UnsupportedAssetPair { base, quote }))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SupportedPair> {
        self.pairs.values()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn parse_mint(symbol: &str, side: &str, value: &str) -> Result<Pubkey> {
    value
        .parse()
        .map_err(|_| OracleError::Config(format!("{} mint of pair {} is not a valid key: {}", side, symbol, value)))
}
