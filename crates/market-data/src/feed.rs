//! The price feed collaborator.

use async_trait::async_trait;
use common::Pubkey;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::candles::{normalize, Candle, CandleGranularity};
use crate::{MarketDataError, Result};

/// Source of historical candles for a base asset
///
/// Implementations return candles ordered by ascending start time with at
/// most one candle per start time.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Candles starting at or after `since`
    async fn get_candles(
        &self,
        asset: &Pubkey,
        since: u64,
        granularity: CandleGranularity,
    ) -> Result<Vec<Candle>>;

    /// Candles starting strictly inside `(after, before)`
    async fn get_candles_between(
        &self,
        asset: &Pubkey,
        after: u64,
        before: u64,
        granularity: CandleGranularity,
    ) -> Result<Vec<Candle>> {
        let candles = self.get_candles(asset, after.saturating_add(1), granularity).await?;
        Ok(candles.into_iter().filter(|c| c.start_time < before).collect())
    }

    /// Most recent one-minute candle starting at or after `not_before`
    async fn latest_candle(&self, asset: &Pubkey, not_before: u64) -> Result<Candle> {
        let candles = self
            .get_candles(asset, not_before, CandleGranularity::OneMinute)
            .await?;
        candles
            .into_iter()
            .max_by_key(|c| c.start_time)
            .ok_or(MarketDataError::StalePriceFeed {
                asset: *asset,
                not_before,
            })
    }
}

/// Candle store held in memory, for tests and offline pricing
#[derive(Debug, Default)]
pub struct InMemoryFeed {
    series: RwLock<HashMap<(Pubkey, CandleGranularity), Vec<Candle>>>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge candles into the series for `(asset, granularity)`
    pub fn insert(&self, asset: Pubkey, granularity: CandleGranularity, candles: Vec<Candle>) {
        let mut series = self.series.write();
        let entry = series.entry((asset, granularity)).or_default();
        let merged = normalize(entry.drain(..).chain(candles));
        *entry = merged;
    }

    pub fn len(&self, asset: &Pubkey, granularity: CandleGranularity) -> usize {
        self.series
            .read()
            .get(&(*asset, granularity))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl PriceFeed for InMemoryFeed {
    async fn get_candles(
        &self,
        asset: &Pubkey,
        since: u64,
        granularity: CandleGranularity,
    ) -> Result<Vec<Candle>> {
        let series = self.series.read();
        Ok(series
            .get(&(*asset, granularity))
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| c.start_time >= since)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_in_memory_feed_filters_by_since() {
        let feed = InMemoryFeed::new();
        let asset = Pubkey::named("SOL");
        feed.insert(
            asset,
            CandleGranularity::OneMinute,
            vec![Candle::new(60, 1.0), Candle::new(120, 2.0), Candle::new(180, 3.0)],
        );

        let candles = feed.get_candles(&asset, 120, CandleGranularity::OneMinute).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert!(feed
            .get_candles(&asset, 0, CandleGranularity::OneHour)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_between_is_exclusive() {
        let feed = InMemoryFeed::new();
        let asset = Pubkey::named("SOL");
        feed.insert(
            asset,
            CandleGranularity::FiveMinutes,
            vec![Candle::new(300, 1.0), Candle::new(600, 2.0), Candle::new(900, 3.0)],
        );
        let candles = feed
            .get_candles_between(&asset, 300, 900, CandleGranularity::FiveMinutes)
            .await
            .unwrap();
        assert_eq!(candles, vec![Candle::new(600, 2.0)]);
    }

    #[tokio::test]
    async fn test_latest_candle_requires_recent_data() {
        let feed = InMemoryFeed::new();
        let asset = Pubkey::named("SOL");
        feed.insert(asset, CandleGranularity::OneMinute, vec![Candle::new(60, 10.0), Candle::new(120, 11.0)]);

        assert_eq!(feed.latest_candle(&asset, 0).await.unwrap(), Candle::new(120, 11.0));
        assert_matches!(
            feed.latest_candle(&asset, 121).await,
            Err(MarketDataError::StalePriceFeed { not_before: 121, .. })
        );
    }
}
