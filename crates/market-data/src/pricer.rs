//! Fair and settlement price pipelines.
//!
//! Candle closes and strikes are both quote-asset minor units per whole
//! base unit, so the premium comes out in the same unit.

use chrono::DateTime;
use common::units::round_u64;
use common::OptionSeries;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::black_scholes::{inputs_from_sample, option_price};
use crate::candles::{choose_granularity, CandleGranularity};
use crate::feed::PriceFeed;
use crate::{MarketDataError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingParams {
    pub sample_size: u32,
    pub current_price_max_delay_seconds: u64,
    pub risk_free_yearly_rate: f64,
    pub max_steps_too_old: u32,
    pub year_seconds: u64,
    pub settle_delay_seconds: u64,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            sample_size: 30,
            current_price_max_delay_seconds: 20 * 60,
            risk_free_yearly_rate: 0.06,
            max_steps_too_old: 6,
            year_seconds: 360 * 24 * 3600,
            settle_delay_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairPriceQuote {
    /// Premium rounded to quote minor units
    pub price: u64,
    pub raw_price: f64,
    pub spot: f64,
    pub granularity: CandleGranularity,
    pub sample_len: usize,
    pub time_steps: f64,
    pub sigma2_per_step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlePriceQuote {
    pub price: u64,
    pub candle_start: u64,
}

pub struct OptionPricer {
    feed: Arc<dyn PriceFeed>,
    params: PricingParams,
}

impl OptionPricer {
    pub fn new(feed: Arc<dyn PriceFeed>, params: PricingParams) -> Self {
        Self { feed, params }
    }

    pub fn params(&self) -> &PricingParams {
        &self.params
    }

    fn check_fresh(&self, newest: u64, reference: u64, granularity: CandleGranularity) -> Result<()> {
        let max_age = self.params.max_steps_too_old as u64 * granularity.as_seconds();
        if reference.saturating_sub(newest) > max_age {
            return Err(MarketDataError::StaleCandleData {
                newest,
                reference,
                max_age,
            });
        }
        Ok(())
    }

    /// Reference price: newest one-minute close within the configured delay
    pub async fn current_price(&self, series: &OptionSeries, now: u64) -> Result<f64> {
        let not_before = (now - now % 60).saturating_sub(self.params.current_price_max_delay_seconds);
        let candle = self.feed.latest_candle(&series.base.mint, not_before).await?;
        Ok(candle.close)
    }

    /// Model premium for one whole base unit of `series` at `now`
    #[instrument(skip(self, series), fields(series = %series))]
    pub async fn fair_price(&self, series: &OptionSeries, now: u64) -> Result<FairPriceQuote> {
        if series.maturity <= now {
            return Err(MarketDataError::invalid_input("series has reached maturity"));
        }
        let seconds_to_maturity = series.maturity - now;
        let granularity = choose_granularity(seconds_to_maturity, self.params.sample_size);
        debug!(%granularity, seconds_to_maturity, "Chosen sampling granularity");

        let sample = self
            .feed
            .get_candles(&series.base.mint, now - seconds_to_maturity.min(now), granularity)
            .await?;
        let newest = sample
            .last()
            .ok_or(MarketDataError::InsufficientCandleData { needed: 2, got: 0 })?;
        self.check_fresh(newest.start_time, now, granularity)?;

        let spot = self.current_price(series, now).await?;
        let inputs = inputs_from_sample(
            spot,
            series.strike as f64,
            series.kind,
            &sample,
            granularity,
            self.params.risk_free_yearly_rate,
            self.params.year_seconds,
        )?;
        let raw_price = option_price(&inputs);
        let price = round_u64(raw_price)
            .map_err(|e| MarketDataError::invalid_input(e.to_string()))?;

        info!(
            spot,
            strike = series.strike,
            price,
            maturity = %DateTime::from_timestamp(series.maturity as i64, 0).unwrap_or_default(),
            sample_len = sample.len(),
            "Computed fair price"
        );

        Ok(FairPriceQuote {
            price,
            raw_price,
            spot,
            granularity,
            sample_len: sample.len(),
            time_steps: inputs.time_steps,
            sigma2_per_step: inputs.sigma2_per_step,
        })
    }

    /// Close of the last five-minute candle at or before the maturity minute
    #[instrument(skip(self, series), fields(series = %series))]
    pub async fn settle_price(&self, series: &OptionSeries, now: u64) -> Result<SettlePriceQuote> {
        if series.maturity >= now {
            return Err(MarketDataError::invalid_input("series has not reached maturity"));
        }
        if now - series.maturity < self.params.settle_delay_seconds {
            return Err(MarketDataError::invalid_input(format!(
                "settlement needs {}s after maturity",
                self.params.settle_delay_seconds
            )));
        }

        let granularity = CandleGranularity::FiveMinutes;
        let maturity_minute = series.maturity - series.maturity % 60;
        let candles = self
            .feed
            .get_candles_between(
                &series.base.mint,
                maturity_minute.saturating_sub(3600),
                maturity_minute + 1,
                granularity,
            )
            .await?;
        let newest = candles
            .last()
            .ok_or(MarketDataError::InsufficientCandleData { needed: 1, got: 0 })?;
        self.check_fresh(newest.start_time, maturity_minute, granularity)?;

        if !(newest.close > 0.0) {
            return Err(MarketDataError::invalid_input(format!(
                "invalid settle price: {}",
                newest.close
            )));
        }
        let price = round_u64(newest.close).map_err(|e| MarketDataError::invalid_input(e.to_string()))?;
        info!(price, candle_start = newest.start_time, "Computed settlement price");

        Ok(SettlePriceQuote {
            price,
            candle_start: newest.start_time,
        })
    }
}
