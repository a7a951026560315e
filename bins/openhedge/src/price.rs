//! Offline fair price from a candle file.

use anyhow::{Context, Result};
use common::OptionKind;
use market_data::black_scholes::{inputs_from_sample, option_price};
use market_data::candles::normalize;
use market_data::{choose_granularity, Candle, CandleGranularity, PricingParams};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfflineQuote {
    pub price: f64,
    pub granularity: CandleGranularity,
    pub sample_len: usize,
    pub time_steps: f64,
    pub sigma2_per_step: f64,
}

pub struct PriceRequest {
    pub spot: f64,
    pub strike: f64,
    pub maturity: u64,
    pub now: u64,
    pub kind: OptionKind,
}

pub fn load_candles(path: &Path) -> Result<Vec<Candle>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read candle file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse candle file: {:?}", path))
}

/// Price with the same sampling rules as the oracle, but with the caller's
/// spot and with every candle of the file treated as the chosen granularity.
pub fn offline_fair_price(request: &PriceRequest, candles: Vec<Candle>, params: &PricingParams) -> Result<OfflineQuote> {
    if request.maturity <= request.now {
        anyhow::bail!("maturity {} is not after now {}", request.maturity, request.now);
    }
    let seconds_to_maturity = request.maturity - request.now;
    let granularity = choose_granularity(seconds_to_maturity, params.sample_size);
    let since = request.now.saturating_sub(seconds_to_maturity);
    let sample = normalize(candles.into_iter().filter(|c| c.start_time >= since && c.start_time <= request.now));

    let inputs = inputs_from_sample(
        request.spot,
        request.strike,
        request.kind,
        &sample,
        granularity,
        params.risk_free_yearly_rate,
        params.year_seconds,
    )?;
    Ok(OfflineQuote {
        price: option_price(&inputs),
        granularity,
        sample_len: sample.len(),
        time_steps: inputs.time_steps,
        sigma2_per_step: inputs.sigma2_per_step,
    })
}
