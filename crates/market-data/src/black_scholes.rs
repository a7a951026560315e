use common::OptionKind;

use crate::candles::{Candle, CandleGranularity};
use crate::volatility::{convert_interest, std_normal_cdf, volatility_squared};
use crate::{MarketDataError, Result};

/// Inputs of one valuation. Prices share a unit (quote minor units per
/// whole base unit), rates are per candle step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInputs {
    pub spot: f64,
    pub strike: f64,
    pub rate_per_step: f64,
    pub sigma2_per_step: f64,
    pub time_steps: f64,
    pub kind: OptionKind,
}

pub fn d1_d2(input: &ModelInputs) -> (f64, f64) {
    let denominator = (input.sigma2_per_step * input.time_steps).sqrt();
    let d1 = ((input.spot / input.strike).ln()
        + (input.rate_per_step + input.sigma2_per_step / 2.0) * input.time_steps)
        / denominator;
    (d1, d1 - denominator)
}

pub fn intrinsic_value(spot: f64, strike: f64, kind: OptionKind) -> f64 {
    match kind {
        OptionKind::Call => (spot - strike).max(0.0),
        OptionKind::Put => (strike - spot).max(0.0),
    }
}

/// Black-Scholes premium measured in candle steps.
///
/// With no variance over the horizon the option is worth its intrinsic value.
pub fn option_price(input: &ModelInputs) -> f64 {
    if input.sigma2_per_step * input.time_steps <= 0.0 {
        return intrinsic_value(input.spot, input.strike, input.kind);
    }

    let (d1, d2) = d1_d2(input);
    let discount = (-input.rate_per_step * input.time_steps).exp();
    let price = match input.kind {
        OptionKind::Put => {
            input.strike * discount * std_normal_cdf(-d2) - input.spot * std_normal_cdf(-d1)
        }
        OptionKind::Call => {
            input.spot * std_normal_cdf(d1) - input.strike * discount * std_normal_cdf(d2)
        }
    };
    price.max(0.0)
}

/// Build model inputs from a candle sample ordered by ascending start time.
pub fn inputs_from_sample(
    spot: f64,
    strike: f64,
    kind: OptionKind,
    sample: &[Candle],
    granularity: CandleGranularity,
    risk_free_yearly_rate: f64,
    year_seconds: u64,
) -> Result<ModelInputs> {
    if !(spot > 0.0) || !(strike > 0.0) {
        return Err(MarketDataError::invalid_input(format!(
            "spot ({}) and strike ({}) must be positive",
            spot, strike
        )));
    }
    let (Some(oldest), Some(newest)) = (sample.first(), sample.last()) else {
        return Err(MarketDataError::InsufficientCandleData { needed: 2, got: 0 });
    };
    if sample.len() < 2 {
        return Err(MarketDataError::InsufficientCandleData {
            needed: 2,
            got: sample.len(),
        });
    }
    if sample.iter().any(|c| !(c.close > 0.0)) {
        return Err(MarketDataError::invalid_input("candle closes must be positive"));
    }

    let step = granularity.as_seconds();
    let closes: Vec<f64> = sample.iter().map(|c| c.close).collect();
    let sigma2_per_step = volatility_squared(&closes)
        .ok_or(MarketDataError::InsufficientCandleData { needed: 2, got: sample.len() })?;

    Ok(ModelInputs {
        spot,
        strike,
        rate_per_step: convert_interest(risk_free_yearly_rate, year_seconds, step),
        sigma2_per_step,
        time_steps: (newest.start_time - oldest.start_time) as f64 / step as f64,
        kind,
    })
}
