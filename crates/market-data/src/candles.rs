use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CandleGranularity {
    #[serde(rename = "ONE_MIN")]
    OneMinute,
    #[serde(rename = "FIVE_MIN")]
    FiveMinutes,
    #[serde(rename = "ONE_HOUR")]
    OneHour,
}

impl CandleGranularity {
    pub fn as_seconds(&self) -> u64 {
        match self {
            CandleGranularity::OneMinute => 60,
            CandleGranularity::FiveMinutes => 300,
            CandleGranularity::OneHour => 3600,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandleGranularity::OneMinute => "1m",
            CandleGranularity::FiveMinutes => "5m",
            CandleGranularity::OneHour => "1h",
        }
    }

    /// Name used by the remote candle provider
    pub fn provider_name(&self) -> &'static str {
        match self {
            CandleGranularity::OneMinute => "ONE_MIN",
            CandleGranularity::FiveMinutes => "FIVE_MIN",
            CandleGranularity::OneHour => "ONE_HOUR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" | "ONE_MIN" => Some(CandleGranularity::OneMinute),
            "5m" | "FIVE_MIN" => Some(CandleGranularity::FiveMinutes),
            "1h" | "ONE_HOUR" => Some(CandleGranularity::OneHour),
            _ => None,
        }
    }
}

impl std::fmt::Display for CandleGranularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A price candle; only the start time and close matter for pricing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub start_time: u64,
    pub close: f64,
}

impl Candle {
    pub fn new(start_time: u64, close: f64) -> Self {
        Self { start_time, close }
    }
}

/// Pick the coarsest granularity that still yields `sample_size` steps
/// before maturity.
pub fn choose_granularity(seconds_to_maturity: u64, sample_size: u32) -> CandleGranularity {
    let sample_size = sample_size as u64;
    if seconds_to_maturity / 3600 >= sample_size {
        CandleGranularity::OneHour
    } else if seconds_to_maturity / 300 >= sample_size {
        CandleGranularity::FiveMinutes
    } else {
        CandleGranularity::OneMinute
    }
}

/// Sort ascending by start time, keeping the last candle seen for a
/// duplicated start time.
pub fn normalize(candles: impl IntoIterator<Item = Candle>) -> Vec<Candle> {
    let by_start: BTreeMap<u64, Candle> = candles.into_iter().map(|c| (c.start_time, c)).collect();
    by_start.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_keeps_sample_size() {
        assert_eq!(choose_granularity(30 * 3600, 30), CandleGranularity::OneHour);
        assert_eq!(choose_granularity(30 * 3600 - 1, 30), CandleGranularity::FiveMinutes);
        assert_eq!(choose_granularity(30 * 300, 30), CandleGranularity::FiveMinutes);
        assert_eq!(choose_granularity(30 * 300 - 1, 30), CandleGranularity::OneMinute);
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let out = normalize(vec![
            Candle::new(120, 3.0),
            Candle::new(60, 1.0),
            Candle::new(120, 4.0),
        ]);
        assert_eq!(out, vec![Candle::new(60, 1.0), Candle::new(120, 4.0)]);
    }

    #[test]
    fn test_provider_json_shape() {
        let candle: Candle = serde_json::from_str(r#"{"startTime": 1700000000, "close": 25000.5}"#).unwrap();
        assert_eq!(candle, Candle::new(1_700_000_000, 25_000.5));
        assert_eq!(CandleGranularity::parse("FIVE_MIN"), Some(CandleGranularity::FiveMinutes));
    }
}
