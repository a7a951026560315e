//! Sample statistics for the fair-price model.

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal CDF from its Taylor series.
///
/// Terms are grouped in alternating pairs and summed from the smallest
/// upwards. Outside `|z| <= 6` the series is unstable and the tails are
/// returned exactly.
pub fn std_normal_cdf(z: f64) -> f64 {
    if z < -6.0 {
        return 0.0;
    }
    if z > 6.0 {
        return 1.0;
    }

    let z2 = z * z;
    let z4 = z2 * z2;
    // m == 2^k / k!, b == z^(2k+1)
    let mut m = 1.0;
    let mut b = z;
    let mut groups = [0.0f64; 50];

    for (i, group) in groups.iter_mut().enumerate() {
        let k = (i * 2) as f64;
        let a = 2.0 * k + 1.0;
        let item = b / (a * m) * (1.0 - (a * z2) / ((a + 1.0) * (a + 2.0)));
        *group = item;
        m *= 4.0 * (k + 1.0) * (k + 2.0);
        b *= z4;
    }

    let total: f64 = groups.iter().rev().sum();
    0.5 + INV_SQRT_2PI * total
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance
pub fn variance(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let squared: Vec<f64> = values.iter().map(|v| (v - avg) * (v - avg)).collect();
    mean(&squared)
}

/// Variance of the log returns of consecutive prices
pub fn volatility_squared(prices: &[f64]) -> Option<f64> {
    let log_returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    variance(&log_returns)
}

/// Rescale a compound rate quoted per `from_period` seconds to `to_period` seconds
pub fn convert_interest(rate: f64, from_period: u64, to_period: u64) -> f64 {
    (1.0 + rate).powf(to_period as f64 / from_period as f64) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdf_reference_points() {
        assert!((std_normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((std_normal_cdf(1.0) - 0.841_344_746).abs() < 1e-8);
        assert!((std_normal_cdf(-1.96) - 0.024_997_895).abs() < 1e-8);
        assert_eq!(std_normal_cdf(-6.5), 0.0);
        assert_eq!(std_normal_cdf(7.0), 1.0);
    }

    #[test]
    fn test_cdf_is_symmetric() {
        for z in [0.3, 1.2, 2.5, 4.0] {
            assert!((std_normal_cdf(z) + std_normal_cdf(-z) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_variance_of_log_returns() {
        assert_eq!(volatility_squared(&[100.0]), None);
        let flat = volatility_squared(&[100.0, 100.0, 100.0]).unwrap();
        assert_eq!(flat, 0.0);

        let v = volatility_squared(&[100.0, 110.0, 99.0]).unwrap();
        let r1 = (110.0f64 / 100.0).ln();
        let r2 = (99.0f64 / 110.0).ln();
        let m = (r1 + r2) / 2.0;
        let expected = ((r1 - m).powi(2) + (r2 - m).powi(2)) / 2.0;
        assert!((v - expected).abs() < 1e-15);
    }

    #[test]
    fn test_convert_interest_compounds_back() {
        let year = 360 * 24 * 3600;
        let hourly = convert_interest(0.06, year, 3600);
        let back = (1.0 + hourly).powf(year as f64 / 3600.0) - 1.0;
        assert!((back - 0.06).abs() < 1e-9);
    }
}
