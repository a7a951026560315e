//! Minor-unit arithmetic.
//!
//! Lot sizes are power-of-ten exponents and prices are integers in minor
//! units, so quantities are computed in f64 and brought back to u64 with an
//! explicit rounding direction.

use crate::error::{Error, Result};

/// `10^exp` as f64
pub fn pow10(exp: i32) -> f64 {
    10f64.powi(exp)
}

fn to_u64(value: f64, what: &str) -> Result<u64> {
    if !value.is_finite() || value < 0.0 || value > u64::MAX as f64 {
        return Err(Error::overflow(format!("{} = {} is not a valid amount", what, value)));
    }
    Ok(value as u64)
}

pub fn ceil_u64(value: f64) -> Result<u64> {
    to_u64(value.ceil(), "ceil")
}

pub fn floor_u64(value: f64) -> Result<u64> {
    to_u64(value.floor(), "floor")
}

pub fn round_u64(value: f64) -> Result<u64> {
    to_u64(value.round(), "round")
}
