//! Common types used across OpenHedge
//!
//! This module provides the fundamental domain types used throughout
//! the protocol.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// A 32-byte public key identifying a wallet, a mint or an account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pubkey(pub [u8; 32]);

/// Ledger accounts share the key space of wallets.
pub type Address = Pubkey;

impl Pubkey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic key for a human-readable label.
    ///
    /// Used by scripts and tests to name participants without
    /// handling raw key material.
    pub fn named(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self(*hash.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Pubkey({}..)", &hex[..8])
    }
}

impl FromStr for Pubkey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || !s.is_ascii() {
            return Err(Error::InvalidKey(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidKey(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Pubkey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pubkey> for String {
    fn from(key: Pubkey) -> Self {
        key.to_hex()
    }
}

/// A fungible asset: its mint and number of decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub mint: Pubkey,
    pub decimals: u8,
}

impl Asset {
    pub fn new(mint: Pubkey, decimals: u8) -> Self {
        Self { mint, decimals }
    }
}

/// Option payoff direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    #[default]
    Put,
    Call,
}

impl OptionKind {
    pub fn as_u8(&self) -> u8 {
        match self {
            OptionKind::Put => 0,
            OptionKind::Call => 1,
        }
    }

    /// Whether an option struck at `strike` is exercised at `settled_price`.
    pub fn is_exercised(&self, strike: u64, settled_price: u64) -> bool {
        match self {
            OptionKind::Put => settled_price <= strike,
            OptionKind::Call => settled_price >= strike,
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Put => write!(f, "put"),
            OptionKind::Call => write!(f, "call"),
        }
    }
}

impl FromStr for OptionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "put" | "p" => Ok(OptionKind::Put),
            "call" | "c" => Ok(OptionKind::Call),
            _ => Err(Error::invalid_input(format!("unknown option kind: {}", s))),
        }
    }
}

/// The identifying tuple of an option series.
///
/// `strike` is expressed in quote-asset minor units per whole base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionSeries {
    pub base: Asset,
    pub quote: Asset,
    pub maturity: Timestamp,
    pub strike: u64,
    #[serde(default)]
    pub kind: OptionKind,
}

impl OptionSeries {
    /// The asset makers lock as collateral.
    pub fn collateral_asset(&self) -> Asset {
        match self.kind {
            OptionKind::Put => self.quote,
            OptionKind::Call => self.base,
        }
    }

    /// The asset takers deposit to exercise.
    pub fn funding_asset(&self) -> Asset {
        match self.kind {
            OptionKind::Put => self.base,
            OptionKind::Call => self.quote,
        }
    }
}

impl fmt::Display for OptionSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}@{}",
            self.kind,
            &self.base.mint.to_hex()[..8],
            self.maturity,
            self.strike
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_hex_roundtrip() {
        let key = Pubkey::named("alice");
        let parsed: Pubkey = key.to_hex().parse().unwrap();
        assert_eq!(key, parsed);
        assert!("xyz".parse::<Pubkey>().is_err());
    }

    #[test]
    fn test_pubkey_serde_as_hex_string() {
        let key = Pubkey::named("oracle");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.to_hex()));
    }

    #[test]
    fn test_exercise_condition() {
        assert!(OptionKind::Put.is_exercised(100, 100));
        assert!(OptionKind::Put.is_exercised(100, 90));
        assert!(!OptionKind::Put.is_exercised(100, 101));
        assert!(OptionKind::Call.is_exercised(100, 101));
        assert!(!OptionKind::Call.is_exercised(100, 99));
    }

    #[test]
    fn test_series_assets_follow_kind() {
        let base = Asset::new(Pubkey::named("sol"), 9);
        let quote = Asset::new(Pubkey::named("usdc"), 6);
        let mut series = OptionSeries {
            base,
            quote,
            maturity: 1_000,
            strike: 25_000_000_000,
            kind: OptionKind::Put,
        };
        assert_eq!(series.collateral_asset(), quote);
        assert_eq!(series.funding_asset(), base);
        series.kind = OptionKind::Call;
        assert_eq!(series.collateral_asset(), base);
    }
}
