use common::units::ceil_u64;
use common::{Pubkey, Timestamp};
use config::ProtocolSection;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Protocol constants the ledger enforces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerParams {
    pub freeze_seconds: u64,
    pub max_maturity_future_seconds: u64,
    pub max_fair_price_age_seconds: u64,
    pub emergency_grace_seconds: u64,
    pub protocol_fee_rate: f64,
    /// Portion of the fee rate paid to the frontend, the rest to the protocol
    pub frontend_share: f64,
    pub ticket_fee: u64,
    pub oracle_key: Pubkey,
    pub protocol_treasury: Pubkey,
    pub fee_asset: Pubkey,
}

impl LedgerParams {
    pub fn from_config(section: &ProtocolSection) -> Result<Self> {
        Ok(Self {
            freeze_seconds: section.freeze_seconds,
            max_maturity_future_seconds: section.max_maturity_future_seconds,
            max_fair_price_age_seconds: section.max_fair_price_age_seconds,
            emergency_grace_seconds: section.emergency_grace_seconds,
            protocol_fee_rate: section.protocol_fee_rate,
            frontend_share: section.frontend_share,
            ticket_fee: section.ticket_fee,
            oracle_key: parse_key("oracle_key", &section.oracle_key)?,
            protocol_treasury: parse_key("protocol_treasury", &section.protocol_treasury)?,
            fee_asset: parse_key("fee_asset", &section.fee_asset)?,
        })
    }

    /// Whether `now` falls inside the freeze window before `maturity`
    pub fn is_frozen(&self, maturity: Timestamp, now: Timestamp) -> bool {
        maturity <= now.saturating_add(self.freeze_seconds)
    }

    /// Protocol and frontend fees on a premium, each rounded up. The frontend
    /// gets `frontend_share` of the fee rate and the protocol the rest.
    pub fn fee_split(&self, premium: f64) -> Result<(u64, u64)> {
        let total = premium * self.protocol_fee_rate;
        let protocol = ceil_u64(total * (1.0 - self.frontend_share))?;
        let frontend = ceil_u64(total * self.frontend_share)?;
        Ok((protocol, frontend))
    }
}

fn parse_key(field: &str, value: &str) -> Result<Pubkey> {
    value
        .parse()
        .map_err(|_| LedgerError::InvalidKey {
            field: field.to_string(),
            value: value.to_string(),
        })
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            freeze_seconds: config::default_freeze_seconds(),
            max_maturity_future_seconds: config::default_max_maturity_future_seconds(),
            max_fair_price_age_seconds: config::default_max_fair_price_age_seconds(),
            emergency_grace_seconds: config::default_emergency_grace_seconds(),
            protocol_fee_rate: config::default_protocol_fee_rate(),
            frontend_share: config::default_frontend_share(),
            ticket_fee: config::default_ticket_fee(),
            oracle_key: Pubkey::named("oracle"),
            protocol_treasury: Pubkey::named("protocol-treasury"),
            fee_asset: Pubkey::named("native"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_generated_config() {
        let config = config::generate_default_config();
        let params = LedgerParams::from_config(&config.protocol).unwrap();
        assert_eq!(params.freeze_seconds, 1800);
        assert_eq!(params.oracle_key.to_hex(), config.protocol.oracle_key);
    }

    #[test]
    fn test_bad_key_rejected() {
        let mut config = config::generate_default_config();
        config.protocol.fee_asset = "zz".to_string();
        assert!(LedgerParams::from_config(&config.protocol).is_err());
    }

    #[test]
    fn test_fee_split_follows_frontend_share() {
        let mut params = LedgerParams::default();
        assert_eq!(params.fee_split(250_000.0).unwrap(), (1_250, 1_250));

        params.frontend_share = 0.2;
        assert_eq!(params.fee_split(250_000.0).unwrap(), (2_000, 500));
        // each side rounds up on its own
        assert_eq!(params.fee_split(150.0).unwrap(), (2, 1));
    }

    #[test]
    fn test_freeze_window_is_inclusive() {
        let params = LedgerParams::default();
        assert!(params.is_frozen(10_000, 10_000 - 1800));
        assert!(!params.is_frozen(10_000, 10_000 - 1801));
    }
}
