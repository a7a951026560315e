use serde::{Deserialize, Serialize};
use url::Url;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root of `openhedge.yaml`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    pub protocol: ProtocolSection,
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub feed: Option<FeedSection>,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// On-ledger protocol constants
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolSection {
    /// No position changes or fair-price writes within this many seconds of maturity
    #[serde(default = "default_freeze_seconds")]
    pub freeze_seconds: u64,
    #[serde(default = "default_max_maturity_future_seconds")]
    pub max_maturity_future_seconds: u64,
    /// A taker buy is refused if the last fair price is older than this
    #[serde(default = "default_max_fair_price_age_seconds")]
    pub max_fair_price_age_seconds: u64,
    /// Time after maturity without a settlement price before emergency mode can be activated
    #[serde(default = "default_emergency_grace_seconds")]
    pub emergency_grace_seconds: u64,
    #[serde(default = "default_protocol_fee_rate")]
    pub protocol_fee_rate: f64,
    #[serde(default = "default_frontend_share")]
    pub frontend_share: f64,
    /// Fee charged in `fee_asset` minor units for each oracle ticket
    #[serde(default = "default_ticket_fee")]
    pub ticket_fee: u64,
    pub oracle_key: String,
    pub protocol_treasury: String,
    pub fee_asset: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleSection {
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
    #[serde(default = "default_current_price_max_delay_seconds")]
    pub current_price_max_delay_seconds: u64,
    #[serde(default = "default_risk_free_yearly_rate")]
    pub risk_free_yearly_rate: f64,
    #[serde(default = "default_max_steps_too_old")]
    pub max_steps_too_old: u32,
    #[serde(default = "default_year_seconds")]
    pub year_seconds: u64,
    #[serde(default = "default_settle_delay_seconds")]
    pub settle_delay_seconds: u64,
    #[serde(default)]
    pub supported_pairs: Vec<AssetPairConfig>,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            current_price_max_delay_seconds: default_current_price_max_delay_seconds(),
            risk_free_yearly_rate: default_risk_free_yearly_rate(),
            max_steps_too_old: default_max_steps_too_old(),
            year_seconds: default_year_seconds(),
            settle_delay_seconds: default_settle_delay_seconds(),
            supported_pairs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AssetPairConfig {
    pub symbol: String,
    /// Base mint, hex encoded
    pub base: String,
    /// Quote mint, hex encoded
    pub quote: String,
    /// Identifier of the base asset at the candle provider, defaults to the base mint
    #[serde(default)]
    pub feed_address: Option<String>,
}

/// Remote candle provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedSection {
    pub base_url: Url,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}
