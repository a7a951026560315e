use crate::*;
use common::Pubkey;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a 64 character hex key, got: '{value}'")]
    InvalidKey { field: String, value: String },

    #[error("{field} must be within (0, 1), got: {value}")]
    InvalidRate { field: String, value: f64 },

    #[error("freeze_seconds ({freeze}) must be less than max_maturity_future_seconds ({max_maturity})")]
    FreezeExceedsMaturityWindow { freeze: u64, max_maturity: u64 },

    #[error("{field} must be a positive integer")]
    ZeroValue { field: String },

    #[error("No supported asset pairs defined")]
    NoSupportedPairs,

    #[error("Asset pair '{symbol}': {message}")]
    InvalidPair { symbol: String, message: String },

    #[error("Environment variable placeholder left unresolved in {field}")]
    UnresolvedEnvVar { field: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &ProtocolConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_protocol(&config.protocol, &mut report);
    validate_oracle(&config.oracle, &mut report);
    if let Some(feed) = &config.feed {
        validate_feed(feed, &mut report);
    } else {
        report.add_default("feed", "none (offline pricing only)");
    }
    validate_logging(&config.logging, &mut report);

    report
}

fn validate_key(field: &str, value: &str, report: &mut ValidationReport) {
    if has_unresolved_env_vars(value) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: field.to_string(),
        });
        return;
    }
    if value.parse::<Pubkey>().is_err() {
        report.add_error(ValidationError::InvalidKey {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

fn validate_rate(field: &str, value: f64, report: &mut ValidationReport) {
    if !(value > 0.0 && value < 1.0) {
        report.add_error(ValidationError::InvalidRate {
            field: field.to_string(),
            value,
        });
    }
}

fn validate_protocol(protocol: &ProtocolSection, report: &mut ValidationReport) {
    validate_key("protocol.oracle_key", &protocol.oracle_key, report);
    validate_key("protocol.protocol_treasury", &protocol.protocol_treasury, report);
    validate_key("protocol.fee_asset", &protocol.fee_asset, report);

    validate_rate("protocol.protocol_fee_rate", protocol.protocol_fee_rate, report);
    validate_rate("protocol.frontend_share", protocol.frontend_share, report);

    if protocol.freeze_seconds >= protocol.max_maturity_future_seconds {
        report.add_error(ValidationError::FreezeExceedsMaturityWindow {
            freeze: protocol.freeze_seconds,
            max_maturity: protocol.max_maturity_future_seconds,
        });
    }

    if protocol.max_fair_price_age_seconds == 0 {
        report.add_error(ValidationError::ZeroValue {
            field: "protocol.max_fair_price_age_seconds".to_string(),
        });
    }

    if protocol.ticket_fee == 0 {
        report.add_warning(
            "protocol.ticket_fee",
            "Tickets are free; oracle updates are not rate limited",
        );
    }

    if protocol.emergency_grace_seconds < protocol.freeze_seconds {
        report.add_warning(
            "protocol.emergency_grace_seconds",
            "Emergency mode may become available before the oracle can settle",
        );
    }
}

fn validate_oracle(oracle: &OracleSection, report: &mut ValidationReport) {
    validate_rate("oracle.risk_free_yearly_rate", oracle.risk_free_yearly_rate, report);

    for (field, value) in [
        ("oracle.sample_size", oracle.sample_size as u64),
        ("oracle.max_steps_too_old", oracle.max_steps_too_old as u64),
        ("oracle.year_seconds", oracle.year_seconds),
        ("oracle.current_price_max_delay_seconds", oracle.current_price_max_delay_seconds),
    ] {
        if value == 0 {
            report.add_error(ValidationError::ZeroValue {
                field: field.to_string(),
            });
        }
    }

    if oracle.supported_pairs.is_empty() {
        report.add_error(ValidationError::NoSupportedPairs);
        return;
    }

    let mut seen = HashSet::new();
    for pair in &oracle.supported_pairs {
        if pair.base.parse::<Pubkey>().is_err() || pair.quote.parse::<Pubkey>().is_err() {
            report.add_error(ValidationError::InvalidPair {
                symbol: pair.symbol.clone(),
                message: "base and quote must be hex mint keys".to_string(),
            });
        }
        if pair.base == pair.quote {
            report.add_error(ValidationError::InvalidPair {
                symbol: pair.symbol.clone(),
                message: "base and quote must differ".to_string(),
            });
        }
        if !seen.insert((pair.base.clone(), pair.quote.clone())) {
            report.add_warning("oracle.supported_pairs", &format!("Duplicate pair {}", pair.symbol));
        }
    }
}

fn validate_feed(feed: &FeedSection, report: &mut ValidationReport) {
    if has_unresolved_env_vars(&feed.api_key) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: "feed.api_key".to_string(),
        });
    } else if feed.api_key.is_empty() {
        report.add_warning("feed.api_key", "No API key configured for the candle provider");
    }

    if feed.page_size == 0 {
        report.add_error(ValidationError::ZeroValue {
            field: "feed.page_size".to_string(),
        });
    }

    if feed.base_url.scheme() != "https" {
        report.add_warning("feed.base_url", "Candle provider is not reached over https");
    }
}

fn validate_logging(logging: &LoggingSection, report: &mut ValidationReport) {
    if !["pretty", "json", "compact"].contains(&logging.format.as_str()) {
        report.add_warning(
            "logging.format",
            &format!("Unknown format '{}', falling back to pretty", logging.format),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&generate_default_config());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_bad_oracle_key_and_rates_reported() {
        let mut config = generate_default_config();
        config.protocol.oracle_key = "not-a-key".to_string();
        config.protocol.protocol_fee_rate = 1.5;
        config.oracle.supported_pairs.clear();

        let report = validate_config(&config);
        assert!(report.errors.contains(&ValidationError::InvalidKey {
            field: "protocol.oracle_key".to_string(),
            value: "not-a-key".to_string(),
        }));
        assert!(report.errors.contains(&ValidationError::NoSupportedPairs));
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidRate { field, .. } if field == "protocol.protocol_fee_rate")));
    }

    #[test]
    fn test_freeze_must_fit_in_maturity_window() {
        let mut config = generate_default_config();
        config.protocol.freeze_seconds = config.protocol.max_maturity_future_seconds;
        let report = validate_config(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_unknown_log_format_is_warning_only() {
        let mut config = generate_default_config();
        config.logging.format = "xml".to_string();
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.field == "logging.format"));
    }
}
