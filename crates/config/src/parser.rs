use crate::*;
use anyhow::{Context, Result};
use common::Pubkey;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ProtocolConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());
    parse_config(&content)
}

/// Parse configuration text after environment variable substitution
pub fn parse_config(content: &str) -> Result<ProtocolConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let config: ProtocolConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> ProtocolConfig {
    ProtocolConfig {
        protocol: ProtocolSection {
            freeze_seconds: default_freeze_seconds(),
            max_maturity_future_seconds: default_max_maturity_future_seconds(),
            max_fair_price_age_seconds: default_max_fair_price_age_seconds(),
            emergency_grace_seconds: default_emergency_grace_seconds(),
            protocol_fee_rate: default_protocol_fee_rate(),
            frontend_share: default_frontend_share(),
            ticket_fee: default_ticket_fee(),
            oracle_key: Pubkey::named("oracle").to_hex(),
            protocol_treasury: Pubkey::named("protocol-treasury").to_hex(),
            fee_asset: Pubkey::named("native").to_hex(),
        },
        oracle: OracleSection {
            supported_pairs: vec![AssetPairConfig {
                symbol: "SOL/USDC".to_string(),
                base: Pubkey::named("SOL").to_hex(),
                quote: Pubkey::named("USDC").to_hex(),
                feed_address: None,
            }],
            ..OracleSection::default()
        },
        feed: None,
        logging: LoggingSection::default(),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &ProtocolConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let yaml = format!(
            "protocol:\n  oracle_key: \"{}\"\n  protocol_treasury: \"{}\"\n  fee_asset: \"{}\"\n",
            Pubkey::named("o").to_hex(),
            Pubkey::named("t").to_hex(),
            Pubkey::named("f").to_hex(),
        );
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.protocol.freeze_seconds, 1800);
        assert_eq!(config.protocol.ticket_fee, 500_000);
        assert_eq!(config.oracle.sample_size, 30);
        assert_eq!(config.oracle.year_seconds, 31_104_000);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.feed.is_none());
    }

    #[test]
    fn test_save_and_load_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openhedge.yaml");
        let config = generate_default_config();
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.protocol.oracle_key, config.protocol.oracle_key);
        assert_eq!(loaded.oracle.supported_pairs, config.oracle.supported_pairs);
    }

    #[test]
    fn test_missing_required_field_is_error() {
        assert!(parse_config("protocol:\n  freeze_seconds: 10\n").is_err());
    }
}
