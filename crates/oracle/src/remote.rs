//! Live candle feed for the oracle.

use config::ProtocolConfig;
use market_data::HttpCandleFeed;
use tracing::info;

use crate::error::OracleError;
use crate::pairs::SupportedPairs;
use crate::Result;

/// HTTP feed from the `feed` section, with each pair's `feed_address`
/// registered as the provider id of its base mint
pub fn http_feed(config: &ProtocolConfig, pairs: &SupportedPairs) -> Result<HttpCandleFeed> {
    let section = config
        .feed
        .as_ref()
        .ok_or_else(|| OracleError::Config("no feed section configured".to_string()))?;
    let mut feed = HttpCandleFeed::from_config(section)?;
    let mut aliases = 0;
    for pair in pairs.iter() {
        if let Some(address) = &pair.feed_address {
            feed = feed.with_alias(pair.base, address.clone());
            aliases += 1;
        }
    }
    info!(base_url = %section.base_url, pairs = pairs.len(), aliases, "Remote candle feed configured");
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::Pubkey;

    const CONFIG: &str = r#"
protocol:
  oracle_key: "${ORACLE}"
  protocol_treasury: "${TREASURY}"
  fee_asset: "${NATIVE}"
oracle:
  supported_pairs:
    - symbol: BTC/USDC
      base: "${BTC}"
      quote: "${USDC}"
      feed_address: 3NZ9JMVBmGAqocybic2c7LQCJScmgsAZ6vQqTDzcqmJh
    - symbol: SOL/USDC
      base: "${SOL}"
      quote: "${USDC}"
feed:
  base_url: https://candles.example.com/
  api_key: secret
"#;

    fn fixture_config(with_feed: bool) -> ProtocolConfig {
        let mut text = CONFIG.to_string();
        for label in ["ORACLE", "TREASURY", "NATIVE", "BTC", "USDC", "SOL"] {
            text = text.replace(&format!("${{{}}}", label), &Pubkey::named(label).to_hex());
        }
        let mut config = config::parse_config(&text).unwrap();
        if !with_feed {
            config.feed = None;
        }
        config
    }

    #[test]
    fn test_feed_from_config_applies_pair_aliases() {
        let config = fixture_config(true);
        let pairs = SupportedPairs::from_config(&config.oracle.supported_pairs).unwrap();
        let feed = http_feed(&config, &pairs).unwrap();

        assert_eq!(
            feed.provider_id(&Pubkey::named("BTC")),
            "3NZ9JMVBmGAqocybic2c7LQCJScmgsAZ6vQqTDzcqmJh"
        );
        let sol = Pubkey::named("SOL");
        assert_eq!(feed.provider_id(&sol), sol.to_hex());
    }

    #[test]
    fn test_feed_section_required() {
        let config = fixture_config(false);
        let pairs = SupportedPairs::from_config(&config.oracle.supported_pairs).unwrap();
        assert_matches!(http_feed(&config, &pairs), Err(OracleError::Config(_)));
    }
}
