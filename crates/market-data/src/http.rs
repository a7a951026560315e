//! Remote candle provider over HTTP.
//!
//! The provider exposes one POST endpoint that filters candles by start time
//! and pages through results with an opaque pagination token.

use async_trait::async_trait;
use common::Pubkey;
use config::FeedSection;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::candles::{normalize, Candle, CandleGranularity};
use crate::feed::PriceFeed;
use crate::{MarketDataError, Result};

const CANDLES_PATH: &str = "v0/token/candlesticks";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operator")]
enum StartTimeFilter {
    #[serde(rename = ">=")]
    AtLeast { value: u64 },
    #[serde(rename = "between", rename_all = "camelCase")]
    Between { greater_than: u64, less_than: u64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CandleRequest<'a> {
    start_time: StartTimeFilter,
    granularity: &'static str,
    mint: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination_token: Option<String>,
    limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandlePage {
    #[serde(default)]
    data: Vec<Candle>,
    #[serde(default)]
    pagination_token: Option<String>,
}

#[derive(Debug)]
pub struct HttpCandleFeed {
    client: Client,
    endpoint: Url,
    api_key: String,
    page_size: u32,
    /// Provider-side identifier per base mint, for assets listed under another address
    aliases: HashMap<Pubkey, String>,
}

impl HttpCandleFeed {
    pub fn new(base_url: &Url, api_key: &str, page_size: u32, timeout: Duration) -> Result<Self> {
        let endpoint = base_url
            .join(CANDLES_PATH)
            .map_err(|e| MarketDataError::Provider(format!("invalid base url: {}", e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Provider(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
            page_size,
            aliases: HashMap::new(),
        })
    }

    /// Feed from the `feed` section of the configuration
    pub fn from_config(section: &FeedSection) -> Result<Self> {
        if section.api_key.is_empty() {
            return Err(MarketDataError::Provider("feed.api_key is empty".to_string()));
        }
        Self::new(
            &section.base_url,
            &section.api_key,
            section.page_size,
            Duration::from_secs(section.timeout_seconds),
        )
    }

    pub fn with_alias(mut self, mint: Pubkey, provider_id: impl Into<String>) -> Self {
        self.aliases.insert(mint, provider_id.into());
        self
    }

    /// Identifier sent to the provider for `asset`
    pub fn provider_id(&self, asset: &Pubkey) -> String {
        self.aliases
            .get(asset)
            .cloned()
            .unwrap_or_else(|| asset.to_hex())
    }

    async fn fetch_all(
        &self,
        asset: &Pubkey,
        filter: StartTimeFilter,
        granularity: CandleGranularity,
    ) -> Result<Vec<Candle>> {
        let mint = self.provider_id(asset);
        let mut request = CandleRequest {
            start_time: filter,
            granularity: granularity.provider_name(),
            mint: &mint,
            pagination_token: None,
            limit: self.page_size,
        };
        let mut candles = Vec::new();

        loop {
            let response = self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| MarketDataError::Provider(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(MarketDataError::Provider(format!("{}: {}", status, error_text)));
            }

            let page: CandlePage = response
                .json()
                .await
                .map_err(|e| MarketDataError::Provider(e.to_string()))?;
            debug!(asset = %asset, %granularity, page_len = page.data.len(), "Fetched candle page");
            candles.extend(page.data);

            match page.pagination_token {
                Some(token) if !token.is_empty() => request.pagination_token = Some(token),
                _ => break,
            }
        }

        Ok(normalize(candles))
    }
}

#[async_trait]
impl PriceFeed for HttpCandleFeed {
    async fn get_candles(
        &self,
        asset: &Pubkey,
        since: u64,
        granularity: CandleGranularity,
    ) -> Result<Vec<Candle>> {
        self.fetch_all(asset, StartTimeFilter::AtLeast { value: since }, granularity)
            .await
    }

    async fn get_candles_between(
        &self,
        asset: &Pubkey,
        after: u64,
        before: u64,
        granularity: CandleGranularity,
    ) -> Result<Vec<Candle>> {
        self.fetch_all(
            asset,
            StartTimeFilter::Between {
                greater_than: after,
                less_than: before,
            },
            granularity,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = CandleRequest {
            start_time: StartTimeFilter::Between {
                greater_than: 10,
                less_than: 20,
            },
            granularity: CandleGranularity::FiveMinutes.provider_name(),
            mint: "abc",
            pagination_token: None,
            limit: 100,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["startTime"]["operator"], "between");
        assert_eq!(json["startTime"]["greaterThan"], 10);
        assert_eq!(json["granularity"], "FIVE_MIN");
        assert!(json.get("paginationToken").is_none());
    }

    #[test]
    fn test_page_without_token_ends_pagination() {
        let page: CandlePage =
            serde_json::from_str(r#"{"data": [{"startTime": 60, "close": 1.5}]}"#).unwrap();
        assert_eq!(page.data, vec![Candle::new(60, 1.5)]);
        assert!(page.pagination_token.is_none());
    }

    #[test]
    fn test_from_config_section() {
        let section = FeedSection {
            base_url: Url::parse("https://candles.example.com/api/").unwrap(),
            api_key: "secret".to_string(),
            page_size: 250,
            timeout_seconds: 3,
        };
        let feed = HttpCandleFeed::from_config(&section).unwrap();
        assert_eq!(feed.endpoint.as_str(), "https://candles.example.com/api/v0/token/candlesticks");
        assert_eq!(feed.page_size, 250);
        assert_eq!(feed.api_key, "secret");

        let unauthenticated = FeedSection {
            api_key: String::new(),
            ..section
        };
        assert!(HttpCandleFeed::from_config(&unauthenticated).is_err());
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let base = Url::parse("https://candles.example.com/").unwrap();
        let feed = HttpCandleFeed::new(&base, "key", 500, Duration::from_secs(5)).unwrap();
        assert_eq!(feed.endpoint.as_str(), "https://candles.example.com/v0/token/candlesticks");
        let mint = Pubkey::named("BTC");
        assert_eq!(feed.with_alias(mint, "wbtc").provider_id(&mint), "wbtc");
    }
}
