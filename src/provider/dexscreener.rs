// DexScreener API client for token market data
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::MarketDataProvider;

pub const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";

/// DexScreener accepts up to 30 comma-separated addresses per lookup
pub const MAX_TOKENS_PER_REQUEST: usize = 30;

/// Rolling-window figures (price change in %, volume in USD)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowStats {
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "dexId")]
    pub dex_id: String,
    pub url: Option<String>,
    #[serde(rename = "pairAddress")]
    pub pair_address: String,
    #[serde(rename = "baseToken")]
    pub base_token: BaseToken,
    #[serde(rename = "priceNative")]
    pub price_native: Option<String>,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    #[serde(rename = "priceChange")]
    pub price_change: Option<WindowStats>,
    pub volume: Option<WindowStats>,
    pub liquidity: Option<Liquidity>,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    #[serde(rename = "fdv")]
    pub fdv: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairsResponse {
    pub pairs: Option<Vec<DexPair>>,
}

pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl DexScreenerClient {
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl MarketDataProvider for DexScreenerClient {
    async fn get_token_pairs(&self, tokens: &[String]) -> Result<Vec<DexPair>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        if tokens.len() > MAX_TOKENS_PER_REQUEST {
            return Err(Error::Http(format!(
                "DexScreener lookup limited to {} tokens, got {}",
                MAX_TOKENS_PER_REQUEST,
                tokens.len()
            )));
        }

        let url = format!("{}/latest/dex/tokens/{}", self.base_url, tokens.join(","));
        debug!(tokens = tokens.len(), "Fetching DexScreener pairs");

        let resp = self.client.get(&url).timeout(self.timeout).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!("DexScreener returned {}", resp.status())));
        }

        let data: TokenPairsResponse = resp.json().await?;
        Ok(data.pairs.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_response_null_pairs() {
        let data: TokenPairsResponse =
            serde_json::from_str(r#"{"schemaVersion":"1.0.0","pairs":null}"#).unwrap();
        assert!(data.pairs.is_none());
    }

    #[test]
    fn test_pairs_response_decodes() {
        let body = r#"{"pairs":[{
            "chainId": "solana", "dexId": "raydium", "pairAddress": "Pair1",
            "baseToken": { "address": "MintA", "name": "Alpha", "symbol": "ALP" },
            "priceUsd": "0.0123", "fdv": 120000.5,
            "volume": { "h24": 5000.0 }, "priceChange": { "h24": -3.5 },
            "liquidity": { "usd": 42000.0 }
        }]}"#;
        let data: TokenPairsResponse = serde_json::from_str(body).unwrap();
        let pair = &data.pairs.unwrap()[0];
        assert_eq!(pair.base_token.symbol.as_deref(), Some("ALP"));
        assert_eq!(pair.market_cap, None);
        assert_eq!(pair.fdv, Some(120000.5));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let client =
            DexScreenerClient::with_base_url("http://127.0.0.1:1/", Duration::from_millis(10)).unwrap();
        assert_eq!(client.timeout(), Duration::from_millis(10));
        let pairs = client.get_token_pairs(&[]).await.unwrap();
        assert!(pairs.is_empty());
    }
}
