//! Market data enrichment for finished reports
//!
//! Looks up report tokens on DexScreener in fixed-size batches. Batches run
//! one after another with a fixed pause between them to stay inside the
//! public rate limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::discovery::report::{Report, TokenMarketInfo};
use crate::discovery::types::TokenId;
use crate::provider::dexscreener::{DexPair, DEXSCREENER_BASE, MAX_TOKENS_PER_REQUEST};
use crate::provider::MarketDataProvider;

/// Configuration for the enrichment pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Attach market data to reports
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// DexScreener API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Tokens per lookup
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between consecutive lookups
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Timeout for one lookup
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    DEXSCREENER_BASE.to_string()
}

fn default_batch_size() -> usize {
    29
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_timeout_ms() -> u64 {
    12_000
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            base_url: default_base_url(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Attaches third-party market data to reports
pub struct MarketEnricher {
    market: Arc<dyn MarketDataProvider>,
    config: EnrichmentConfig,
}

impl MarketEnricher {
    pub fn new(market: Arc<dyn MarketDataProvider>, config: EnrichmentConfig) -> Self {
        Self { market, config }
    }

    /// Fill `report.market` for every token the report references.
    ///
    /// Failed or timed-out batches leave their tokens without market data.
    pub async fn enrich(&self, report: &mut Report) {
        let tokens = report.referenced_tokens();
        if tokens.is_empty() {
            return;
        }

        let pairs = self.fetch_pairs(&tokens).await;
        report.market = tokens
            .iter()
            .filter_map(|token| pairs.get(token.as_str()).map(|pair| market_info(token, pair)))
            .collect();

        info!(
            tokens = tokens.len(),
            with_market_data = report.market.len(),
            "Report enrichment complete"
        );
    }

    /// First pair per base token across all batches
    async fn fetch_pairs(&self, tokens: &[TokenId]) -> HashMap<String, DexPair> {
        let batch_size = self.config.batch_size.clamp(1, MAX_TOKENS_PER_REQUEST);
        let timeout_duration = Duration::from_millis(self.config.timeout_ms);
        let delay = Duration::from_millis(self.config.batch_delay_ms);

        let addresses: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        let mut pairs: HashMap<String, DexPair> = HashMap::new();

        for (idx, batch) in addresses.chunks(batch_size).enumerate() {
            if idx > 0 {
                tokio::time::sleep(delay).await;
            }

            match timeout(timeout_duration, self.market.get_token_pairs(batch)).await {
                Ok(Ok(found)) => {
                    debug!(batch = idx, tokens = batch.len(), pairs = found.len(), "Fetched market pairs");
                    for pair in found {
                        pairs.entry(pair.base_token.address.clone()).or_insert(pair);
                    }
                }
                Ok(Err(e)) => {
                    warn!(batch = idx, error = %e, "Market data lookup failed");
                }
                Err(_) => {
                    warn!(batch = idx, "Market data lookup timed out");
                }
            }
        }

        pairs
    }
}

fn market_info(token: &TokenId, pair: &DexPair) -> TokenMarketInfo {
    TokenMarketInfo {
        token: token.clone(),
        name: pair
            .base_token
            .name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        symbol: pair
            .base_token
            .symbol
            .clone()
            .unwrap_or_else(|| "???".to_string()),
        price_usd: pair.price_usd.as_ref().and_then(|p| p.parse::<f64>().ok()),
        market_cap: pair.fdv.or(pair.market_cap).unwrap_or(0.0),
        liquidity_usd: pair.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0),
        volume_24h: pair.volume.as_ref().and_then(|v| v.h24).unwrap_or(0.0),
        price_change_24h: pair.price_change.as_ref().and_then(|pc| pc.h24).unwrap_or(0.0),
    }
}
