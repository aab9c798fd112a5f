//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use crate::discovery::enrichment::EnrichmentConfig;
pub use crate::discovery::finder::DiscoveryConfig;
pub use crate::discovery::reconstructor::ReconstructorConfig;

use crate::discovery::finder::MIN_TOKENS;
use crate::discovery::qualify::Thresholds;
use crate::provider::dexscreener::MAX_TOKENS_PER_REQUEST;
use crate::provider::helius::api_key_from_url;
use crate::provider::HeliusClient;

/// Environment variable consulted when no API key is configured
pub const HELIUS_API_KEY_ENV: &str = "HELIUS_API_KEY";

/// Upper bound on tokens per request
const MAX_TOKENS_LIMIT: usize = 5;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub helius: HeliusConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeliusConfig {
    /// Falls back to `HELIUS_API_KEY`, then to an `api-key=` in `rpc_url`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_rpc_url() -> String {
    "https://mainnet.helius-rpc.com".to_string()
}

fn default_rest_url() -> String {
    "https://api.helius.xyz".to_string()
}

fn default_timeout_ms() -> u64 {
    12_000
}

impl Default for HeliusConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            rpc_url: default_rpc_url(),
            rest_url: default_rest_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HeliusConfig {
    /// Configured API key, or the one embedded in the RPC URL
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        api_key_from_url(&self.rpc_url)
    }

    /// RPC URL carrying the API key
    pub fn rpc_endpoint(&self, api_key: &str) -> String {
        if self.rpc_url.contains("api-key=") {
            self.rpc_url.clone()
        } else {
            format!("{}/?api-key={}", self.rpc_url.trim_end_matches('/'), api_key)
        }
    }

    /// Build a Helius client from this section
    pub fn build_client(&self) -> crate::Result<HeliusClient> {
        let api_key = self
            .resolved_api_key()
            .ok_or_else(|| crate::Error::MissingEnvVar(HELIUS_API_KEY_ENV.to_string()))?;

        HeliusClient::with_endpoints(
            api_key.clone(),
            self.rest_url.clone(),
            self.rpc_endpoint(&api_key),
            Duration::from_millis(self.timeout_ms),
        )
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (SMARTMONEY_DISCOVERY__MIN_WIN_RATE)
            .add_source(
                config::Environment::with_prefix("SMARTMONEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("discovery.excluded_addresses"),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if config.helius.api_key.is_empty() {
            if let Ok(key) = std::env::var(HELIUS_API_KEY_ENV) {
                config.helius.api_key = key;
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let discovery = &self.discovery;

        Thresholds::new(discovery.min_win_rate, discovery.min_pnl_sol)
            .context("Invalid default thresholds")?;

        if discovery.min_appearances < MIN_TOKENS {
            anyhow::bail!(
                "min_appearances must be at least {}, got {}",
                MIN_TOKENS,
                discovery.min_appearances
            );
        }

        if !(MIN_TOKENS..=MAX_TOKENS_LIMIT).contains(&discovery.max_tokens) {
            anyhow::bail!(
                "max_tokens must be between {} and {}, got {}",
                MIN_TOKENS,
                MAX_TOKENS_LIMIT,
                discovery.max_tokens
            );
        }

        if discovery.min_appearances > discovery.max_tokens {
            anyhow::bail!("min_appearances cannot exceed max_tokens");
        }

        if discovery.max_candidates == 0 {
            anyhow::bail!("max_candidates must be positive");
        }

        if discovery.holder_concurrency == 0 || discovery.activity_concurrency == 0 {
            anyhow::bail!("holder_concurrency and activity_concurrency must be positive");
        }

        if discovery.item_timeout_ms == 0 || discovery.request_timeout_ms == 0 {
            anyhow::bail!("item_timeout_ms and request_timeout_ms must be positive");
        }

        if discovery.report_limit == 0 {
            anyhow::bail!("report_limit must be positive");
        }

        if discovery.reconstruction.activity_limit == 0 {
            anyhow::bail!("activity_limit must be positive");
        }

        if self.helius.timeout_ms == 0 {
            anyhow::bail!("helius.timeout_ms must be positive");
        }

        if self.enrichment.enabled {
            if !(1..=MAX_TOKENS_PER_REQUEST).contains(&self.enrichment.batch_size) {
                anyhow::bail!(
                    "enrichment.batch_size must be between 1 and {}, got {}",
                    MAX_TOKENS_PER_REQUEST,
                    self.enrichment.batch_size
                );
            }
            if self.enrichment.timeout_ms == 0 {
                anyhow::bail!("enrichment.timeout_ms must be positive");
            }
        }

        Ok(())
    }

    /// Get a display-safe version of the config (secrets masked)
    pub fn masked_display(&self) -> String {
        let discovery = &self.discovery;
        format!(
            r#"Configuration:
  Helius:
    rpc_url: {}
    rest_url: {}
    api_key: {}
    timeout: {}ms
  Discovery:
    min_win_rate: {:.0}%
    min_pnl: {} SOL
    min_appearances: {}
    max_tokens: {}
    max_candidates: {}
    activity_limit: {}
    restrict_to_requested_tokens: {}
    skip_wrapped_native: {}
    concurrency: {} holders / {} wallets
    item_timeout: {}ms
    request_timeout: {}ms
    report_limit: {}
    extra_exclusions: {}
  Enrichment:
    enabled: {}
    base_url: {}
    batch_size: {}
    batch_delay: {}ms
"#,
            mask_url(&self.helius.rpc_url),
            self.helius.rest_url,
            if self.helius.resolved_api_key().is_some() {
                "***"
            } else {
                "(not set)"
            },
            self.helius.timeout_ms,
            discovery.min_win_rate * 100.0,
            discovery.min_pnl_sol,
            discovery.min_appearances,
            discovery.max_tokens,
            discovery.max_candidates,
            discovery.reconstruction.activity_limit,
            discovery.reconstruction.restrict_to_requested_tokens,
            discovery.reconstruction.skip_wrapped_native,
            discovery.holder_concurrency,
            discovery.activity_concurrency,
            discovery.item_timeout_ms,
            discovery.request_timeout_ms,
            discovery.report_limit,
            discovery.excluded_addresses.len(),
            self.enrichment.enabled,
            self.enrichment.base_url,
            self.enrichment.batch_size,
            self.enrichment.batch_delay_ms,
        )
    }
}

/// Mask sensitive parts of a URL
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
