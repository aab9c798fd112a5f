//! Data provider contract consumed by the discovery engine
//!
//! Providers return normalized records; any response shape they cannot
//! decode must surface as an error, which the pipeline degrades to
//! "no data" for that token or wallet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;

pub mod dexscreener;
pub mod helius;

pub use dexscreener::{DexPair, DexScreenerClient};
pub use helius::HeliusClient;

/// One of the largest token accounts for a mint
#[derive(Debug, Clone, PartialEq)]
pub struct LargestAccount {
    /// Token account address (not the owner wallet)
    pub token_account: String,
    /// UI amount held
    pub amount: f64,
}

/// Token movement inside a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLeg {
    pub mint: String,
    pub from_owner: Option<String>,
    pub to_owner: Option<String>,
    pub amount: f64,
}

/// One transaction from a wallet's activity feed
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub signature: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Net native balance change of the queried wallet, in whole native units
    pub native_delta: f64,
    pub token_legs: Vec<TokenLeg>,
}

/// Holder snapshots and wallet activity source
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Largest token accounts for a mint, largest first
    async fn get_largest_holders(&self, token: &str) -> Result<Vec<LargestAccount>>;

    /// Map token accounts to their owner wallets; unknown accounts are omitted
    async fn resolve_owners(&self, token_accounts: &[String]) -> Result<HashMap<String, String>>;

    /// Most recent activity for a wallet, newest first
    async fn get_wallet_activity(&self, wallet: &str, limit: u32) -> Result<Vec<ActivityRecord>>;
}

/// Third-party market data used to annotate reports
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Trading pairs for a batch of mints
    async fn get_token_pairs(&self, tokens: &[String]) -> Result<Vec<DexPair>>;
}
