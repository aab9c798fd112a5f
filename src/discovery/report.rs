//! Report assembly

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::discovery::qualify::Thresholds;
use crate::discovery::types::{CommonWallet, QualifiedWallet, TokenId, WalletPnLReport};

/// Overall outcome of a discovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// At least one wallet qualified
    Complete,
    /// Every holder fetch came back empty or failed
    NoHolderData,
    /// Holders found, but no wallet spans enough tokens
    NoCommonWallets,
    /// Common wallets found, but none had reconstructable trades
    NoReconstructableWallets,
    /// Wallets reconstructed, but none met the thresholds
    NoQualifiedWallets,
}

impl ReportStatus {
    pub fn has_results(&self) -> bool {
        matches!(self, ReportStatus::Complete)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ReportStatus::Complete => "Smart money wallets found",
            ReportStatus::NoHolderData => "No holder data could be fetched for these tokens",
            ReportStatus::NoCommonWallets => {
                "No common wallets found across these tokens. Try tokens with more overlap."
            }
            ReportStatus::NoReconstructableWallets => {
                "Common wallets found, but none had analyzable trading activity"
            }
            ReportStatus::NoQualifiedWallets => {
                "No wallets passed the filters. Try lowering thresholds or using more popular tokens."
            }
        }
    }
}

/// Market data attached to a token by the enrichment pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMarketInfo {
    pub token: TokenId,
    pub name: String,
    pub symbol: String,
    pub price_usd: Option<f64>,
    pub market_cap: f64,
    pub liquidity_usd: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
}

/// Everything the pipeline learned during one request
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub tokens: Vec<TokenId>,
    pub holder_counts: Vec<usize>,
    pub failed_holder_fetches: usize,
    pub common: Vec<CommonWallet>,
    pub candidates_examined: usize,
    /// Reconstructed reports in candidate order
    pub reconstructed: Vec<WalletPnLReport>,
    pub failed_activity_fetches: usize,
    /// Request deadline expired before every item settled
    pub partial: bool,
}

/// Structured smart money report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    pub tokens_analyzed: Vec<TokenId>,
    /// Holder set size per analyzed token, same order
    pub holder_counts: Vec<usize>,
    pub failed_holder_fetches: usize,
    pub total_common_wallets: usize,
    pub candidates_examined: usize,
    pub wallets_reconstructed: usize,
    pub failed_activity_fetches: usize,
    pub total_qualified: usize,
    pub qualified_wallets: Vec<QualifiedWallet>,
    pub thresholds: Thresholds,
    pub partial: bool,
    #[serde(default)]
    pub market: Vec<TokenMarketInfo>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Every token referenced by the report: analyzed tokens first, then
    /// tokens from the reported wallets' positions, without duplicates.
    pub fn referenced_tokens(&self) -> Vec<TokenId> {
        let mut tokens: Vec<TokenId> = Vec::new();
        let positions = self
            .qualified_wallets
            .iter()
            .flat_map(|w| w.pnl.positions.iter().map(|p| &p.token));

        for token in self.tokens_analyzed.iter().chain(positions) {
            if !tokens.contains(token) {
                tokens.push(token.clone());
            }
        }
        tokens
    }
}

/// Package ranked wallets and counters into a report.
///
/// `ranked` must already be filtered and sorted; only the first `limit`
/// wallets are kept.
pub fn assemble_report(
    outcome: PipelineOutcome,
    ranked: Vec<WalletPnLReport>,
    thresholds: Thresholds,
    limit: usize,
) -> Report {
    let status = if outcome.holder_counts.iter().all(|&count| count == 0) {
        ReportStatus::NoHolderData
    } else if outcome.common.is_empty() {
        ReportStatus::NoCommonWallets
    } else if outcome.reconstructed.is_empty() {
        ReportStatus::NoReconstructableWallets
    } else if ranked.is_empty() {
        ReportStatus::NoQualifiedWallets
    } else {
        ReportStatus::Complete
    };

    let total_qualified = ranked.len();
    let qualified_wallets = ranked
        .into_iter()
        .take(limit)
        .map(|pnl| {
            let held_tokens = outcome
                .common
                .iter()
                .find(|common| common.wallet == pnl.wallet)
                .map(|common| common.tokens.clone())
                .unwrap_or_default();
            QualifiedWallet { pnl, held_tokens }
        })
        .collect();

    Report {
        status,
        tokens_analyzed: outcome.tokens,
        holder_counts: outcome.holder_counts,
        failed_holder_fetches: outcome.failed_holder_fetches,
        total_common_wallets: outcome.common.len(),
        candidates_examined: outcome.candidates_examined,
        wallets_reconstructed: outcome.reconstructed.len(),
        failed_activity_fetches: outcome.failed_activity_fetches,
        total_qualified,
        qualified_wallets,
        thresholds,
        partial: outcome.partial,
        market: Vec::new(),
        generated_at: Utc::now(),
    }
}
