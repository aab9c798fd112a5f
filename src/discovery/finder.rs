//! Smart Money Finder - the discovery pipeline
//!
//! tokens -> holder sets (fan-out per token) -> intersection -> candidate
//! wallets -> activity (fan-out per wallet) -> reconstruction ->
//! qualification -> report -> optional market enrichment.
//!
//! Each fan-out stage settles completely before the next one starts.
//! Per-item failures and timeouts degrade that item to "no data"; only
//! the request deadline can cut a stage short, in which case the report
//! is built from whatever settled and flagged `partial`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::discovery::enrichment::MarketEnricher;
use crate::discovery::intersection::{find_intersection, ExclusionSet};
use crate::discovery::qualify::{qualify_and_rank, Thresholds};
use crate::discovery::reconstructor::{reconstruct, LegFilter, ReconstructorConfig};
use crate::discovery::report::{assemble_report, PipelineOutcome, Report};
use crate::discovery::types::{CommonWallet, HolderSet, TokenId, WalletAddress, WalletPnLReport};
use crate::error::{Error, Result};
use crate::provider::{ActivityRecord, DataProvider};

/// Fewest distinct tokens a request may carry
pub const MIN_TOKENS: usize = 2;

/// Configuration for the discovery pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Default minimum win rate for CLI requests
    #[serde(default = "default_min_win_rate")]
    pub min_win_rate: f64,

    /// Default minimum realized P&L (SOL) for CLI requests
    #[serde(default = "default_min_pnl_sol")]
    pub min_pnl_sol: f64,

    /// Distinct tokens a wallet must hold to become a candidate
    #[serde(default = "default_min_appearances")]
    pub min_appearances: usize,

    /// Extra tokens beyond this are dropped
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Candidate wallets analyzed per request
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_holder_concurrency")]
    pub holder_concurrency: usize,

    #[serde(default = "default_activity_concurrency")]
    pub activity_concurrency: usize,

    /// Timeout for one holder or activity fetch
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,

    /// Deadline for the whole request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Qualified wallets included in the report
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,

    /// Addresses excluded in addition to the built-in program accounts
    #[serde(default)]
    pub excluded_addresses: Vec<String>,

    #[serde(default)]
    pub reconstruction: ReconstructorConfig,
}

fn default_min_win_rate() -> f64 { 0.60 }
fn default_min_pnl_sol() -> f64 { 10.0 }
fn default_min_appearances() -> usize { 2 }
fn default_max_tokens() -> usize { 5 }
fn default_max_candidates() -> usize { 30 }
fn default_holder_concurrency() -> usize { 5 }
fn default_activity_concurrency() -> usize { 30 }
fn default_item_timeout_ms() -> u64 { 12_000 }
fn default_request_timeout_ms() -> u64 { 60_000 }
fn default_report_limit() -> usize { 10 }

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_win_rate: default_min_win_rate(),
            min_pnl_sol: default_min_pnl_sol(),
            min_appearances: default_min_appearances(),
            max_tokens: default_max_tokens(),
            max_candidates: default_max_candidates(),
            holder_concurrency: default_holder_concurrency(),
            activity_concurrency: default_activity_concurrency(),
            item_timeout_ms: default_item_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            report_limit: default_report_limit(),
            excluded_addresses: Vec::new(),
            reconstruction: ReconstructorConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Configured default thresholds
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_win_rate: self.min_win_rate,
            min_pnl: self.min_pnl_sol,
        }
    }

    /// Built-in exclusions plus configured extras
    pub fn exclusion_set(&self) -> ExclusionSet {
        ExclusionSet::with_extra(self.excluded_addresses.iter().cloned())
    }
}

/// Result of one fan-out task
enum ItemOutcome<T> {
    Ready(T),
    Failed(Error),
    TimedOut,
}

/// All outcomes of a fan-out group, by input slot
struct Settled<T> {
    /// `None` means the item had not settled when the deadline hit
    slots: Vec<Option<ItemOutcome<T>>>,
    expired: bool,
}

/// Run `task` for every item with at most `concurrency` in flight.
///
/// Each task writes only to its own slot; slots are read after the group
/// has settled or the deadline has passed.
async fn fan_out<'a, I, T, F, Fut>(
    items: &'a [I],
    concurrency: usize,
    item_timeout: Duration,
    deadline: Instant,
    task: F,
) -> Settled<T>
where
    F: Fn(&'a I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut slots: Vec<Option<ItemOutcome<T>>> = items.iter().map(|_| None).collect();

    let mut pending = std::pin::pin!(stream::iter(items.iter().enumerate())
        .map(|(idx, item)| {
            let fut = task(item);
            async move {
                let outcome = match timeout(item_timeout, fut).await {
                    Ok(Ok(value)) => ItemOutcome::Ready(value),
                    Ok(Err(e)) => ItemOutcome::Failed(e),
                    Err(_) => ItemOutcome::TimedOut,
                };
                (idx, outcome)
            }
        })
        .buffer_unordered(concurrency.max(1)));

    let mut expired = false;
    loop {
        match timeout_at(deadline, pending.next()).await {
            Ok(Some((idx, outcome))) => slots[idx] = Some(outcome),
            Ok(None) => break,
            Err(_) => {
                expired = true;
                break;
            }
        }
    }

    Settled { slots, expired }
}

/// Holder stage result
struct HolderStage {
    sets: Vec<HolderSet>,
    failures: usize,
    expired: bool,
}

/// Activity stage result
struct ActivityStage {
    /// Candidates whose fetch settled before the deadline
    examined: usize,
    reports: Vec<WalletPnLReport>,
    failures: usize,
    expired: bool,
}

/// Discovers smart money wallets for a set of tokens
pub struct SmartMoneyFinder {
    provider: Arc<dyn DataProvider>,
    exclusions: ExclusionSet,
    config: DiscoveryConfig,
    enricher: Option<MarketEnricher>,
}

impl SmartMoneyFinder {
    pub fn new(provider: Arc<dyn DataProvider>, config: DiscoveryConfig) -> Self {
        Self {
            provider,
            exclusions: config.exclusion_set(),
            config,
            enricher: None,
        }
    }

    /// Replace the exclusion set derived from configuration
    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Attach market data to finished reports
    pub fn with_enricher(mut self, enricher: MarketEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Find smart money with the default 60% win rate / 10 SOL thresholds
    pub async fn find_default<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Report> {
        self.find(tokens, Thresholds::default()).await
    }

    /// Run the full discovery pipeline.
    ///
    /// Only input validation can fail; every provider problem is folded
    /// into the report.
    pub async fn find<S: AsRef<str>>(&self, tokens: &[S], thresholds: Thresholds) -> Result<Report> {
        thresholds.validate()?;
        let tokens = self.normalize_tokens(tokens)?;

        let deadline = Instant::now() + Duration::from_millis(self.config.request_timeout_ms);

        info!(tokens = tokens.len(), "Fetching holders");
        let holders = self.fetch_holder_sets(&tokens, deadline).await;

        let common = find_intersection(&holders.sets, &self.exclusions, self.config.min_appearances);
        info!(
            common = common.len(),
            failed_fetches = holders.failures,
            "Holder intersection complete"
        );

        let candidates: Vec<CommonWallet> = common
            .iter()
            .take(self.config.max_candidates)
            .cloned()
            .collect();

        let activity = if candidates.is_empty() || holders.expired {
            ActivityStage {
                examined: 0,
                reports: Vec::new(),
                failures: 0,
                expired: false,
            }
        } else {
            info!(wallets = candidates.len(), "Reconstructing wallet P&L");
            self.reconstruct_candidates(&candidates, &tokens, deadline).await
        };

        let ranked = qualify_and_rank(activity.reports.clone(), &thresholds);
        info!(
            reconstructed = activity.reports.len(),
            qualified = ranked.len(),
            "Qualification complete"
        );

        let partial = holders.expired || activity.expired;
        if partial {
            warn!("Request deadline reached, building partial report");
        }

        let outcome = PipelineOutcome {
            holder_counts: holders.sets.iter().map(HolderSet::len).collect(),
            tokens,
            failed_holder_fetches: holders.failures,
            common,
            candidates_examined: activity.examined,
            reconstructed: activity.reports,
            failed_activity_fetches: activity.failures,
            partial,
        };

        let mut report = assemble_report(outcome, ranked, thresholds, self.config.report_limit);

        if let Some(enricher) = &self.enricher {
            if timeout_at(deadline, enricher.enrich(&mut report)).await.is_err() {
                warn!("Request deadline reached during market enrichment");
            }
        }

        Ok(report)
    }

    /// Trim, deduplicate and bound the requested tokens
    fn normalize_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<TokenId>> {
        let mut unique: Vec<TokenId> = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            let token = TokenId::new(token);
            if !unique.contains(&token) {
                unique.push(token);
            }
        }

        if unique.len() < MIN_TOKENS {
            return Err(Error::InsufficientTokens {
                provided: unique.len(),
            });
        }

        let max_tokens = self.config.max_tokens.max(MIN_TOKENS);
        if unique.len() > max_tokens {
            warn!(
                provided = unique.len(),
                max = max_tokens,
                "Too many tokens, analyzing the first {}",
                max_tokens
            );
            unique.truncate(max_tokens);
        }

        Ok(unique)
    }

    async fn fetch_holder_sets(&self, tokens: &[TokenId], deadline: Instant) -> HolderStage {
        let settled = fan_out(
            tokens,
            self.config.holder_concurrency,
            Duration::from_millis(self.config.item_timeout_ms),
            deadline,
            |token| self.fetch_holder_set(token),
        )
        .await;

        let mut failures = 0;
        let sets = tokens
            .iter()
            .zip(settled.slots)
            .map(|(token, slot)| match slot {
                Some(ItemOutcome::Ready(set)) => {
                    debug!(mint = %token.short(), holders = set.len(), "Fetched holder set");
                    set
                }
                Some(ItemOutcome::Failed(e)) => {
                    if e.is_provider_failure() {
                        warn!(mint = %token, error = %e, "Holder fetch failed");
                    } else {
                        error!(mint = %token, error = %e, "Unexpected holder fetch error");
                    }
                    failures += 1;
                    HolderSet::empty(token.clone())
                }
                Some(ItemOutcome::TimedOut) => {
                    warn!(mint = %token, "Holder fetch timed out");
                    failures += 1;
                    HolderSet::empty(token.clone())
                }
                None => HolderSet::empty(token.clone()),
            })
            .collect();

        HolderStage {
            sets,
            failures,
            expired: settled.expired,
        }
    }

    /// Largest accounts for a token, resolved to deduplicated owner wallets
    async fn fetch_holder_set(&self, token: &TokenId) -> Result<HolderSet> {
        let largest = self.provider.get_largest_holders(token.as_str()).await?;
        if largest.is_empty() {
            return Ok(HolderSet::empty(token.clone()));
        }

        let accounts: Vec<String> = largest.into_iter().map(|a| a.token_account).collect();
        let owners = self.provider.resolve_owners(&accounts).await?;

        let wallets = accounts
            .iter()
            .filter_map(|account| owners.get(account))
            .map(|owner| WalletAddress::new(owner.as_str()));

        Ok(HolderSet::new(token.clone(), wallets))
    }

    async fn reconstruct_candidates(
        &self,
        candidates: &[CommonWallet],
        tokens: &[TokenId],
        deadline: Instant,
    ) -> ActivityStage {
        let limit = self.config.reconstruction.activity_limit;
        let settled = fan_out(
            candidates,
            self.config.activity_concurrency,
            Duration::from_millis(self.config.item_timeout_ms),
            deadline,
            |candidate| self.fetch_activity(&candidate.wallet, limit),
        )
        .await;

        let filter = LegFilter::for_request(&self.config.reconstruction, tokens);

        let examined = settled.slots.iter().filter(|slot| slot.is_some()).count();
        let mut failures = 0;
        let mut reports = Vec::new();

        for (candidate, slot) in candidates.iter().zip(settled.slots) {
            let wallet = &candidate.wallet;
            match slot {
                Some(ItemOutcome::Ready(records)) => {
                    match reconstruct(wallet, &records, &filter) {
                        Some(report) => reports.push(report),
                        None => debug!(wallet = %wallet.short(), "No classifiable trades"),
                    }
                }
                Some(ItemOutcome::Failed(e)) => {
                    if e.is_provider_failure() {
                        warn!(wallet = %wallet, error = %e, "Activity fetch failed");
                    } else {
                        error!(wallet = %wallet, error = %e, "Unexpected activity fetch error");
                    }
                    failures += 1;
                }
                Some(ItemOutcome::TimedOut) => {
                    warn!(wallet = %wallet, "Activity fetch timed out");
                    failures += 1;
                }
                None => {}
            }
        }

        ActivityStage {
            examined,
            reports,
            failures,
            expired: settled.expired,
        }
    }

    async fn fetch_activity(&self, wallet: &WalletAddress, limit: u32) -> Result<Vec<ActivityRecord>> {
        self.provider.get_wallet_activity(wallet.as_str(), limit).await
    }
}
