//! Trade Reconstructor - realized P&L from a wallet's activity feed
//!
//! Classifies each token leg of each transaction as a buy or a sell from
//! the sign of the wallet's native balance change:
//! - BUY: the wallet receives the token and its native balance drops
//! - SELL: the wallet sends the token and its native balance rises
//!
//! Anything else (plain transfers, airdrops, odd multi-leg swaps) is
//! ignored. When a transaction carries several matching legs, each leg is
//! credited with the full native delta, so multi-hop swaps can be
//! misattributed. This is a known accuracy limit of the heuristic.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::discovery::types::{
    PositionSummary, TokenId, TokenPosition, TradeDirection, TransferEvent, WalletAddress,
    WalletPnLReport,
};
use crate::provider::{ActivityRecord, TokenLeg};

/// Wrapped SOL mint
pub const WRAPPED_NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Configuration for trade reconstruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructorConfig {
    /// Number of recent activity records to analyze
    #[serde(default = "default_activity_limit")]
    pub activity_limit: u32,

    /// Only classify legs for the requested tokens
    #[serde(default)]
    pub restrict_to_requested_tokens: bool,

    /// Treat wrapped SOL legs as settlement rather than positions
    #[serde(default)]
    pub skip_wrapped_native: bool,
}

fn default_activity_limit() -> u32 {
    50
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            activity_limit: default_activity_limit(),
            restrict_to_requested_tokens: false,
            skip_wrapped_native: false,
        }
    }
}

/// Which token legs take part in classification
#[derive(Debug, Clone, Default)]
pub struct LegFilter {
    /// Only these tokens, when present
    pub tokens: Option<HashSet<TokenId>>,
    pub skip_wrapped_native: bool,
}

impl LegFilter {
    /// Filter for one request against the given tokens
    pub fn for_request(config: &ReconstructorConfig, requested: &[TokenId]) -> Self {
        Self {
            tokens: config
                .restrict_to_requested_tokens
                .then(|| requested.iter().cloned().collect()),
            skip_wrapped_native: config.skip_wrapped_native,
        }
    }

    fn admits(&self, leg: &TokenLeg) -> bool {
        if leg.mint.is_empty() || leg.amount == 0.0 || !leg.amount.is_finite() {
            return false;
        }
        if self.skip_wrapped_native && leg.mint == WRAPPED_NATIVE_MINT {
            return false;
        }
        match &self.tokens {
            Some(tokens) => tokens.contains(&TokenId::new(leg.mint.as_str())),
            None => true,
        }
    }
}

/// Classify raw activity records into buy/sell events for `wallet`.
///
/// Legs rejected by `filter` are skipped.
pub fn classify_activity(
    wallet: &WalletAddress,
    records: &[ActivityRecord],
    filter: &LegFilter,
) -> Vec<TransferEvent> {
    let mut events = Vec::new();

    for record in records {
        let delta = record.native_delta;
        if delta == 0.0 || !delta.is_finite() {
            continue;
        }

        for leg in &record.token_legs {
            if !filter.admits(leg) {
                continue;
            }

            let token = TokenId::new(leg.mint.as_str());
            let received = leg.to_owner.as_deref() == Some(wallet.as_str());
            let sent = leg.from_owner.as_deref() == Some(wallet.as_str());

            let direction = if received && delta < 0.0 {
                TradeDirection::Buy
            } else if sent && delta > 0.0 {
                TradeDirection::Sell
            } else {
                continue;
            };

            events.push(TransferEvent {
                wallet: wallet.clone(),
                token,
                direction,
                native_amount: delta.abs(),
                token_qty: leg.amount.abs(),
                timestamp: record.timestamp,
                signature: record.signature.clone(),
            });
        }
    }

    events
}

/// Replay classified events into a wallet P&L report.
///
/// Returns `None` when there is nothing to replay. Events are replayed
/// oldest first; events without a timestamp keep their relative order.
pub fn replay_events(wallet: &WalletAddress, events: &[TransferEvent]) -> Option<WalletPnLReport> {
    if events.is_empty() {
        return None;
    }

    let mut ordered: Vec<&TransferEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.timestamp);

    let mut token_order: Vec<TokenId> = Vec::new();
    let mut positions: HashMap<TokenId, TokenPosition> = HashMap::new();

    for event in &ordered {
        let position = positions.entry(event.token.clone()).or_insert_with(|| {
            token_order.push(event.token.clone());
            TokenPosition::new(event.token.clone())
        });
        position.apply(event);
    }

    // Positions with no buy have no cost basis and stay out of P&L
    let mut summaries: Vec<PositionSummary> = token_order
        .iter()
        .filter_map(|token| positions.get(token))
        .filter(|position| position.has_buy())
        .map(PositionSummary::from)
        .collect();

    let realized_pnl: f64 = summaries.iter().map(|p| p.realized_pnl).sum();
    let wins = summaries.iter().filter(|p| p.win).count() as u32;
    let win_rate = if summaries.is_empty() {
        0.0
    } else {
        wins as f64 / summaries.len() as f64
    };

    summaries.sort_by(|a, b| b.realized_pnl.total_cmp(&a.realized_pnl));

    let last_trade_at = events.iter().filter_map(|event| event.timestamp).max();

    Some(WalletPnLReport {
        wallet: wallet.clone(),
        realized_pnl,
        win_rate,
        wins,
        positions: summaries,
        trade_count: events.len() as u32,
        last_trade_at,
    })
}

/// Classify and replay in one step
pub fn reconstruct(
    wallet: &WalletAddress,
    records: &[ActivityRecord],
    filter: &LegFilter,
) -> Option<WalletPnLReport> {
    let events = classify_activity(wallet, records, filter);

    debug!(
        wallet = %wallet.short(),
        records = records.len(),
        events = events.len(),
        "Classified wallet activity"
    );

    let report = replay_events(wallet, &events)?;

    debug!(
        wallet = %wallet.short(),
        pnl = %format!("{:+.4}", report.realized_pnl),
        win_rate = %format!("{:.1}%", report.win_rate * 100.0),
        positions = report.positions.len(),
        trades = report.trade_count,
        "Reconstructed wallet P&L"
    );

    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TokenLeg;
    use chrono::{DateTime, Utc};

    const WALLET: &str = "WalletWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWW";
    const POOL: &str = "PoolPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPP";

    fn ts(secs: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
    }

    fn buy(mint: &str, cost: f64, qty: f64, at: i64) -> ActivityRecord {
        ActivityRecord {
            signature: format!("buy-{}-{}", mint, at),
            timestamp: ts(at),
            native_delta: -cost,
            token_legs: vec![TokenLeg {
                mint: mint.to_string(),
                from_owner: Some(POOL.to_string()),
                to_owner: Some(WALLET.to_string()),
                amount: qty,
            }],
        }
    }

    fn sell(mint: &str, proceeds: f64, qty: f64, at: i64) -> ActivityRecord {
        ActivityRecord {
            signature: format!("sell-{}-{}", mint, at),
            timestamp: ts(at),
            native_delta: proceeds,
            token_legs: vec![TokenLeg {
                mint: mint.to_string(),
                from_owner: Some(WALLET.to_string()),
                to_owner: Some(POOL.to_string()),
                amount: qty,
            }],
        }
    }

    fn wallet() -> WalletAddress {
        WalletAddress::from(WALLET)
    }

    #[test]
    fn test_single_round_trip() {
        // Feed is newest first
        let records = vec![sell("T1", 6.0, 50.0, 200), buy("T1", 2.0, 50.0, 100)];
        let report = reconstruct(&wallet(), &records, &LegFilter::default()).unwrap();

        assert_eq!(report.positions.len(), 1);
        let position = &report.positions[0];
        assert_eq!(position.token.as_str(), "T1");
        assert_eq!(position.bought_native, 2.0);
        assert_eq!(position.sold_native, 6.0);
        assert!((position.realized_pnl - 4.0).abs() < 1e-9);
        assert!(position.win);
        assert_eq!(position.holding_qty, 0.0);

        assert_eq!(report.win_rate, 1.0);
        assert!((report.realized_pnl - 4.0).abs() < 1e-9);
        assert_eq!(report.trade_count, 2);
        assert_eq!(report.last_trade_at, ts(200));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let records = vec![
            buy("T1", 1.0, 10.0, 1),
            buy("T2", 3.0, 30.0, 2),
            sell("T1", 2.5, 10.0, 3),
            sell("T2", 1.0, 15.0, 4),
        ];
        let events = classify_activity(&wallet(), &records, &LegFilter::default());

        let first = replay_events(&wallet(), &events);
        let second = replay_events(&wallet(), &events);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unclassifiable_activity_is_insufficient_data() {
        let airdrop = ActivityRecord {
            signature: "airdrop".into(),
            timestamp: ts(1),
            native_delta: 0.0,
            token_legs: vec![TokenLeg {
                mint: "T1".into(),
                from_owner: Some(POOL.into()),
                to_owner: Some(WALLET.into()),
                amount: 100.0,
            }],
        };
        // Receives tokens while native balance rises: matches neither pattern
        let mut odd = buy("T2", 1.0, 5.0, 2);
        odd.native_delta = 1.0;

        assert!(reconstruct(&wallet(), &[airdrop, odd], &LegFilter::default()).is_none());
        assert!(reconstruct(&wallet(), &[], &LegFilter::default()).is_none());
    }

    #[test]
    fn test_sell_only_position_excluded_from_win_rate() {
        let records = vec![
            buy("T1", 1.0, 10.0, 1),
            sell("T1", 3.0, 10.0, 2),
            sell("T2", 50.0, 10.0, 3),
        ];
        let report = reconstruct(&wallet(), &records, &LegFilter::default()).unwrap();

        assert_eq!(report.positions.len(), 1);
        assert_eq!(report.win_rate, 1.0);
        assert!((report.realized_pnl - 2.0).abs() < 1e-9);
        assert_eq!(report.trade_count, 3);
    }

    #[test]
    fn test_sell_only_wallet_has_zero_win_rate() {
        let report = reconstruct(&wallet(), &[sell("T1", 5.0, 1.0, 1)], &LegFilter::default()).unwrap();
        assert!(report.positions.is_empty());
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.realized_pnl, 0.0);
    }

    #[test]
    fn test_buy_only_position_counts_as_loss() {
        let records = vec![
            buy("T1", 1.0, 10.0, 1),
            sell("T1", 4.0, 10.0, 2),
            buy("T2", 2.0, 20.0, 3),
        ];
        let report = reconstruct(&wallet(), &records, &LegFilter::default()).unwrap();

        assert_eq!(report.positions.len(), 2);
        assert_eq!(report.wins, 1);
        assert_eq!(report.win_rate, 0.5);
        assert!((report.realized_pnl - 1.0).abs() < 1e-9);

        // Best position first; the open one still shows its holding
        assert_eq!(report.positions[0].token.as_str(), "T1");
        assert_eq!(report.positions[1].holding_qty, 20.0);
        assert_eq!(report.open_holdings().count(), 1);
    }

    #[test]
    fn test_holding_clamped_with_chronological_replay() {
        // Newest first in the feed; oldest first in replay
        let records = vec![
            sell("T1", 2.0, 80.0, 3),
            sell("T1", 2.0, 60.0, 2),
            buy("T1", 1.0, 100.0, 1),
        ];
        let report = reconstruct(&wallet(), &records, &LegFilter::default()).unwrap();
        let position = &report.positions[0];

        assert_eq!(position.sold_qty, 140.0);
        assert_eq!(position.holding_qty, 0.0);
    }

    fn wrap_native(amount: f64, at: i64) -> ActivityRecord {
        ActivityRecord {
            signature: format!("wrap-{}", at),
            timestamp: ts(at),
            native_delta: -amount,
            token_legs: vec![TokenLeg {
                mint: WRAPPED_NATIVE_MINT.into(),
                from_owner: None,
                to_owner: Some(WALLET.into()),
                amount,
            }],
        }
    }

    #[test]
    fn test_empty_and_zero_legs_ignored() {
        let mut record = buy("T1", 1.0, 10.0, 1);
        record.token_legs.push(TokenLeg {
            mint: String::new(),
            from_owner: Some(POOL.into()),
            to_owner: Some(WALLET.into()),
            amount: 1.0,
        });
        record.token_legs.push(TokenLeg {
            mint: "T3".into(),
            from_owner: Some(POOL.into()),
            to_owner: Some(WALLET.into()),
            amount: 0.0,
        });

        let events = classify_activity(&wallet(), &[record], &LegFilter::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].token.as_str(), "T1");
    }

    #[test]
    fn test_wrapping_native_counts_as_buy_position() {
        let records = vec![
            sell("T1", 15.0, 50.0, 3),
            buy("T1", 2.0, 50.0, 2),
            wrap_native(1.0, 1),
        ];
        let report = reconstruct(&wallet(), &records, &LegFilter::default()).unwrap();

        assert_eq!(report.positions.len(), 2);
        assert_eq!(report.win_rate, 0.5);
        assert!((report.realized_pnl - 12.0).abs() < 1e-9);

        let wrapped = report
            .positions
            .iter()
            .find(|p| p.token.as_str() == WRAPPED_NATIVE_MINT)
            .unwrap();
        assert_eq!(wrapped.bought_native, 1.0);
        assert!(!wrapped.win);
    }

    #[test]
    fn test_wrapped_native_skipped_when_configured() {
        let config = ReconstructorConfig {
            skip_wrapped_native: true,
            ..Default::default()
        };
        let filter = LegFilter::for_request(&config, &[]);
        let records = vec![
            sell("T1", 15.0, 50.0, 3),
            buy("T1", 2.0, 50.0, 2),
            wrap_native(1.0, 1),
        ];
        let report = reconstruct(&wallet(), &records, &filter).unwrap();

        assert_eq!(report.positions.len(), 1);
        assert_eq!(report.win_rate, 1.0);
        assert!((report.realized_pnl - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_multi_leg_applies_full_delta_to_each_leg() {
        let mut record = buy("T1", 2.0, 10.0, 1);
        record.token_legs.push(TokenLeg {
            mint: "T2".into(),
            from_owner: Some(POOL.into()),
            to_owner: Some(WALLET.into()),
            amount: 5.0,
        });

        let events = classify_activity(&wallet(), &[record], &LegFilter::default());
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.native_amount == 2.0));
    }

    #[test]
    fn test_scope_restricts_tokens() {
        let config = ReconstructorConfig {
            restrict_to_requested_tokens: true,
            ..Default::default()
        };
        let filter = LegFilter::for_request(&config, &[TokenId::from("T1")]);
        let records = vec![buy("T1", 1.0, 10.0, 1), buy("T9", 1.0, 10.0, 2)];

        let events = classify_activity(&wallet(), &records, &filter);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].token.as_str(), "T1");
    }
}
