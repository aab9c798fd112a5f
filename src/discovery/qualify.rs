//! Qualification filter and ranking

use serde::{Deserialize, Serialize};

use crate::discovery::types::WalletPnLReport;
use crate::error::{Error, Result};

/// Win rate / P&L thresholds a wallet must meet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum fraction of bought-into positions closed in profit (0.0 - 1.0)
    pub min_win_rate: f64,
    /// Minimum realized P&L in native units
    pub min_pnl: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_win_rate: 0.60,
            min_pnl: 10.0,
        }
    }
}

impl Thresholds {
    pub fn new(min_win_rate: f64, min_pnl: f64) -> Result<Self> {
        let thresholds = Self {
            min_win_rate,
            min_pnl,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_win_rate) {
            return Err(Error::InvalidThreshold(format!(
                "min_win_rate must be between 0 and 1, got {}",
                self.min_win_rate
            )));
        }
        if !self.min_pnl.is_finite() {
            return Err(Error::InvalidThreshold(format!(
                "min_pnl must be finite, got {}",
                self.min_pnl
            )));
        }
        Ok(())
    }

    pub fn passes(&self, report: &WalletPnLReport) -> bool {
        report.win_rate >= self.min_win_rate && report.realized_pnl >= self.min_pnl
    }
}

/// Keep reports meeting both thresholds, best realized P&L first.
///
/// Ties keep input order.
pub fn qualify_and_rank(reports: Vec<WalletPnLReport>, thresholds: &Thresholds) -> Vec<WalletPnLReport> {
    let mut qualified: Vec<WalletPnLReport> = reports
        .into_iter()
        .filter(|report| thresholds.passes(report))
        .collect();

    qualified.sort_by(|a, b| b.realized_pnl.total_cmp(&a.realized_pnl));
    qualified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::types::WalletAddress;

    fn report(wallet: &str, pnl: f64, win_rate: f64) -> WalletPnLReport {
        WalletPnLReport {
            wallet: WalletAddress::from(wallet),
            realized_pnl: pnl,
            win_rate,
            wins: 0,
            positions: Vec::new(),
            trade_count: 1,
            last_trade_at: None,
        }
    }

    fn wallets(reports: &[WalletPnLReport]) -> Vec<&str> {
        reports.iter().map(|r| r.wallet.as_str()).collect()
    }

    #[test]
    fn test_threshold_boundaries_are_inclusive() {
        let thresholds = Thresholds::default();
        assert!(thresholds.passes(&report("a", 10.0, 0.60)));
        assert!(!thresholds.passes(&report("b", 9.99, 0.9)));
        assert!(!thresholds.passes(&report("c", 50.0, 0.59)));
    }

    #[test]
    fn test_round_trip_wallet_needs_lower_pnl_threshold() {
        let wallet = report("w", 4.0, 1.0);
        assert!(qualify_and_rank(vec![wallet.clone()], &Thresholds::default()).is_empty());

        let lowered = Thresholds::new(0.60, 3.0).unwrap();
        assert_eq!(qualify_and_rank(vec![wallet], &lowered).len(), 1);
    }

    #[test]
    fn test_sorted_descending_with_stable_ties() {
        let reports = vec![
            report("a", 12.0, 0.7),
            report("b", 40.0, 0.8),
            report("c", 12.0, 0.9),
            report("d", 100.0, 0.1),
            report("e", 25.0, 1.0),
        ];
        let ranked = qualify_and_rank(reports, &Thresholds::default());

        assert_eq!(wallets(&ranked), vec!["b", "e", "a", "c"]);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].realized_pnl >= pair[1].realized_pnl));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(Thresholds::new(1.5, 10.0).is_err());
        assert!(Thresholds::new(-0.1, 10.0).is_err());
        assert!(Thresholds::new(0.5, f64::NAN).is_err());
        assert!(Thresholds::new(0.0, -5.0).is_ok());
    }
}
