//! Core types for smart money discovery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token mint address (opaque to the engine)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

/// Wallet (account owner) address
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(pub String);

macro_rules! address_newtype {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Shortened form for log lines (`ABCDEFGH...wxyz`)
            pub fn short(&self) -> String {
                let s = self.0.as_str();
                if s.len() <= 12 || !s.is_ascii() {
                    return s.to_string();
                }
                format!("{}...{}", &s[..8], &s[s.len() - 4..])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

address_newtype!(TokenId);
address_newtype!(WalletAddress);

/// Top holders of one token, deduplicated, largest first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HolderSet {
    pub token: TokenId,
    pub holders: Vec<WalletAddress>,
}

impl HolderSet {
    /// Build a holder set, keeping the first occurrence of each wallet
    pub fn new(token: TokenId, wallets: impl IntoIterator<Item = WalletAddress>) -> Self {
        let mut holders: Vec<WalletAddress> = Vec::new();
        for wallet in wallets {
            if !holders.contains(&wallet) {
                holders.push(wallet);
            }
        }
        Self { token, holders }
    }

    pub fn empty(token: TokenId) -> Self {
        Self {
            token,
            holders: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

/// Wallet found in the holder sets of several requested tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonWallet {
    pub wallet: WalletAddress,
    /// Requested tokens held, in request order
    pub tokens: Vec<TokenId>,
}

/// Direction of a classified trade leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// A single buy or sell leg derived from a wallet's activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub wallet: WalletAddress,
    pub token: TokenId,
    pub direction: TradeDirection,
    /// Native currency paid (buy) or received (sell), always positive
    pub native_amount: f64,
    /// Token quantity received (buy) or sent (sell), always positive
    pub token_qty: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub signature: String,
}

/// Running ledger for one wallet x token pair
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenPosition {
    pub token: TokenId,
    pub bought_native: f64,
    pub sold_native: f64,
    pub bought_qty: f64,
    pub sold_qty: f64,
    /// Never negative: sells beyond known buys clamp at zero
    pub holding_qty: f64,
    pub buy_count: u32,
    pub sell_count: u32,
}

impl TokenPosition {
    pub fn new(token: TokenId) -> Self {
        Self {
            token,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, event: &TransferEvent) {
        match event.direction {
            TradeDirection::Buy => {
                self.bought_native += event.native_amount;
                self.bought_qty += event.token_qty;
                self.holding_qty += event.token_qty;
                self.buy_count += 1;
            }
            TradeDirection::Sell => {
                self.sold_native += event.native_amount;
                self.sold_qty += event.token_qty;
                self.holding_qty = (self.holding_qty - event.token_qty).max(0.0);
                self.sell_count += 1;
            }
        }
    }

    pub fn has_buy(&self) -> bool {
        self.buy_count > 0
    }

    pub fn realized_pnl(&self) -> f64 {
        self.sold_native - self.bought_native
    }

    pub fn roi_pct(&self) -> f64 {
        if self.bought_native > 0.0 {
            self.realized_pnl() / self.bought_native * 100.0
        } else {
            0.0
        }
    }

    pub fn is_win(&self) -> bool {
        self.realized_pnl() > 0.0
    }
}

/// Per-token line of a wallet report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub token: TokenId,
    pub bought_native: f64,
    pub sold_native: f64,
    pub bought_qty: f64,
    pub sold_qty: f64,
    pub holding_qty: f64,
    pub realized_pnl: f64,
    pub roi_pct: f64,
    pub win: bool,
}

impl From<&TokenPosition> for PositionSummary {
    fn from(position: &TokenPosition) -> Self {
        Self {
            token: position.token.clone(),
            bought_native: position.bought_native,
            sold_native: position.sold_native,
            bought_qty: position.bought_qty,
            sold_qty: position.sold_qty,
            holding_qty: position.holding_qty,
            realized_pnl: position.realized_pnl(),
            roi_pct: position.roi_pct(),
            win: position.is_win(),
        }
    }
}

/// Reconstructed realized PnL for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPnLReport {
    pub wallet: WalletAddress,
    /// Sum of (sold - bought) over positions with at least one buy
    pub realized_pnl: f64,
    /// wins / positions with at least one buy
    pub win_rate: f64,
    pub wins: u32,
    /// Positions with at least one buy, best realized PnL first
    pub positions: Vec<PositionSummary>,
    /// Classified buy and sell legs
    pub trade_count: u32,
    pub last_trade_at: Option<DateTime<Utc>>,
}

impl WalletPnLReport {
    pub fn total_positions(&self) -> usize {
        self.positions.len()
    }

    /// Tokens still held according to the replayed window
    pub fn open_holdings(&self) -> impl Iterator<Item = &PositionSummary> {
        self.positions.iter().filter(|p| p.holding_qty > 0.0)
    }
}

/// Wallet that passed the qualification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedWallet {
    #[serde(flatten)]
    pub pnl: WalletPnLReport,
    pub held_tokens: Vec<TokenId>,
}
