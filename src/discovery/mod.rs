//! Smart money discovery
//!
//! Turns a handful of token addresses into a ranked list of wallets that
//! hold several of them and have traded profitably.

pub mod enrichment;
pub mod finder;
pub mod intersection;
pub mod qualify;
pub mod reconstructor;
pub mod report;
pub mod types;

pub use enrichment::{EnrichmentConfig, MarketEnricher};
pub use finder::{DiscoveryConfig, SmartMoneyFinder};
pub use intersection::{find_intersection, ExclusionSet};
pub use qualify::{qualify_and_rank, Thresholds};
pub use reconstructor::{reconstruct, LegFilter, ReconstructorConfig};
pub use report::{Report, ReportStatus, TokenMarketInfo};
pub use types::{
    CommonWallet, HolderSet, PositionSummary, QualifiedWallet, TokenId, WalletAddress,
    WalletPnLReport,
};
