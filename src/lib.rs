//! Smart Money Finder Library
//!
//! Finds wallets that hold several of a given set of Solana tokens and
//! ranks them by realized trading profit.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod provider;

// Re-export commonly used types
pub use config::Config;
pub use discovery::{Report, SmartMoneyFinder, Thresholds};
pub use error::{Error, Result};
