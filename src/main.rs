//! Smart Money Finder - wallets that hold your tokens and trade them well
//!
//! Intersects the top holders of 2-5 tokens, reconstructs realized P&L
//! for the shared wallets, and reports the ones that clear a win-rate
//! and profit bar.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

// Use the library crate
use smart_money_finder::cli::commands::{self, FindOptions};
use smart_money_finder::config::Config;

/// Smart Money Finder - profitable wallets shared across tokens
#[derive(Parser)]
#[command(name = "smartmoney")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "SMART_MONEY_CONFIG", default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find smart money wallets across 2-5 tokens
    Find {
        /// Token mint addresses
        #[arg(required = true, num_args = 1..)]
        tokens: Vec<String>,

        /// Minimum win rate (0.0 - 1.0)
        #[arg(long)]
        min_win_rate: Option<f64>,

        /// Minimum realized P&L in SOL
        #[arg(long)]
        min_pnl: Option<f64>,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip DexScreener market data
        #[arg(long)]
        no_enrich: bool,
    },

    /// Show current configuration (secrets masked)
    Config,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(
        "smart_money_finder=info"
            .parse()
            .unwrap_or_else(|_| tracing::Level::INFO.into()),
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Find {
            tokens,
            min_win_rate,
            min_pnl,
            output,
            no_enrich,
        } => {
            let options = FindOptions {
                tokens,
                min_win_rate,
                min_pnl,
                output,
                no_enrich,
            };
            commands::find(&config, options).await
        }
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
