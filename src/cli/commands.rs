//! CLI command implementations

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::discovery::{MarketEnricher, Report, SmartMoneyFinder, Thresholds};
use crate::provider::DexScreenerClient;

/// Options for the `find` command
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub tokens: Vec<String>,
    pub min_win_rate: Option<f64>,
    pub min_pnl: Option<f64>,
    pub output: Option<PathBuf>,
    pub no_enrich: bool,
}

impl FindOptions {
    /// Flags override the configured thresholds
    pub fn thresholds(&self, config: &Config) -> Result<Thresholds> {
        let defaults = config.discovery.thresholds();
        let thresholds = Thresholds::new(
            self.min_win_rate.unwrap_or(defaults.min_win_rate),
            self.min_pnl.unwrap_or(defaults.min_pnl),
        )?;
        Ok(thresholds)
    }
}

/// Find smart money wallets and print the JSON report
pub async fn find(config: &Config, options: FindOptions) -> Result<()> {
    let thresholds = options.thresholds(config)?;

    let helius = config
        .helius
        .build_client()
        .context("Helius API key required (set HELIUS_API_KEY or helius.api_key)")?;

    let mut finder = SmartMoneyFinder::new(Arc::new(helius), config.discovery.clone());

    if config.enrichment.enabled && !options.no_enrich {
        let dexscreener = DexScreenerClient::with_base_url(
            &config.enrichment.base_url,
            Duration::from_millis(config.enrichment.timeout_ms),
        )
        .context("Failed to create DexScreener client")?;
        finder = finder.with_enricher(MarketEnricher::new(
            Arc::new(dexscreener),
            config.enrichment.clone(),
        ));
    }

    info!(
        tokens = options.tokens.len(),
        min_win_rate = %format!("{:.0}%", thresholds.min_win_rate * 100.0),
        min_pnl = thresholds.min_pnl,
        "Starting smart money search"
    );

    let report = finder.find(options.tokens.as_slice(), thresholds).await?;
    log_summary(&report);

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);

    if let Some(path) = &options.output {
        tokio::fs::write(path, &json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }

    Ok(())
}

fn log_summary(report: &Report) {
    if report.partial {
        warn!("Report is partial: request deadline expired before all wallets were analyzed");
    }

    info!(
        status = ?report.status,
        common = report.total_common_wallets,
        analyzed = report.candidates_examined,
        qualified = report.total_qualified,
        "{}",
        report.status.describe()
    );

    for (rank, wallet) in report.qualified_wallets.iter().enumerate() {
        info!(
            rank = rank + 1,
            wallet = %wallet.pnl.wallet,
            pnl = %format!("{:+.2} SOL", wallet.pnl.realized_pnl),
            win_rate = %format!("{:.0}%", wallet.pnl.win_rate * 100.0),
            tokens_held = wallet.held_tokens.len(),
            positions = wallet.pnl.total_positions(),
            open = wallet.pnl.open_holdings().count(),
            "Smart money wallet"
        );
    }
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
