//! CLI subcommands

pub mod confirm;
pub mod download;
pub mod report;
pub mod run;
pub mod scan;
pub mod status;
pub mod watchlist;

use anyhow::Result;
use tracing::warn;

use stock_screener::config::ScreenerConfig;
use stock_screener::types::Symbol;
use stock_screener::universe::{default_universe, load_universe, sanitize_symbols};

/// Load configuration from the given file, or from defaults plus
/// environment overrides when no file is named.
pub(crate) fn load_config(path: Option<String>) -> Result<ScreenerConfig> {
    match path {
        Some(path) => ScreenerConfig::from_file(&path),
        None => Ok(ScreenerConfig::from_env()),
    }
}

/// Resolve the symbols to work on: an explicit comma-separated list wins,
/// otherwise the configured universe.
pub(crate) fn resolve_symbols(
    config: &ScreenerConfig,
    symbols: Option<String>,
) -> Result<Vec<Symbol>> {
    if let Some(list) = symbols {
        let (valid, rejected) = sanitize_symbols(list.split(','));
        for bad in &rejected {
            warn!("Ignoring invalid symbol: {}", bad);
        }
        if valid.is_empty() {
            anyhow::bail!("No valid symbols in the given list");
        }
        return Ok(valid);
    }

    match &config.universe.symbols_file {
        Some(path) => load_universe(path),
        None => Ok(default_universe()),
    }
}
