//! Offline OHLCV data handling
//!
//! CSV load/save of daily bars, so batch scans can run against downloaded
//! data without touching the provider. The download command writes these
//! files; `scan --data-dir` reads them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::{Candle, Symbol};

/// Chart intervals the screener works with
pub const INTERVALS: &[&str] = &["1d", "1wk"];

// =============================================================================
// CSV Loading
// =============================================================================

/// Load OHLCV bars from a CSV file with a
/// `datetime,open,high,low,close,volume` header.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path.as_ref())
        .with_context(|| format!("Failed to open CSV file: {}", path.as_ref().display()))?;

    let mut candles = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let datetime = dt_str
            .parse::<DateTime<Utc>>()
            .or_else(|_| {
                // Accept naive timestamps and assume UTC
                chrono::NaiveDateTime::parse_from_str(dt_str, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            })
            .context(format!("Failed to parse datetime: {}", dt_str))?;

        let open: f64 = record
            .get(1)
            .context("Missing open column")?
            .parse()
            .context("Failed to parse open")?;
        let high: f64 = record
            .get(2)
            .context("Missing high column")?
            .parse()
            .context("Failed to parse high")?;
        let low: f64 = record
            .get(3)
            .context("Missing low column")?
            .parse()
            .context("Failed to parse low")?;
        let close: f64 = record
            .get(4)
            .context("Missing close column")?
            .parse()
            .context("Failed to parse close")?;
        let volume: f64 = record
            .get(5)
            .context("Missing volume column")?
            .parse()
            .context("Failed to parse volume")?;

        let candle = Candle::new(datetime, open, high, low, close, volume)
            .with_context(|| format!("Invalid candle at row {}", row_idx + 1))?;
        candles.push(candle);
    }

    Ok(candles)
}

/// Load bars for multiple symbols from `{symbol}_{interval}.csv` files.
/// Missing files are logged and skipped; loading nothing at all is an error.
pub fn load_multi_symbol(
    data_dir: impl AsRef<Path>,
    symbols: &[Symbol],
    interval: &str,
) -> Result<HashMap<Symbol, Vec<Candle>>> {
    let mut data = HashMap::new();

    for symbol in symbols {
        let filename = format!("{}_{}.csv", symbol.as_str(), interval);
        let path = data_dir.as_ref().join(&filename);

        if !path.exists() {
            warn!("Data file not found: {}", path.display());
            continue;
        }

        let candles = load_csv(&path).context(format!("Failed to load data for {}", symbol))?;

        info!("Loaded {} candles for {}", candles.len(), symbol);
        data.insert(symbol.clone(), candles);
    }

    if data.is_empty() {
        anyhow::bail!("No data loaded for any symbol");
    }

    Ok(data)
}

// =============================================================================
// CSV Saving
// =============================================================================

/// Save bars to a CSV file, creating parent directories as needed.
pub fn save_to_csv(candles: &[Candle], path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    writeln!(file, "datetime,open,high,low,close,volume")?;

    for candle in candles {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            candle.datetime.format("%Y-%m-%d %H:%M:%S"),
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume
        )?;
    }

    info!("Saved {} rows to {}", candles.len(), path.display());
    Ok(path.to_path_buf())
}

// =============================================================================
// Series Hygiene
// =============================================================================

/// Sort bars oldest-first and drop duplicate timestamps.
pub fn normalize_series(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.datetime);
    candles.dedup_by_key(|c| c.datetime);
    candles
}

/// Series-level sanity check result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a bar series for ordering and per-candle consistency.
pub fn validate_series(candles: &[Candle]) -> ValidationResult {
    let mut result = ValidationResult::default();

    if candles.is_empty() {
        result.errors.push("No candles provided".to_string());
        return result;
    }

    for (i, candle) in candles.iter().enumerate() {
        if let Err(e) = candle.validate() {
            result.errors.push(format!("Candle {}: {}", i, e));
        }
    }

    for (i, pair) in candles.windows(2).enumerate() {
        if pair[1].datetime < pair[0].datetime {
            result
                .errors
                .push(format!("Candles out of order at index {}", i + 1));
        } else if pair[1].datetime == pair[0].datetime {
            result
                .warnings
                .push(format!("Duplicate timestamp at index {}", i + 1));
        }
    }

    result
}
