//! Symbol universe
//!
//! Ticker validation and the scan universe. Symbols come either from a
//! plain-text file (one per line, `#` comments) or from the built-in
//! large-cap default list. Invalid entries are logged and skipped, never
//! fatal.

use anyhow::{Context, Result};
use itertools::Itertools;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::Symbol;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid ticker format: {0}")]
pub struct InvalidSymbol(pub String);

/// Accepts 1-5 uppercase letters, optionally followed by a dot and a
/// single uppercase class letter (BRK.A style).
pub fn is_valid_symbol(raw: &str) -> bool {
    let symbol = raw.trim();
    let (body, class) = match symbol.split_once('.') {
        Some((body, class)) => (body, Some(class)),
        None => (symbol, None),
    };

    if body.is_empty() || body.len() > 5 || !body.chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }
    match class {
        None => true,
        Some(class) => class.len() == 1 && class.chars().all(|c| c.is_ascii_uppercase()),
    }
}

/// Trim and uppercase the input, then validate it.
pub fn sanitize_symbol(raw: &str) -> Result<Symbol, InvalidSymbol> {
    let cleaned = raw.trim().to_uppercase();
    if !is_valid_symbol(&cleaned) {
        return Err(InvalidSymbol(raw.trim().to_string()));
    }
    Ok(Symbol::new(cleaned))
}

/// Sanitize a batch, splitting it into accepted symbols and the rejects.
pub fn sanitize_symbols<I, S>(raw: I) -> (Vec<Symbol>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for entry in raw {
        match sanitize_symbol(entry.as_ref()) {
            Ok(symbol) => valid.push(symbol),
            Err(InvalidSymbol(rejected)) => invalid.push(rejected),
        }
    }
    (valid, invalid)
}

/// Load the universe from a text file: one symbol per line, blank lines
/// and `#` comments ignored, duplicates collapsed in order of first
/// appearance. Invalid lines are logged and skipped.
pub fn load_universe<P: AsRef<Path>>(path: P) -> Result<Vec<Symbol>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read universe file: {}", path.display()))?;

    let lines: Vec<&str> = raw
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .collect();

    let (valid, invalid) = sanitize_symbols(lines);
    if !invalid.is_empty() {
        warn!(
            "Skipped {} invalid symbols in {}: {:?}",
            invalid.len(),
            path.display(),
            invalid
        );
    }

    let symbols: Vec<Symbol> = valid.into_iter().unique().collect();
    info!("Universe loaded: {} symbols from {}", symbols.len(), path.display());
    Ok(symbols)
}

/// Built-in fallback universe of mega-cap names, all comfortably above
/// the default $50B market-cap floor.
pub fn default_universe() -> Vec<Symbol> {
    const DEFAULT_SYMBOLS: &[&str] = &[
        "AAPL", "MSFT", "NVDA", "GOOGL", "GOOG", "AMZN", "META", "BRK.B", "LLY", "AVGO",
        "TSLA", "JPM", "WMT", "V", "XOM", "UNH", "ORCL", "MA", "PG", "COST",
        "JNJ", "HD", "ABBV", "BAC", "MRK", "NFLX", "CVX", "KO", "AMD", "PEP",
        "CRM", "ADBE", "TMO", "LIN", "WFC", "ACN", "MCD", "CSCO", "ABT", "QCOM",
        "INTU", "IBM", "GE", "CAT", "TXN", "DIS", "AMAT", "VZ", "PFE", "DHR",
        "CMCSA", "NOW", "NEE", "UNP", "PM", "AXP", "SPGI", "COP", "GS", "RTX",
        "LOW", "HON", "T", "BKNG", "UBER", "MS", "ISRG", "ETN", "BLK", "LMT",
    ];
    DEFAULT_SYMBOLS.iter().map(|s| Symbol::new(*s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_valid_symbols() {
        for sym in ["A", "AAPL", "GOOGL", "BRK.A", "BF.B"] {
            assert!(is_valid_symbol(sym), "{} should be valid", sym);
        }
    }

    #[test]
    fn test_invalid_symbols() {
        for sym in ["", "ABCDEF", "APL$", "ABC123", "aapl", "BRK.", "BRK.AB", ".A", "BRK-B"] {
            assert!(!is_valid_symbol(sym), "{} should be invalid", sym);
        }
    }

    #[test]
    fn test_sanitize_normalizes() {
        assert_eq!(sanitize_symbol("  aapl "), Ok(Symbol::new("AAPL")));
        assert_eq!(sanitize_symbol("brk.b"), Ok(Symbol::new("BRK.B")));
        assert_eq!(sanitize_symbol("not a ticker"), Err(InvalidSymbol("not a ticker".to_string())));
    }

    #[test]
    fn test_sanitize_batch_partitions() {
        let (valid, invalid) = sanitize_symbols(["AAPL", "bad$", "msft"]);
        assert_eq!(valid, vec![Symbol::new("AAPL"), Symbol::new("MSFT")]);
        assert_eq!(invalid, vec!["bad$".to_string()]);
    }

    #[test]
    fn test_load_universe_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# large caps").unwrap();
        writeln!(file, "AAPL").unwrap();
        writeln!(file, "msft  # uppercased").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "AAPL").unwrap();
        writeln!(file, "TOOLONGG").unwrap();
        file.flush().unwrap();

        let symbols = load_universe(file.path()).unwrap();
        assert_eq!(symbols, vec![Symbol::new("AAPL"), Symbol::new("MSFT")]);
    }

    #[test]
    fn test_load_universe_missing_file() {
        assert!(load_universe("/nonexistent/universe.txt").is_err());
    }

    #[test]
    fn test_default_universe_is_clean() {
        let universe = default_universe();
        assert!(!universe.is_empty());
        for symbol in &universe {
            assert!(is_valid_symbol(symbol.as_str()), "{} in default list", symbol);
        }
    }
}
