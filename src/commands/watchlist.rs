//! Watchlist command - list grace entries and their intake eligibility

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use stock_screener::state::create_store;
use stock_screener::watchlist::{WatchlistDecision, WatchlistTracker};

use super::load_config;

pub fn run(config_path: Option<String>, prune: bool) -> Result<()> {
    let config = load_config(config_path)?;

    let store = Arc::new(create_store(
        &config.state.state_dir,
        config.state.auto_backup,
    )?);
    let watchlist = WatchlistTracker::new(store, config.watchlist.clone());

    if prune {
        let removed = watchlist.prune();
        println!("Pruned {} entries past the retention window", removed);
    }

    let entries = watchlist.grace_entries();
    let today = Utc::now().date_naive();

    println!("\n{}", "=".repeat(60));
    println!("WATCHLIST GRACE ENTRIES");
    println!("{}", "=".repeat(60));

    if entries.is_empty() {
        println!("  No symbols under grace tracking");
    } else {
        println!(
            "  {:<8} {:>12} {:>8}  {}",
            "SYMBOL", "LAST SIGNAL", "SIGNALS", "INTAKE"
        );
        for record in &entries {
            let intake = match watchlist.can_add_on(&record.symbol, today) {
                WatchlistDecision::Eligible => "eligible".to_string(),
                WatchlistDecision::InGracePeriod {
                    business_days,
                    grace_days,
                } => format!("grace {}/{} business days", business_days, grace_days),
            };
            println!(
                "  {:<8} {:>12} {:>8}  {}",
                record.symbol.as_str(),
                record.last_signal.to_string(),
                record.signal_count,
                intake
            );
        }
    }

    println!("{}", "=".repeat(60));
    Ok(())
}
