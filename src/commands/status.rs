//! Status command - admission state, candidate queue and cache statistics

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use stock_screener::cache::MarketCapCache;
use stock_screener::state::create_store;
use stock_screener::tracker::AlertTracker;

use super::load_config;

pub fn run(config_path: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;

    // Read-only view, no backup churn
    let store = Arc::new(create_store(&config.state.state_dir, false)?);
    let tracker = AlertTracker::new(store.clone(), config.alerts.clone());
    let cache = MarketCapCache::new(store.clone(), config.data.cache_ttl_hours);
    let now = Utc::now();

    println!("\n{}", "=".repeat(60));
    println!("SCREENER STATUS");
    println!("{}", "=".repeat(60));

    println!(
        "  Alerts today:       {}/{}",
        tracker.alerts_sent_today(),
        config.alerts.daily_limit
    );

    let cooldowns = tracker.active_cooldowns_at(now);
    if cooldowns.is_empty() {
        println!("  Active cooldowns:   none");
    } else {
        println!("  Active cooldowns:");
        for (symbol, days_left) in cooldowns {
            println!("    • {} ({} days left)", symbol, days_left);
        }
    }

    let pending = store.pending_candidates()?;
    if pending.is_empty() {
        println!("  Pending candidates: none");
    } else {
        println!("  Pending candidates:");
        for candidate in &pending {
            println!("    • {} (queued {})", candidate.symbol, candidate.queued_at);
        }
    }

    let cache_stats = cache.stats();
    println!(
        "  Market cap cache:   {}/{} entries fresh",
        cache_stats.fresh, cache_stats.total
    );

    let stats = tracker.signal_stats(None)?;
    println!(
        "  Signals recorded:   {} ({} evaluated, {} pending)",
        stats.total, stats.evaluated, stats.pending
    );
    if let (Some(avg), Some(win)) = (stats.avg_return, stats.win_rate) {
        println!("  Avg return:         {:+.2}%  |  Win rate: {:.1}%", avg, win);
    }
    if let Some((symbol, pct)) = &stats.best {
        println!("  Best:               {} {:+.2}%", symbol, pct);
    }
    if let Some((symbol, pct)) = &stats.worst {
        println!("  Worst:              {} {:+.2}%", symbol, pct);
    }

    println!("{}", "=".repeat(60));
    Ok(())
}
