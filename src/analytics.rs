//! Scan analytics
//!
//! Per-cycle scan statistics recorded to the store and rolled up into a
//! weekly report. Analytics never gate anything; failures to record are
//! logged and swallowed so they cannot interrupt a scan cycle.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::state::{ScanRecord, SignalRecord, SqliteStore};
use crate::types::Symbol;

const REPORT_INTERVAL_DAYS: i64 = 7;
const LAST_REPORT_KEY: &str = "last_report_date";
const TOP_PERFORMERS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    StageOne,
    StageTwo,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStage::StageOne => write!(f, "stage1"),
            ScanStage::StageTwo => write!(f, "stage2"),
        }
    }
}

/// Per-symbol alert performance, aggregated over the full signal history
#[derive(Debug, Clone)]
pub struct SymbolPerformance {
    pub symbol: Symbol,
    pub evaluated: usize,
    pub avg_return: f64,
    pub win_rate: f64,
}

pub struct ScanAnalytics {
    store: Arc<SqliteStore>,
}

impl ScanAnalytics {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    pub fn record_cycle(
        &self,
        stage: ScanStage,
        scanned: u32,
        passed: u32,
        signals: u32,
        alerts_sent: u32,
        duration_secs: f64,
    ) {
        self.record_cycle_at(stage, scanned, passed, signals, alerts_sent, duration_secs, Utc::now());
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_cycle_at(
        &self,
        stage: ScanStage,
        scanned: u32,
        passed: u32,
        signals: u32,
        alerts_sent: u32,
        duration_secs: f64,
        now: DateTime<Utc>,
    ) {
        let record = ScanRecord {
            id: None,
            stage: stage.to_string(),
            scanned,
            passed,
            signals,
            alerts_sent,
            duration_secs,
            created_at: now,
        };
        if let Err(e) = self.store.record_scan(&record) {
            warn!("Failed to record scan statistics: {:#}", e);
        }
    }

    /// True when no report has gone out in the last seven days.
    pub fn should_send_weekly_report(&self) -> Result<bool> {
        self.should_send_weekly_report_at(Utc::now())
    }

    pub fn should_send_weekly_report_at(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(raw) = self.store.get_meta(LAST_REPORT_KEY)? else {
            return Ok(true);
        };
        let last = DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| {
                warn!("Unreadable last report date {:?}, sending report", raw);
                now - Duration::days(REPORT_INTERVAL_DAYS)
            });
        Ok((now - last).num_days() >= REPORT_INTERVAL_DAYS)
    }

    pub fn mark_report_sent(&self) -> Result<()> {
        self.mark_report_sent_at(Utc::now())
    }

    pub fn mark_report_sent_at(&self, now: DateTime<Utc>) -> Result<()> {
        self.store.set_meta(LAST_REPORT_KEY, &now.to_rfc3339())
    }

    /// Per-symbol performance over all evaluated alerts, best first.
    pub fn symbol_performance(&self) -> Result<Vec<SymbolPerformance>> {
        let signals = self.store.load_signals()?;
        Ok(aggregate_performance(&signals))
    }

    pub fn weekly_report(&self) -> Result<String> {
        self.weekly_report_at(Utc::now())
    }

    /// Roll the last seven days of scan cycles and the full signal history
    /// into the weekly report.
    pub fn weekly_report_at(&self, now: DateTime<Utc>) -> Result<String> {
        let since = now - Duration::days(REPORT_INTERVAL_DAYS);
        let scans = self.store.recent_scans(since)?;
        let signals = self.store.load_signals()?;

        let stage1: Vec<&ScanRecord> =
            scans.iter().filter(|r| r.stage == "stage1").collect();
        let stage2: Vec<&ScanRecord> =
            scans.iter().filter(|r| r.stage == "stage2").collect();

        let alerted: Vec<&SignalRecord> =
            signals.iter().filter(|s| s.alerted_at > since).collect();
        let alert_symbols: Vec<String> = alerted
            .iter()
            .map(|s| s.symbol.to_string())
            .sorted()
            .unique()
            .collect();

        let divider = "=".repeat(60);
        let mut lines = vec![
            divider.clone(),
            "📊 WEEKLY STOCK SCREENER REPORT".to_string(),
            divider.clone(),
            String::new(),
            format!(
                "📅 Period: {} to {}",
                since.format("%Y-%m-%d"),
                now.format("%Y-%m-%d")
            ),
            String::new(),
            "🔍 SCANNING ACTIVITY:".to_string(),
            format!(
                "   • Stage 1 Scans: {} (Avg pass rate: {:.1}%)",
                stage1.len(),
                mean_pass_rate(&stage1)
            ),
            format!(
                "   • Stage 2 Scans: {} (Avg confirm rate: {:.1}%)",
                stage2.len(),
                mean_pass_rate(&stage2)
            ),
            String::new(),
            "🚨 ALERTS:".to_string(),
            format!("   • Total Alerts Sent: {}", alerted.len()),
            format!("   • Unique Symbols: {}", alert_symbols.len()),
        ];

        if !alert_symbols.is_empty() {
            lines.push(format!("   • Symbols: {}", alert_symbols.join(", ")));
        }

        let performance = aggregate_performance(&signals);
        let tracked_symbols = signals
            .iter()
            .map(|s| &s.symbol)
            .sorted()
            .unique()
            .count();

        lines.extend([
            String::new(),
            "📈 SIGNAL PERFORMANCE:".to_string(),
            format!("   • Total Symbols Tracked: {}", tracked_symbols),
            format!("   • Symbols Evaluated (7+ days old): {}", performance.len()),
        ]);

        if performance.is_empty() {
            lines.push("   • No signals evaluated yet (need 7+ days)".to_string());
        } else {
            let avg_return: f64 =
                performance.iter().map(|p| p.avg_return).sum::<f64>() / performance.len() as f64;
            let avg_win_rate: f64 =
                performance.iter().map(|p| p.win_rate).sum::<f64>() / performance.len() as f64;
            lines.extend([
                format!("   • Average Return: {:+.2}%", avg_return),
                format!("   • Average Win Rate: {:.1}%", avg_win_rate),
                String::new(),
                "🏆 TOP PERFORMERS:".to_string(),
            ]);
            for perf in performance.iter().take(TOP_PERFORMERS) {
                lines.push(format!(
                    "   • {}: {:+.2}% return, {:.0}% win rate ({} signals)",
                    perf.symbol, perf.avg_return, perf.win_rate, perf.evaluated
                ));
            }
        }

        lines.extend([
            String::new(),
            divider.clone(),
            format!("Generated: {}", now.format("%Y-%m-%d %H:%M:%S")),
            divider,
        ]);

        Ok(lines.join("\n"))
    }
}

/// Mean of per-cycle pass rates. Cycles that scanned nothing count as 0%.
fn mean_pass_rate(rows: &[&ScanRecord]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let sum: f64 = rows
        .iter()
        .map(|r| {
            if r.scanned > 0 {
                r.passed as f64 / r.scanned as f64 * 100.0
            } else {
                0.0
            }
        })
        .sum();
    sum / rows.len() as f64
}

fn aggregate_performance(signals: &[SignalRecord]) -> Vec<SymbolPerformance> {
    let mut by_symbol: BTreeMap<&Symbol, Vec<f64>> = BTreeMap::new();
    for record in signals {
        if let Some(pct) = record.return_pct {
            by_symbol.entry(&record.symbol).or_default().push(pct);
        }
    }

    let mut performance: Vec<SymbolPerformance> = by_symbol
        .into_iter()
        .map(|(symbol, returns)| {
            let wins = returns.iter().filter(|r| **r > 0.0).count();
            SymbolPerformance {
                symbol: symbol.clone(),
                evaluated: returns.len(),
                avg_return: returns.iter().sum::<f64>() / returns.len() as f64,
                win_rate: wins as f64 / returns.len() as f64 * 100.0,
            }
        })
        .collect();
    performance.sort_by(|a, b| b.avg_return.total_cmp(&a.avg_return));
    performance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_store;
    use crate::types::SignalSnapshot;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn insert_signal(
        store: &SqliteStore,
        symbol: &str,
        alerted_at: DateTime<Utc>,
        return_pct: Option<f64>,
    ) {
        let id = store
            .insert_signal(&SignalRecord {
                id: None,
                symbol: Symbol::new(symbol),
                alerted_at,
                kind: "wavetrend_buy".to_string(),
                snapshot: SignalSnapshot::default(),
                tracking_start: alerted_at,
                return_pct: None,
            })
            .unwrap();
        if let Some(pct) = return_pct {
            store.set_signal_performance(id, pct).unwrap();
        }
    }

    #[test]
    fn test_weekly_report_aggregates() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(create_store(dir.path(), false).unwrap());
        let analytics = ScanAnalytics::new(store.clone());
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap();

        analytics.record_cycle_at(ScanStage::StageOne, 100, 10, 2, 0, 31.0, now - Duration::days(2));
        analytics.record_cycle_at(ScanStage::StageOne, 100, 30, 1, 0, 29.0, now - Duration::days(1));
        analytics.record_cycle_at(ScanStage::StageTwo, 4, 2, 2, 2, 5.0, now - Duration::days(1));
        // outside the window, must not count
        analytics.record_cycle_at(ScanStage::StageOne, 480, 9, 9, 9, 30.0, now - Duration::days(9));

        insert_signal(&store, "AAPL", now - Duration::days(1), Some(4.2));
        insert_signal(&store, "MSFT", now - Duration::days(2), Some(-1.5));
        // old alert outside the window still counts toward performance
        insert_signal(&store, "AAPL", now - Duration::days(30), Some(2.0));

        let report = analytics.weekly_report_at(now).unwrap();
        // (10% + 30%) / 2 cycles
        assert!(report.contains("Stage 1 Scans: 2 (Avg pass rate: 20.0%)"));
        assert!(report.contains("Stage 2 Scans: 1 (Avg confirm rate: 50.0%)"));
        assert!(report.contains("Total Alerts Sent: 2"));
        assert!(report.contains("Symbols: AAPL, MSFT"));
        assert!(report.contains("Total Symbols Tracked: 2"));
        // AAPL averages (4.2 + 2.0) / 2 and leads the ranking
        assert!(report.contains("AAPL: +3.10% return, 100% win rate (2 signals)"));
        assert!(report.contains("MSFT: -1.50% return, 0% win rate (1 signals)"));
    }

    #[test]
    fn test_weekly_report_empty() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(create_store(dir.path(), false).unwrap());
        let analytics = ScanAnalytics::new(store);
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap();

        let report = analytics.weekly_report_at(now).unwrap();
        assert!(report.contains("Stage 1 Scans: 0"));
        assert!(report.contains("Total Alerts Sent: 0"));
        assert!(report.contains("No signals evaluated yet"));
    }

    #[test]
    fn test_report_gating_once_per_week() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(create_store(dir.path(), false).unwrap());
        let analytics = ScanAnalytics::new(store);
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap();

        // never sent before
        assert!(analytics.should_send_weekly_report_at(now).unwrap());

        analytics.mark_report_sent_at(now).unwrap();
        assert!(!analytics.should_send_weekly_report_at(now).unwrap());
        assert!(!analytics
            .should_send_weekly_report_at(now + Duration::days(6))
            .unwrap());
        assert!(analytics
            .should_send_weekly_report_at(now + Duration::days(7))
            .unwrap());
    }
}
