//! Scan orchestration
//!
//! Ties the market data client, filter pipeline, candidate queue, alert
//! admission and watchlist together into the two scheduled passes: the
//! stage-1 universe scan that queues oversold symbols, and the stage-2
//! confirmation pass that alerts on WaveTrend crosses. An offline variant
//! runs the same pipeline over downloaded CSV files.
//!
//! Stage-2 fetches run on a small worker pool, but the admission check and
//! the alert send stay on the scanner task: an alert is recorded only
//! after Telegram accepts it, and the daily limit is consulted for one
//! symbol at a time.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use indicatif::ProgressBar;
use itertools::Itertools;
use rayon::prelude::*;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::analytics::{ScanAnalytics, ScanStage};
use crate::cache::MarketCapCache;
use crate::config::{FiltersConfig, ScreenerConfig};
use crate::data;
use crate::filters::{evaluate_stage_one, evaluate_stage_two, StageOneOutcome, StageTwoOutcome};
use crate::indicators;
use crate::state::{create_store, SqliteStore};
use crate::telegram::{message, TelegramClient};
use crate::tracker::AlertTracker;
use crate::types::{Candle, SignalEvent, SignalKind, SignalSnapshot, Symbol};
use crate::universe::{default_universe, load_universe};
use crate::watchlist::{WatchlistDecision, WatchlistTracker};
use crate::yahoo::{ClientConfig, YahooClient};

/// Concurrent stage-2 confirmation fetches
const STAGE_TWO_WORKERS: usize = 3;

/// Queued candidates older than this are dropped before each stage-2 pass
const CANDIDATE_MAX_AGE_DAYS: i64 = 7;

// =============================================================================
// Scan Summaries
// =============================================================================

/// Counters from one stage-1 universe pass
#[derive(Debug, Clone, Default)]
pub struct StageOneSummary {
    pub scanned: u32,
    /// Symbols that cleared every filter gate, signal or not
    pub passed: u32,
    /// Symbols where both stage-1 detectors fired
    pub signals: u32,
    /// Fresh candidates queued for stage-2 confirmation
    pub queued: u32,
    /// Symbols skipped because they are already queued or confirmed
    pub skipped: u32,
    pub errors: u32,
    pub duration_secs: f64,
}

/// Counters from one stage-2 confirmation pass
#[derive(Debug, Clone, Default)]
pub struct StageTwoSummary {
    /// Pending candidates examined this pass
    pub checked: u32,
    pub confirmed: u32,
    pub alerts_sent: u32,
    /// Confirmations the admission tracker refused to alert on
    pub blocked: u32,
    pub errors: u32,
    pub duration_secs: f64,
}

// =============================================================================
// Scanner
// =============================================================================

pub struct Scanner {
    config: ScreenerConfig,
    store: Arc<SqliteStore>,
    cache: MarketCapCache,
    tracker: AlertTracker,
    watchlist: WatchlistTracker,
    analytics: ScanAnalytics,
    yahoo: YahooClient,
    telegram: Option<TelegramClient>,
}

impl Scanner {
    /// Build a scanner from configuration, opening the state store and the
    /// provider client. Telegram is optional; without it confirmations are
    /// logged but never alerted or recorded.
    pub fn new(config: ScreenerConfig) -> Result<Self> {
        let store = Arc::new(create_store(&config.state.state_dir, config.state.auto_backup)?);

        let cache = MarketCapCache::new(store.clone(), config.data.cache_ttl_hours);
        let tracker = AlertTracker::new(store.clone(), config.alerts.clone());
        let watchlist = WatchlistTracker::new(store.clone(), config.watchlist.clone());
        let analytics = ScanAnalytics::new(store.clone());

        let client_config = ClientConfig::default()
            .with_max_retries(config.data.max_retries)
            .with_timeout(std::time::Duration::from_secs(config.data.timeout_secs))
            .with_requests_per_second(config.data.requests_per_second);
        let yahoo = YahooClient::with_config(client_config)?;

        let telegram = if config.telegram.is_configured() {
            let (bot_token, chat_id) = config.telegram.credentials()?;
            Some(TelegramClient::new(bot_token, chat_id)?)
        } else {
            warn!("Telegram not configured, running without alerts");
            None
        };

        Ok(Self {
            config,
            store,
            cache,
            tracker,
            watchlist,
            analytics,
            yahoo,
            telegram,
        })
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    fn universe(&self) -> Result<Vec<Symbol>> {
        match &self.config.universe.symbols_file {
            Some(path) => load_universe(path),
            None => Ok(default_universe()),
        }
    }

    // -------------------------------------------------------------------------
    // Stage 1: universe scan
    // -------------------------------------------------------------------------

    /// Scan the whole universe through the stage-1 gates and queue fresh
    /// signals for WaveTrend confirmation. Also settles past-alert
    /// performance and sends the weekly report when one is due.
    pub async fn run_stage_one(&self) -> Result<StageOneSummary> {
        let started = Instant::now();
        let today = Utc::now().date_naive();
        let universe = self.universe()?;

        let expired = self.cache.clear_expired();
        let cache_stats = self.cache.stats();
        info!(
            "Market cap cache: {}/{} fresh, {} expired entries dropped",
            cache_stats.fresh, cache_stats.total, expired
        );

        info!("━━━ Stage 1 scan: {} symbols ━━━", universe.len());

        let mut summary = StageOneSummary::default();
        for symbol in &universe {
            match self.store.candidate_exists(symbol) {
                Ok(true) => {
                    debug!("{} already queued for confirmation, skipping", symbol);
                    summary.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => warn!("Candidate lookup failed for {}: {:#}", symbol, e),
            }

            summary.scanned += 1;
            let outcome = match self.scan_symbol(symbol).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    debug!("{}: no usable history", symbol);
                    continue;
                }
                Err(e) => {
                    warn!("{}: scan failed: {:#}", symbol, e);
                    summary.errors += 1;
                    continue;
                }
            };

            match outcome {
                StageOneOutcome::Signal(snapshot) => {
                    summary.passed += 1;
                    summary.signals += 1;
                    info!(
                        "📈 {} stage 1 signal @ {:.2} (D={:.3} MFI={:.1})",
                        symbol, snapshot.price, snapshot.stoch_d, snapshot.mfi
                    );
                    self.intake_candidate(symbol, today, &mut summary);
                }
                StageOneOutcome::NoSignal => summary.passed += 1,
                StageOneOutcome::Rejected(_) => {}
            }
        }

        // Cycle bookkeeping runs best-effort after the pass
        match self.evaluate_pending_performance().await {
            Ok(0) => {}
            Ok(n) => info!("Evaluated performance for {} past alerts", n),
            Err(e) => warn!("Performance evaluation failed: {:#}", e),
        }

        summary.duration_secs = started.elapsed().as_secs_f64();
        self.analytics.record_cycle(
            ScanStage::StageOne,
            summary.scanned,
            summary.passed,
            summary.signals,
            0,
            summary.duration_secs,
        );

        if let Err(e) = self.maybe_send_weekly_report().await {
            warn!("Weekly report failed: {:#}", e);
        }

        info!(
            "Stage 1 complete: {}/{} passed filters, {} signals, {} queued, {} skipped ({:.1}s)",
            summary.passed,
            summary.scanned,
            summary.signals,
            summary.queued,
            summary.skipped,
            summary.duration_secs
        );

        Ok(summary)
    }

    /// Fetch data for one symbol and run the stage-1 pipeline.
    /// `Ok(None)` means no usable history.
    async fn scan_symbol(&self, symbol: &Symbol) -> Result<Option<StageOneOutcome>> {
        let market_cap = match self.cache.get(symbol) {
            Some(cap) => Some(cap),
            None => {
                let cap = self.yahoo.market_cap(symbol).await?;
                if let Some(cap) = cap {
                    self.cache.put(symbol, cap);
                }
                cap
            }
        };

        let candles = match self
            .yahoo
            .daily_history(symbol, self.config.data.daily_history_days)
            .await?
        {
            Some(candles) => candles,
            None => return Ok(None),
        };

        Ok(Some(evaluate_stage_one(
            symbol,
            &candles,
            market_cap,
            &self.config.filters,
        )))
    }

    /// Queue a stage-1 signal unless the symbol is still inside its
    /// watchlist grace period.
    fn intake_candidate(&self, symbol: &Symbol, today: NaiveDate, summary: &mut StageOneSummary) {
        match self.watchlist.can_add_on(symbol, today) {
            WatchlistDecision::Eligible => match self.store.queue_candidate(symbol, today) {
                Ok(true) => {
                    summary.queued += 1;
                    info!("⏳ {} queued for WaveTrend confirmation", symbol);
                }
                Ok(false) => debug!("{} already queued", symbol),
                Err(e) => {
                    warn!("Failed to queue {}: {:#}", symbol, e);
                    summary.errors += 1;
                }
            },
            WatchlistDecision::InGracePeriod {
                business_days,
                grace_days,
            } => {
                info!(
                    "🔇 {} in grace period ({}/{} business days), intake suppressed",
                    symbol, business_days, grace_days
                );
            }
        }
    }

    /// Fill in returns for alerts whose tracking window has elapsed. Each
    /// record settles against the first close on or after its signal date
    /// plus the tracking window, so one daily-history fetch per distinct
    /// symbol must reach back past the oldest pending record.
    async fn evaluate_pending_performance(&self) -> Result<usize> {
        let now = Utc::now();
        let cutoff = now - Duration::days(self.config.alerts.performance_days);
        let pending = self.store.signals_pending_evaluation(cutoff)?;
        if pending.is_empty() {
            return Ok(0);
        }

        let oldest = pending
            .iter()
            .map(|r| r.tracking_start)
            .min()
            .unwrap_or(now);
        let span_days = ((now - oldest).num_days() + 1)
            .max(self.config.data.daily_history_days as i64) as usize;

        let symbols: Vec<Symbol> = pending.into_iter().map(|r| r.symbol).unique().collect();
        let mut histories = HashMap::new();
        for symbol in symbols {
            match self.yahoo.daily_history(&symbol, span_days).await {
                Ok(Some(candles)) => {
                    histories.insert(symbol, candles);
                }
                Ok(None) => debug!("No history for {}, performance deferred", symbol),
                Err(e) => warn!("History fetch failed for {}: {:#}", symbol, e),
            }
        }

        let evaluated = self.tracker.evaluate_performance(&histories)?;
        Ok(evaluated.len())
    }

    async fn maybe_send_weekly_report(&self) -> Result<()> {
        if !self.analytics.should_send_weekly_report()? {
            return Ok(());
        }
        let Some(telegram) = &self.telegram else {
            debug!("Weekly report due but Telegram is not configured");
            return Ok(());
        };

        let report = self.analytics.weekly_report()?;
        telegram.send_message(&message::code_block(&report)).await?;
        self.analytics.mark_report_sent()?;
        info!("📊 Weekly report sent");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Stage 2: confirmation pass
    // -------------------------------------------------------------------------

    /// Re-check every queued candidate for the WaveTrend confirmation and
    /// alert on the ones that cross, subject to admission control.
    pub async fn run_stage_two(&self) -> Result<StageTwoSummary> {
        let started = Instant::now();
        let today = Utc::now().date_naive();

        let cutoff = today - Duration::days(CANDIDATE_MAX_AGE_DAYS);
        match self.store.prune_candidates_before(cutoff) {
            Ok(0) => {}
            Ok(n) => info!(
                "Pruned {} candidates older than {} days",
                n, CANDIDATE_MAX_AGE_DAYS
            ),
            Err(e) => warn!("Candidate pruning failed: {:#}", e),
        }

        let pending = self.store.pending_candidates()?;
        let mut summary = StageTwoSummary {
            checked: pending.len() as u32,
            ..Default::default()
        };
        if pending.is_empty() {
            debug!("No candidates awaiting confirmation");
            return Ok(summary);
        }

        info!("━━━ Stage 2 confirmation: {} candidates ━━━", pending.len());

        let semaphore = Arc::new(Semaphore::new(STAGE_TWO_WORKERS));
        let mut handles = Vec::with_capacity(pending.len());
        for candidate in pending {
            let semaphore = semaphore.clone();
            let yahoo = self.yahoo.clone();
            let filters = self.config.filters.clone();
            let symbol = candidate.symbol.clone();
            let market_cap = self.cache.get(&symbol);
            let daily_days = self.config.data.daily_history_days;
            let weekly_weeks = self.config.data.weekly_history_weeks;

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("Semaphore should not be closed");
                confirm_candidate(yahoo, symbol, market_cap, filters, daily_days, weekly_weeks)
                    .await
            });
            handles.push((candidate.symbol, handle));
        }

        for (symbol, handle) in handles {
            match handle.await {
                Ok(Ok(ConfirmationResult::Confirmed(snapshot))) => {
                    summary.confirmed += 1;
                    self.admit_and_alert(&symbol, snapshot, today, &mut summary)
                        .await;
                }
                Ok(Ok(ConfirmationResult::NoSignal)) => {
                    debug!("{}: no WaveTrend cross yet", symbol);
                }
                Ok(Ok(ConfirmationResult::WeeklyOverbought(weekly_wt1))) => {
                    info!("{}: weekly WT1 {:.1} overbought, holding", symbol, weekly_wt1);
                }
                Ok(Ok(ConfirmationResult::NoData)) => {
                    warn!("{}: no usable history for confirmation", symbol);
                }
                Ok(Err(e)) => {
                    warn!("{}: confirmation failed: {:#}", symbol, e);
                    summary.errors += 1;
                }
                Err(e) => {
                    warn!("{}: confirmation task failed: {}", symbol, e);
                    summary.errors += 1;
                }
            }
        }

        summary.duration_secs = started.elapsed().as_secs_f64();
        self.analytics.record_cycle(
            ScanStage::StageTwo,
            summary.checked,
            summary.confirmed,
            summary.confirmed,
            summary.alerts_sent,
            summary.duration_secs,
        );

        info!(
            "Stage 2 complete: {}/{} confirmed, {} alerts sent, {} blocked ({:.1}s)",
            summary.confirmed, summary.checked, summary.alerts_sent, summary.blocked,
            summary.duration_secs
        );

        Ok(summary)
    }

    /// Run a confirmed signal through admission and, if allowed, send the
    /// alert. The alert is recorded only after Telegram accepts it; a
    /// failed send leaves the candidate queued for the next pass.
    async fn admit_and_alert(
        &self,
        symbol: &Symbol,
        snapshot: SignalSnapshot,
        today: NaiveDate,
        summary: &mut StageTwoSummary,
    ) {
        let decision = self.tracker.can_send_alert(symbol);
        if !decision.is_allowed() {
            info!("🔕 {} confirmed but not alerted: {}", symbol, decision);
            summary.blocked += 1;
            // Leaves the pending queue either way so the same confirmation
            // cannot re-fire tomorrow
            if let Err(e) = self.store.mark_candidate_confirmed(symbol, today) {
                warn!("Failed to mark {} confirmed: {:#}", symbol, e);
            }
            return;
        }

        let Some(telegram) = &self.telegram else {
            warn!("{} confirmed but Telegram is not configured, alert deferred", symbol);
            return;
        };

        let history = match self.tracker.signal_stats(Some(symbol)) {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Failed to load signal history for {}: {:#}", symbol, e);
                None
            }
        };

        let text = message::confirmed_alert(symbol, &snapshot, history.as_ref(), today);
        match telegram.send_message(&text).await {
            Ok(()) => {
                let event =
                    SignalEvent::new(symbol.clone(), today, SignalKind::WavetrendBuy, snapshot);
                self.tracker.record_alert(&event);
                self.watchlist.record_signal(symbol, today);
                if let Err(e) = self.store.mark_candidate_confirmed(symbol, today) {
                    warn!("Failed to mark {} confirmed: {:#}", symbol, e);
                }
                summary.alerts_sent += 1;
                info!("🚨 Alert sent for {}", symbol);
            }
            Err(e) => {
                warn!("Failed to send alert for {}: {:#}", symbol, e);
                summary.errors += 1;
            }
        }
    }
}

// =============================================================================
// Stage-2 worker
// =============================================================================

enum ConfirmationResult {
    Confirmed(SignalSnapshot),
    NoSignal,
    WeeklyOverbought(f64),
    NoData,
}

/// Fetch fresh daily and weekly history for one candidate and evaluate the
/// stage-2 confirmation. A failed weekly fetch skips the veto rather than
/// failing the candidate.
async fn confirm_candidate(
    yahoo: YahooClient,
    symbol: Symbol,
    market_cap: Option<f64>,
    filters: FiltersConfig,
    daily_days: usize,
    weekly_weeks: usize,
) -> Result<ConfirmationResult> {
    let daily = match yahoo.daily_history(&symbol, daily_days).await? {
        Some(daily) => daily,
        None => return Ok(ConfirmationResult::NoData),
    };

    let weekly = match yahoo.weekly_history(&symbol, weekly_weeks).await {
        Ok(weekly) => weekly,
        Err(e) => {
            warn!("{}: weekly fetch failed, skipping weekly check: {:#}", symbol, e);
            None
        }
    };

    match evaluate_stage_two(&symbol, &daily, weekly.as_deref(), &filters) {
        StageTwoOutcome::Confirmed { wt1, wt2 } => {
            let snapshot = confirmation_snapshot(&daily, market_cap, wt1, wt2, &filters);
            Ok(ConfirmationResult::Confirmed(snapshot))
        }
        StageTwoOutcome::NoSignal => Ok(ConfirmationResult::NoSignal),
        StageTwoOutcome::WeeklyOverbought { weekly_wt1 } => {
            Ok(ConfirmationResult::WeeklyOverbought(weekly_wt1))
        }
    }
}

fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Rebuild the alert snapshot from the fresh daily series so the message
/// carries confirmation-time readings, not the stage-1 ones.
fn confirmation_snapshot(
    daily: &[Candle],
    market_cap: Option<f64>,
    wt1: f64,
    wt2: f64,
    cfg: &FiltersConfig,
) -> SignalSnapshot {
    let closes: Vec<f64> = daily.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = daily.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = daily.iter().map(|c| c.low).collect();
    let volumes: Vec<f64> = daily.iter().map(|c| c.volume).collect();
    let price = closes.last().copied().unwrap_or(0.0);

    let stoch = indicators::stochastic_rsi(
        &closes,
        cfg.rsi_period,
        cfg.stoch_period,
        cfg.stoch_k_smooth,
        cfg.stoch_d_smooth,
    );
    let bb = indicators::bollinger_bands(&closes, cfg.bollinger_period, cfg.bollinger_std_dev);
    let mfi_values = indicators::mfi(&highs, &lows, &closes, &volumes, cfg.mfi_period);

    SignalSnapshot {
        price,
        market_cap: market_cap.unwrap_or(0.0),
        stoch_k: last_value(&stoch.k).unwrap_or(0.0),
        stoch_d: last_value(&stoch.d).unwrap_or(0.0),
        bb_lower: last_value(&bb.lower).unwrap_or(0.0),
        mfi: last_value(&mfi_values).unwrap_or(0.0),
        wt1: Some(wt1),
        wt2: Some(wt2),
    }
}

// =============================================================================
// Offline scan
// =============================================================================

/// Outcome of one symbol in an offline batch scan
#[derive(Debug)]
pub struct OfflineResult {
    pub symbol: Symbol,
    pub bars: usize,
    pub stage_one: StageOneOutcome,
    pub stage_two: StageTwoOutcome,
}

/// Run both filter stages over downloaded CSV data.
///
/// Reads `{symbol}_1d.csv` files (and `{symbol}_1wk.csv` when present)
/// from `data_dir`. CSV files carry no market capitalization, so the cap
/// gate is satisfied at the configured floor and the indicator gates do
/// the deciding.
pub fn scan_offline(
    config: &ScreenerConfig,
    data_dir: impl AsRef<Path>,
    symbols: &[Symbol],
) -> Result<Vec<OfflineResult>> {
    scan_offline_with_progress(config, data_dir, symbols, ProgressBar::hidden())
}

/// Offline scan with progress tracking for interactive use.
pub fn scan_offline_with_progress(
    config: &ScreenerConfig,
    data_dir: impl AsRef<Path>,
    symbols: &[Symbol],
    progress_bar: ProgressBar,
) -> Result<Vec<OfflineResult>> {
    let data_dir = data_dir.as_ref();
    let daily = data::load_multi_symbol(data_dir, symbols, "1d")?;

    // Weekly files are optional; load whatever is there without complaining
    let mut weekly: HashMap<Symbol, Vec<Candle>> = HashMap::new();
    for symbol in symbols {
        let path = data_dir.join(format!("{}_1wk.csv", symbol.as_str()));
        if path.exists() {
            weekly.insert(symbol.clone(), data::load_csv(&path)?);
        }
    }

    let present: Vec<&Symbol> = symbols.iter().filter(|s| daily.contains_key(*s)).collect();
    progress_bar.set_length(present.len() as u64);

    let results: Vec<OfflineResult> = present
        .par_iter()
        .map(|symbol| {
            let candles = &daily[*symbol];
            let stage_one = evaluate_stage_one(
                symbol,
                candles,
                Some(config.filters.min_market_cap),
                &config.filters,
            );
            let stage_two = evaluate_stage_two(
                symbol,
                candles,
                weekly.get(*symbol).map(|w| w.as_slice()),
                &config.filters,
            );

            progress_bar.inc(1);

            OfflineResult {
                symbol: (*symbol).clone(),
                bars: candles.len(),
                stage_one,
                stage_two,
            }
        })
        .collect();

    progress_bar.finish();
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn daily_series(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Candle::new_unchecked(
                    start + Duration::days(i as i64),
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    100.0,
                )
            })
            .collect()
    }

    /// Long fall, then a sharp turn: confirms on WaveTrend.
    fn v_bottom_closes() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..34).map(|i| 100.0 - 2.0 * i as f64).collect();
        closes.extend_from_slice(&[37.0, 40.0, 43.0, 46.0]);
        closes
    }

    #[test]
    fn test_confirmation_snapshot_from_fresh_series() {
        let candles = daily_series(&v_bottom_closes());
        let cfg = FiltersConfig::default();

        let snapshot = confirmation_snapshot(&candles, Some(5.0e10), -45.2, -40.9, &cfg);
        assert!((snapshot.price - 46.0).abs() < 1e-9);
        assert!((snapshot.market_cap - 5.0e10).abs() < 1.0);
        assert_eq!(snapshot.wt1, Some(-45.2));
        assert_eq!(snapshot.wt2, Some(-40.9));
        assert!(snapshot.stoch_k >= 0.0 && snapshot.stoch_k <= 1.0);
        assert!(snapshot.stoch_d >= 0.0 && snapshot.stoch_d <= 1.0);
        assert!(snapshot.mfi >= 0.0 && snapshot.mfi <= 100.0);
        assert!(snapshot.bb_lower.is_finite());

        // Unknown cap is recorded as zero rather than failing the alert
        let snapshot = confirmation_snapshot(&candles, None, 0.0, 0.0, &cfg);
        assert_eq!(snapshot.market_cap, 0.0);
    }

    #[test]
    fn test_scan_offline_reads_csv_data() {
        let dir = TempDir::new().unwrap();
        let config = ScreenerConfig::default();

        let crash = daily_series(&v_bottom_closes());
        data::save_to_csv(&crash, dir.path().join("CRASH_1d.csv")).unwrap();

        // Too short for the indicator warm-up
        let stub = daily_series(&[100.0, 101.0, 99.0, 102.0]);
        data::save_to_csv(&stub, dir.path().join("STUB_1d.csv")).unwrap();

        let symbols = vec![
            Symbol::new("CRASH"),
            Symbol::new("STUB"),
            Symbol::new("MISSING"),
        ];
        let results = scan_offline(&config, dir.path(), &symbols).unwrap();

        // MISSING has no file and drops out of the results
        assert_eq!(results.len(), 2);

        let crash_result = results.iter().find(|r| r.symbol.as_str() == "CRASH").unwrap();
        assert_eq!(crash_result.bars, 38);
        assert!(matches!(
            crash_result.stage_two,
            StageTwoOutcome::Confirmed { .. }
        ));

        let stub_result = results.iter().find(|r| r.symbol.as_str() == "STUB").unwrap();
        assert!(matches!(
            stub_result.stage_one,
            StageOneOutcome::Rejected("insufficient_data")
        ));
        assert!(matches!(stub_result.stage_two, StageTwoOutcome::NoSignal));
    }

    #[test]
    fn test_scan_offline_applies_weekly_veto() {
        let dir = TempDir::new().unwrap();
        let config = ScreenerConfig::default();

        let crash = daily_series(&v_bottom_closes());
        data::save_to_csv(&crash, dir.path().join("CRASH_1d.csv")).unwrap();

        // A year of rising weekly bars parks weekly WT1 over the
        // overbought line, vetoing the daily confirmation
        let weekly_closes: Vec<f64> = (0..52).map(|i| 100.0 + 2.0 * i as f64).collect();
        let weekly = daily_series(&weekly_closes);
        data::save_to_csv(&weekly, dir.path().join("CRASH_1wk.csv")).unwrap();

        let symbols = vec![Symbol::new("CRASH")];
        let results = scan_offline(&config, dir.path(), &symbols).unwrap();

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0].stage_two,
            StageTwoOutcome::WeeklyOverbought { .. }
        ));
    }
}
