//! Alert admission tracking
//!
//! Decides whether a confirmed signal may be sent as an alert, under two
//! product rules: a global daily cap and a per-symbol cooldown. The
//! in-memory maps are authoritative; every mutation is written through to
//! the store, and a persistence failure downgrades to a warning rather
//! than losing the in-memory update.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::AlertsConfig;
use crate::state::{SignalRecord, SqliteStore};
use crate::types::{Candle, SignalEvent, Symbol};

/// Daily counters older than this many days are dropped on each record
const COUNTER_RETENTION_DAYS: i64 = 7;

// =============================================================================
// Admission decision
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Allowed,
    DailyLimitReached { sent_today: u32, limit: u32 },
    SymbolInCooldown { days_since: i64, cooldown_days: i64 },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allowed)
    }
}

impl fmt::Display for AdmissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionDecision::Allowed => write!(f, "OK"),
            AdmissionDecision::DailyLimitReached { sent_today, limit } => {
                write!(f, "daily limit reached ({}/{})", sent_today, limit)
            }
            AdmissionDecision::SymbolInCooldown {
                days_since,
                cooldown_days,
            } => {
                write!(f, "symbol in cooldown ({}/{} days)", days_since, cooldown_days)
            }
        }
    }
}

// =============================================================================
// Alert Tracker
// =============================================================================

struct AdmissionState {
    daily_alerts: HashMap<NaiveDate, u32>,
    symbol_cooldown: HashMap<Symbol, DateTime<Utc>>,
}

pub struct AlertTracker {
    state: Mutex<AdmissionState>,
    store: Arc<SqliteStore>,
    config: AlertsConfig,
}

impl AlertTracker {
    /// Build a tracker over the store, hydrating the admission maps.
    /// Unreadable state starts the tracker empty rather than failing.
    pub fn new(store: Arc<SqliteStore>, config: AlertsConfig) -> Self {
        let daily_alerts = match store.load_daily_counts() {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Failed to load daily alert counters, starting empty: {:#}", e);
                HashMap::new()
            }
        };
        let symbol_cooldown = match store.load_cooldowns() {
            Ok(cooldowns) => cooldowns,
            Err(e) => {
                warn!("Failed to load symbol cooldowns, starting empty: {:#}", e);
                HashMap::new()
            }
        };

        debug!(
            "Alert tracker loaded: {} daily counters, {} cooldowns",
            daily_alerts.len(),
            symbol_cooldown.len()
        );

        Self {
            state: Mutex::new(AdmissionState {
                daily_alerts,
                symbol_cooldown,
            }),
            store,
            config,
        }
    }

    pub fn can_send_alert(&self, symbol: &Symbol) -> AdmissionDecision {
        self.can_send_alert_at(symbol, Utc::now())
    }

    pub fn can_send_alert_at(&self, symbol: &Symbol, now: DateTime<Utc>) -> AdmissionDecision {
        let state = self.state.lock().unwrap();
        self.check_locked(&state, symbol, now)
    }

    pub fn record_alert(&self, event: &SignalEvent) {
        self.record_alert_at(event, Utc::now());
    }

    pub fn record_alert_at(&self, event: &SignalEvent, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        self.record_locked(&mut state, event, now);
    }

    pub fn try_admit(&self, event: &SignalEvent) -> AdmissionDecision {
        self.try_admit_at(event, Utc::now())
    }

    /// Check and record under a single lock, so concurrent confirmations
    /// cannot both pass the daily limit.
    pub fn try_admit_at(&self, event: &SignalEvent, now: DateTime<Utc>) -> AdmissionDecision {
        let mut state = self.state.lock().unwrap();
        let decision = self.check_locked(&state, &event.symbol, now);
        if decision.is_allowed() {
            self.record_locked(&mut state, event, now);
        }
        decision
    }

    pub fn alerts_sent_today(&self) -> u32 {
        self.alerts_sent_today_at(Utc::now())
    }

    pub fn alerts_sent_today_at(&self, now: DateTime<Utc>) -> u32 {
        let state = self.state.lock().unwrap();
        state
            .daily_alerts
            .get(&now.date_naive())
            .copied()
            .unwrap_or(0)
    }

    /// Symbols still inside their cooldown window, with days remaining,
    /// sorted by symbol for stable display.
    pub fn active_cooldowns_at(&self, now: DateTime<Utc>) -> Vec<(Symbol, i64)> {
        let state = self.state.lock().unwrap();
        let mut active: Vec<(Symbol, i64)> = state
            .symbol_cooldown
            .iter()
            .filter_map(|(symbol, last_alert)| {
                let days_since = (now - *last_alert).num_days();
                if days_since < self.config.cooldown_days {
                    Some((symbol.clone(), self.config.cooldown_days - days_since))
                } else {
                    None
                }
            })
            .collect();
        active.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        active
    }

    fn check_locked(
        &self,
        state: &AdmissionState,
        symbol: &Symbol,
        now: DateTime<Utc>,
    ) -> AdmissionDecision {
        let today = now.date_naive();
        let sent_today = state.daily_alerts.get(&today).copied().unwrap_or(0);
        if sent_today >= self.config.daily_limit {
            return AdmissionDecision::DailyLimitReached {
                sent_today,
                limit: self.config.daily_limit,
            };
        }

        if let Some(last_alert) = state.symbol_cooldown.get(symbol) {
            let days_since = (now - *last_alert).num_days();
            if days_since < self.config.cooldown_days {
                return AdmissionDecision::SymbolInCooldown {
                    days_since,
                    cooldown_days: self.config.cooldown_days,
                };
            }
        }

        AdmissionDecision::Allowed
    }

    fn record_locked(&self, state: &mut AdmissionState, event: &SignalEvent, now: DateTime<Utc>) {
        let today = now.date_naive();
        let count = {
            let count = state.daily_alerts.entry(today).or_insert(0);
            *count += 1;
            *count
        };
        state.symbol_cooldown.insert(event.symbol.clone(), now);

        let cutoff = today - Duration::days(COUNTER_RETENTION_DAYS);
        state.daily_alerts.retain(|date, _| *date >= cutoff);

        info!(
            "Alert recorded: {} [{}] ({}/{} today)",
            event.symbol, event.kind, count, self.config.daily_limit
        );

        if let Err(e) = self.persist_alert(event, now, count, cutoff) {
            warn!(
                "Failed to persist alert state for {}, in-memory state kept: {:#}",
                event.symbol, e
            );
        }
    }

    fn persist_alert(
        &self,
        event: &SignalEvent,
        now: DateTime<Utc>,
        count: u32,
        cutoff: NaiveDate,
    ) -> Result<()> {
        self.store.upsert_daily_count(now.date_naive(), count)?;
        self.store.upsert_cooldown(&event.symbol, now)?;
        self.store.insert_signal(&SignalRecord {
            id: None,
            symbol: event.symbol.clone(),
            alerted_at: now,
            kind: event.kind.to_string(),
            snapshot: event.snapshot.clone(),
            tracking_start: now,
            return_pct: None,
        })?;
        self.store.prune_daily_counts_before(cutoff)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Performance tracking
    // -------------------------------------------------------------------------

    pub fn evaluate_performance(
        &self,
        histories: &HashMap<Symbol, Vec<Candle>>,
    ) -> Result<Vec<SignalRecord>> {
        self.evaluate_performance_at(histories, Utc::now())
    }

    /// Fill in the percentage return for alerts whose tracking window has
    /// elapsed. Each record settles against the first close on or after
    /// its signal date plus `performance_days`; the figure does not
    /// depend on when the evaluation runs. Records whose history does not
    /// reach the settlement date stay pending for the next run. Returned
    /// records carry the freshly computed figure.
    pub fn evaluate_performance_at(
        &self,
        histories: &HashMap<Symbol, Vec<Candle>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SignalRecord>> {
        let cutoff = now - Duration::days(self.config.performance_days);
        let pending = self.store.signals_pending_evaluation(cutoff)?;

        let mut evaluated = Vec::new();
        for mut record in pending {
            let Some(id) = record.id else { continue };
            let Some(candles) = histories.get(&record.symbol) else {
                debug!("No history for {}, performance deferred", record.symbol);
                continue;
            };
            let entry = record.snapshot.price;
            if entry <= 0.0 {
                continue;
            }

            let settle_date = record.tracking_start.date_naive()
                + Duration::days(self.config.performance_days);
            let Some(settle) = settlement_close(candles, settle_date) else {
                debug!(
                    "No close on or after {} for {}, performance deferred",
                    settle_date, record.symbol
                );
                continue;
            };

            let return_pct = ((settle - entry) / entry * 100.0 * 100.0).round() / 100.0;
            self.store.set_signal_performance(id, return_pct)?;

            info!(
                "Performance after {}d: {} {:+.2}% (entry {:.2}, settle {:.2})",
                self.config.performance_days, record.symbol, return_pct, entry, settle
            );

            record.return_pct = Some(return_pct);
            evaluated.push(record);
        }

        Ok(evaluated)
    }

    /// Aggregate performance over recorded signals, optionally narrowed
    /// to a single symbol.
    pub fn signal_stats(&self, symbol: Option<&Symbol>) -> Result<SignalStats> {
        let records = self.store.load_signals()?;
        let records: Vec<_> = match symbol {
            Some(symbol) => records.into_iter().filter(|r| r.symbol == *symbol).collect(),
            None => records,
        };
        let total = records.len();

        let evaluated: Vec<(&Symbol, f64)> = records
            .iter()
            .filter_map(|r| r.return_pct.map(|pct| (&r.symbol, pct)))
            .collect();

        let mut stats = SignalStats {
            total,
            evaluated: evaluated.len(),
            pending: total - evaluated.len(),
            avg_return: None,
            win_rate: None,
            best: None,
            worst: None,
        };
        if evaluated.is_empty() {
            return Ok(stats);
        }

        let sum: f64 = evaluated.iter().map(|(_, pct)| pct).sum();
        let wins = evaluated.iter().filter(|(_, pct)| *pct > 0.0).count();
        stats.avg_return = Some((sum / evaluated.len() as f64 * 100.0).round() / 100.0);
        stats.win_rate = Some((wins as f64 / evaluated.len() as f64 * 1000.0).round() / 10.0);
        stats.best = evaluated
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, pct)| ((*s).clone(), *pct));
        stats.worst = evaluated
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, pct)| ((*s).clone(), *pct));

        Ok(stats)
    }
}

/// First close on or after the settlement date, by calendar day
fn settlement_close(candles: &[Candle], settle_date: NaiveDate) -> Option<f64> {
    candles
        .iter()
        .find(|c| c.datetime.date_naive() >= settle_date)
        .map(|c| c.close)
}

/// Aggregate alert performance for reporting
#[derive(Debug, Clone)]
pub struct SignalStats {
    pub total: usize,
    pub evaluated: usize,
    pub pending: usize,
    pub avg_return: Option<f64>,
    pub win_rate: Option<f64>,
    pub best: Option<(Symbol, f64)>,
    pub worst: Option<(Symbol, f64)>,
}
