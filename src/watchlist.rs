//! Watchlist grace-period tracking
//!
//! A symbol that produced a confirmed signal is barred from re-entering the
//! watchlist until a grace period of business days has passed. Grace
//! records are held in memory and written through to the store, like the
//! alert admission maps.

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::WatchlistConfig;
use crate::state::{GraceRecord, SqliteStore};
use crate::types::Symbol;

/// Count weekday (Mon-Fri) dates after `start` up to and including `end`.
///
/// The start date itself is not counted: Friday to the following Monday is
/// one business day, Monday to Friday of the same week is four. This
/// matches how the grace window has always been measured; changing it
/// would shift every expiry by a day.
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end <= start {
        return 0;
    }

    let mut days = 0;
    let mut current = start + Duration::days(1);
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        current += Duration::days(1);
    }
    days
}

// =============================================================================
// Watchlist decision
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum WatchlistDecision {
    Eligible,
    InGracePeriod {
        business_days: i64,
        grace_days: i64,
    },
}

impl WatchlistDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, WatchlistDecision::Eligible)
    }
}

impl fmt::Display for WatchlistDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchlistDecision::Eligible => write!(f, "OK"),
            WatchlistDecision::InGracePeriod {
                business_days,
                grace_days,
            } => write!(
                f,
                "in grace period ({}/{} business days)",
                business_days, grace_days
            ),
        }
    }
}

// =============================================================================
// Watchlist Tracker
// =============================================================================

pub struct WatchlistTracker {
    records: Mutex<HashMap<Symbol, GraceRecord>>,
    store: Arc<SqliteStore>,
    config: WatchlistConfig,
}

impl WatchlistTracker {
    /// Hydrate the grace map from the store; unreadable state starts empty.
    pub fn new(store: Arc<SqliteStore>, config: WatchlistConfig) -> Self {
        let records = match store.load_grace_records() {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to load watchlist grace records, starting empty: {:#}", e);
                HashMap::new()
            }
        };
        debug!("Watchlist tracker loaded: {} grace records", records.len());

        Self {
            records: Mutex::new(records),
            store,
            config,
        }
    }

    pub fn can_add(&self, symbol: &Symbol) -> WatchlistDecision {
        self.can_add_on(symbol, Utc::now().date_naive())
    }

    /// A symbol with no signal record is always eligible; otherwise it must
    /// have sat out the full grace period since its last signal.
    pub fn can_add_on(&self, symbol: &Symbol, today: NaiveDate) -> WatchlistDecision {
        let records = self.records.lock().unwrap();
        match records.get(symbol) {
            None => WatchlistDecision::Eligible,
            Some(record) => {
                let elapsed = business_days_between(record.last_signal, today);
                if elapsed >= self.config.grace_period_days {
                    WatchlistDecision::Eligible
                } else {
                    WatchlistDecision::InGracePeriod {
                        business_days: elapsed,
                        grace_days: self.config.grace_period_days,
                    }
                }
            }
        }
    }

    /// Start (or restart) the grace window after a confirmed, sent signal.
    pub fn record_signal(&self, symbol: &Symbol, date: NaiveDate) {
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(symbol.clone())
            .and_modify(|r| {
                r.last_signal = date;
                r.signal_count += 1;
            })
            .or_insert_with(|| GraceRecord {
                symbol: symbol.clone(),
                last_signal: date,
                signal_count: 1,
            });
        let record = record.clone();
        drop(records);

        info!(
            "Grace period started: {} (signal #{}, {} business days)",
            symbol, record.signal_count, self.config.grace_period_days
        );

        if let Err(e) = self.store.upsert_grace(&record) {
            warn!(
                "Failed to persist grace record for {}, in-memory state kept: {:#}",
                symbol, e
            );
        }
    }

    pub fn prune(&self) -> usize {
        self.prune_on(Utc::now().date_naive())
    }

    /// Drop grace records older than the retention window. An entry
    /// survives exactly `retention_days` business days and is removed on
    /// the next one.
    pub fn prune_on(&self, today: NaiveDate) -> usize {
        let mut records = self.records.lock().unwrap();
        let expired: Vec<Symbol> = records
            .iter()
            .filter(|(_, record)| {
                business_days_between(record.last_signal, today) > self.config.retention_days
            })
            .map(|(symbol, _)| symbol.clone())
            .collect();

        for symbol in &expired {
            records.remove(symbol);
            if let Err(e) = self.store.delete_grace(symbol) {
                warn!("Failed to delete grace record for {}: {:#}", symbol, e);
            }
        }
        drop(records);

        if !expired.is_empty() {
            info!("Pruned {} expired grace records", expired.len());
        }
        expired.len()
    }

    /// All grace records, sorted by symbol for stable display.
    pub fn grace_entries(&self) -> Vec<GraceRecord> {
        let records = self.records.lock().unwrap();
        let mut entries: Vec<GraceRecord> = records.values().cloned().collect();
        entries.sort_by(|a, b| a.symbol.as_str().cmp(b.symbol.as_str()));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_store;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker(dir: &TempDir) -> WatchlistTracker {
        let store = Arc::new(create_store(dir.path(), false).unwrap());
        WatchlistTracker::new(
            store,
            WatchlistConfig {
                grace_period_days: 5,
                retention_days: 30,
            },
        )
    }

    #[test]
    fn test_business_days_monday_to_friday() {
        // 2024-06-03 is a Monday, 2024-06-07 a Friday
        assert_eq!(business_days_between(date(2024, 6, 3), date(2024, 6, 7)), 4);
    }

    #[test]
    fn test_business_days_friday_to_monday() {
        // the weekend contributes nothing
        assert_eq!(business_days_between(date(2024, 6, 7), date(2024, 6, 10)), 1);
    }

    #[test]
    fn test_business_days_week_span() {
        // Monday to the next Monday
        assert_eq!(business_days_between(date(2024, 6, 3), date(2024, 6, 10)), 5);
    }

    #[test]
    fn test_business_days_start_not_counted() {
        // same day and reversed ranges are zero
        assert_eq!(business_days_between(date(2024, 6, 3), date(2024, 6, 3)), 0);
        assert_eq!(business_days_between(date(2024, 6, 7), date(2024, 6, 3)), 0);
        // one calendar day Monday->Tuesday counts the Tuesday only
        assert_eq!(business_days_between(date(2024, 6, 3), date(2024, 6, 4)), 1);
    }

    #[test]
    fn test_business_days_weekend_start() {
        // Saturday to next Saturday spans one full work week
        assert_eq!(business_days_between(date(2024, 6, 1), date(2024, 6, 8)), 5);
    }

    #[test]
    fn test_unknown_symbol_is_eligible() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        assert!(tracker
            .can_add_on(&Symbol::new("AAPL"), date(2024, 6, 3))
            .is_eligible());
    }

    #[test]
    fn test_grace_blocks_until_fifth_business_day() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        // signal on Monday 2024-06-03
        tracker.record_signal(&Symbol::new("AAPL"), date(2024, 6, 3));

        // Friday the same week: 4 business days, still blocked
        assert_eq!(
            tracker.can_add_on(&Symbol::new("AAPL"), date(2024, 6, 7)),
            WatchlistDecision::InGracePeriod {
                business_days: 4,
                grace_days: 5
            }
        );
        // the weekend does not advance the clock
        assert!(!tracker
            .can_add_on(&Symbol::new("AAPL"), date(2024, 6, 9))
            .is_eligible());
        // next Monday: 5 business days, eligible again
        assert!(tracker
            .can_add_on(&Symbol::new("AAPL"), date(2024, 6, 10))
            .is_eligible());
    }

    #[test]
    fn test_repeat_signal_restarts_grace() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        tracker.record_signal(&Symbol::new("AAPL"), date(2024, 6, 3));
        tracker.record_signal(&Symbol::new("AAPL"), date(2024, 6, 17));

        // measured from the newer signal
        assert!(!tracker
            .can_add_on(&Symbol::new("AAPL"), date(2024, 6, 20))
            .is_eligible());
        assert!(tracker
            .can_add_on(&Symbol::new("AAPL"), date(2024, 6, 24))
            .is_eligible());

        let entries = tracker.grace_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].signal_count, 2);
        assert_eq!(entries[0].last_signal, date(2024, 6, 17));
    }

    #[test]
    fn test_grace_survives_restart() {
        let dir = TempDir::new().unwrap();
        {
            let tracker = tracker(&dir);
            tracker.record_signal(&Symbol::new("NVDA"), date(2024, 6, 3));
        }

        let tracker = tracker(&dir);
        assert!(!tracker
            .can_add_on(&Symbol::new("NVDA"), date(2024, 6, 5))
            .is_eligible());
    }

    #[test]
    fn test_prune_strictly_after_retention() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        // Monday 2024-06-03; 30 business days later is Monday 2024-07-15
        tracker.record_signal(&Symbol::new("AAPL"), date(2024, 6, 3));
        tracker.record_signal(&Symbol::new("MSFT"), date(2024, 7, 1));

        // exactly 30 business days: survives
        assert_eq!(tracker.prune_on(date(2024, 7, 15)), 0);
        assert_eq!(tracker.grace_entries().len(), 2);

        // 31st business day: dropped, the younger record stays
        assert_eq!(tracker.prune_on(date(2024, 7, 16)), 1);
        let entries = tracker.grace_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].symbol, Symbol::new("MSFT"));
    }

    #[test]
    fn test_prune_removes_from_store() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(create_store(dir.path(), false).unwrap());
        let tracker = WatchlistTracker::new(
            store.clone(),
            WatchlistConfig {
                grace_period_days: 5,
                retention_days: 30,
            },
        );
        tracker.record_signal(&Symbol::new("AAPL"), date(2024, 1, 2));
        tracker.prune_on(date(2024, 6, 3));

        assert!(store.load_grace_records().unwrap().is_empty());
    }
}
