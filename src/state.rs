//! Durable screener state
//! SQLite-based persistence with JSON backup
//!
//! Holds the alert-admission state (daily counts, cooldowns, signal
//! history), the stage-2 candidate queue, watchlist grace records, the
//! market-cap cache, and per-cycle scan statistics. Loaders return typed
//! maps; a parse failure surfaces as an error so callers can fall back to
//! an empty state.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::types::{SignalSnapshot, Symbol};

// =============================================================================
// Data Models
// =============================================================================

/// One admitted alert, kept forever for performance analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: Option<i64>,
    pub symbol: Symbol,
    pub alerted_at: DateTime<Utc>,
    pub kind: String,
    pub snapshot: SignalSnapshot,
    /// Baseline timestamp for the later return calculation
    pub tracking_start: DateTime<Utc>,
    pub return_pct: Option<f64>,
}

/// Watchlist grace entry for a symbol that produced a confirmed signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraceRecord {
    pub symbol: Symbol,
    pub last_signal: NaiveDate,
    pub signal_count: u32,
}

/// Stage-2 queue entry: a stage-1 signal awaiting weekly confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub symbol: Symbol,
    pub queued_at: NaiveDate,
    /// Set once the symbol clears stage 2; kept until pruned
    pub confirmed_at: Option<NaiveDate>,
}

/// Cached market capitalization with its fetch time for TTL checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCapEntry {
    pub symbol: Symbol,
    pub market_cap: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Per-cycle scan statistics for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Option<i64>,
    pub stage: String,
    pub scanned: u32,
    pub passed: u32,
    pub signals: u32,
    pub alerts_sent: u32,
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Store Implementation
// =============================================================================

type SignalRow = (i64, String, String, String, String, String, Option<f64>);

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    json_backup_path: PathBuf,
    auto_backup: bool,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        json_backup_path: P,
        auto_backup: bool,
    ) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Some(parent) = json_backup_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        // WAL mode for better concurrency under the scan worker pool
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            json_backup_path: json_backup_path.as_ref().to_path_buf(),
            auto_backup,
        };

        store.create_tables()?;
        info!("SQLite screener store initialized");

        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_alerts (
                date TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS symbol_cooldown (
                symbol TEXT PRIMARY KEY,
                last_alert TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS signal_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                alerted_at TEXT NOT NULL,
                kind TEXT NOT NULL,
                snapshot TEXT NOT NULL DEFAULT '{}',
                tracking_start TEXT NOT NULL,
                return_pct REAL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS watchlist_grace (
                symbol TEXT PRIMARY KEY,
                last_signal TEXT NOT NULL,
                signal_count INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS candidates (
                symbol TEXT PRIMARY KEY,
                queued_at TEXT NOT NULL,
                confirmed_at TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS market_caps (
                symbol TEXT PRIMARY KEY,
                market_cap REAL NOT NULL,
                fetched_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS scan_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stage TEXT NOT NULL,
                scanned INTEGER NOT NULL,
                passed INTEGER NOT NULL,
                signals INTEGER NOT NULL,
                alerts_sent INTEGER NOT NULL,
                duration_secs REAL NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signal_history_symbol ON signal_history(symbol)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signal_history_pending
             ON signal_history(tracking_start) WHERE return_pct IS NULL",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scan_stats_created ON scan_stats(created_at)",
            [],
        )?;

        debug!("Database schema created/verified");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Alert admission state
    // -------------------------------------------------------------------------

    pub fn upsert_daily_count(&self, date: NaiveDate, count: u32) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO daily_alerts (date, count) VALUES (?1, ?2)",
            params![date.to_string(), count],
        )?;
        Ok(())
    }

    pub fn load_daily_counts(&self) -> Result<HashMap<NaiveDate, u32>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT date, count FROM daily_alerts")?;
        let rows: Vec<(String, u32)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (date_str, count) in rows {
            let date: NaiveDate = date_str
                .parse()
                .with_context(|| format!("bad date in daily_alerts: {}", date_str))?;
            counts.insert(date, count);
        }
        Ok(counts)
    }

    /// Drop daily counters older than the cutoff date
    pub fn prune_daily_counts_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM daily_alerts WHERE date < ?1",
            params![cutoff.to_string()],
        )?;
        Ok(removed)
    }

    pub fn upsert_cooldown(&self, symbol: &Symbol, last_alert: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO symbol_cooldown (symbol, last_alert) VALUES (?1, ?2)",
            params![symbol.as_str(), last_alert.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn load_cooldowns(&self) -> Result<HashMap<Symbol, DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT symbol, last_alert FROM symbol_cooldown")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut cooldowns = HashMap::new();
        for (symbol, ts) in rows {
            let last_alert = DateTime::parse_from_rfc3339(&ts)
                .with_context(|| format!("bad timestamp in symbol_cooldown: {}", ts))?
                .with_timezone(&Utc);
            cooldowns.insert(Symbol::new(symbol), last_alert);
        }
        Ok(cooldowns)
    }

    // -------------------------------------------------------------------------
    // Signal history
    // -------------------------------------------------------------------------

    pub fn insert_signal(&self, record: &SignalRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let snapshot_json = serde_json::to_string(&record.snapshot)?;

        conn.execute(
            "INSERT INTO signal_history
             (symbol, alerted_at, kind, snapshot, tracking_start, return_pct)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.symbol.as_str(),
                record.alerted_at.to_rfc3339(),
                record.kind,
                snapshot_json,
                record.tracking_start.to_rfc3339(),
                record.return_pct,
            ],
        )?;
        let id = conn.last_insert_rowid();

        debug!(
            "Signal recorded: {} [{}] @ {:.2}",
            record.symbol, record.kind, record.snapshot.price
        );

        if self.auto_backup {
            drop(conn);
            self.export_json()?;
        }

        Ok(id)
    }

    fn rows_to_signals(rows: Vec<SignalRow>) -> Result<Vec<SignalRecord>> {
        let mut records = Vec::with_capacity(rows.len());
        for (id, symbol, alerted_at, kind, snapshot, tracking_start, return_pct) in rows {
            let alerted_at = DateTime::parse_from_rfc3339(&alerted_at)
                .with_context(|| format!("bad timestamp in signal_history: {}", alerted_at))?
                .with_timezone(&Utc);
            let tracking_start = DateTime::parse_from_rfc3339(&tracking_start)
                .with_context(|| format!("bad timestamp in signal_history: {}", tracking_start))?
                .with_timezone(&Utc);
            records.push(SignalRecord {
                id: Some(id),
                symbol: Symbol::new(symbol),
                alerted_at,
                kind,
                snapshot: serde_json::from_str(&snapshot).unwrap_or_default(),
                tracking_start,
                return_pct,
            });
        }
        Ok(records)
    }

    pub fn load_signals(&self) -> Result<Vec<SignalRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, symbol, alerted_at, kind, snapshot, tracking_start, return_pct
             FROM signal_history ORDER BY id",
        )?;
        let rows: Vec<SignalRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Self::rows_to_signals(rows)
    }

    /// Records begun before the cutoff that still lack a performance figure
    pub fn signals_pending_evaluation(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SignalRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, symbol, alerted_at, kind, snapshot, tracking_start, return_pct
             FROM signal_history
             WHERE return_pct IS NULL AND tracking_start < ?1
             ORDER BY id",
        )?;
        let rows: Vec<SignalRow> = stmt
            .query_map(params![cutoff.to_rfc3339()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Self::rows_to_signals(rows)
    }

    pub fn set_signal_performance(&self, id: i64, return_pct: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE signal_history SET return_pct = ?1 WHERE id = ?2",
            params![return_pct, id],
        )?;
        debug!("Performance recorded for signal {}: {:+.2}%", id, return_pct);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Watchlist grace records
    // -------------------------------------------------------------------------

    pub fn upsert_grace(&self, record: &GraceRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO watchlist_grace (symbol, last_signal, signal_count)
             VALUES (?1, ?2, ?3)",
            params![
                record.symbol.as_str(),
                record.last_signal.to_string(),
                record.signal_count,
            ],
        )?;

        if self.auto_backup {
            drop(conn);
            self.export_json()?;
        }

        Ok(())
    }

    pub fn load_grace_records(&self) -> Result<HashMap<Symbol, GraceRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT symbol, last_signal, signal_count FROM watchlist_grace")?;
        let rows: Vec<(String, String, u32)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = HashMap::new();
        for (symbol, last_signal, signal_count) in rows {
            let last_signal: NaiveDate = last_signal
                .parse()
                .with_context(|| format!("bad date in watchlist_grace: {}", last_signal))?;
            let symbol = Symbol::new(symbol);
            records.insert(
                symbol.clone(),
                GraceRecord {
                    symbol,
                    last_signal,
                    signal_count,
                },
            );
        }
        Ok(records)
    }

    pub fn delete_grace(&self, symbol: &Symbol) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM watchlist_grace WHERE symbol = ?1",
            params![symbol.as_str()],
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Stage-2 candidate queue
    // -------------------------------------------------------------------------

    /// Queue a Stage-1 hit for WaveTrend confirmation. Returns false when
    /// the symbol is already queued or confirmed.
    pub fn queue_candidate(&self, symbol: &Symbol, queued_at: NaiveDate) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO candidates (symbol, queued_at) VALUES (?1, ?2)",
            params![symbol.as_str(), queued_at.to_string()],
        )?;
        Ok(inserted > 0)
    }

    pub fn candidate_exists(&self, symbol: &Symbol) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM candidates WHERE symbol = ?1",
            params![symbol.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn rows_to_candidates(rows: Vec<(String, String, Option<String>)>) -> Result<Vec<CandidateRecord>> {
        let mut records = Vec::with_capacity(rows.len());
        for (symbol, queued_at, confirmed_at) in rows {
            let queued_at: NaiveDate = queued_at
                .parse()
                .with_context(|| format!("bad date in candidates: {}", queued_at))?;
            let confirmed_at = match confirmed_at {
                Some(s) => Some(
                    s.parse()
                        .with_context(|| format!("bad date in candidates: {}", s))?,
                ),
                None => None,
            };
            records.push(CandidateRecord {
                symbol: Symbol::new(symbol),
                queued_at,
                confirmed_at,
            });
        }
        Ok(records)
    }

    /// Candidates still awaiting Stage-2 confirmation, oldest first.
    pub fn pending_candidates(&self) -> Result<Vec<CandidateRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT symbol, queued_at, confirmed_at FROM candidates
             WHERE confirmed_at IS NULL ORDER BY queued_at, symbol",
        )?;
        let rows: Vec<(String, String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Self::rows_to_candidates(rows)
    }

    pub fn all_candidates(&self) -> Result<Vec<CandidateRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT symbol, queued_at, confirmed_at FROM candidates
             ORDER BY queued_at, symbol",
        )?;
        let rows: Vec<(String, String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Self::rows_to_candidates(rows)
    }

    pub fn mark_candidate_confirmed(&self, symbol: &Symbol, on: NaiveDate) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE candidates SET confirmed_at = ?2 WHERE symbol = ?1",
            params![symbol.as_str(), on.to_string()],
        )?;
        Ok(())
    }

    pub fn remove_candidate(&self, symbol: &Symbol) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM candidates WHERE symbol = ?1",
            params![symbol.as_str()],
        )?;
        Ok(())
    }

    /// Drop candidates queued before the cutoff, confirmed or not.
    pub fn prune_candidates_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM candidates WHERE queued_at < ?1",
            params![cutoff.to_string()],
        )?;
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Market-cap cache
    // -------------------------------------------------------------------------

    pub fn upsert_market_cap(&self, entry: &MarketCapEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO market_caps (symbol, market_cap, fetched_at)
             VALUES (?1, ?2, ?3)",
            params![
                entry.symbol.as_str(),
                entry.market_cap,
                entry.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn delete_market_cap(&self, symbol: &Symbol) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM market_caps WHERE symbol = ?1",
            params![symbol.as_str()],
        )?;
        Ok(())
    }

    pub fn load_market_caps(&self) -> Result<Vec<MarketCapEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT symbol, market_cap, fetched_at FROM market_caps")?;
        let rows: Vec<(String, f64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (symbol, market_cap, fetched_at) in rows {
            let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
                .with_context(|| format!("bad timestamp in market_caps: {}", fetched_at))?
                .with_timezone(&Utc);
            entries.push(MarketCapEntry {
                symbol: Symbol::new(symbol),
                market_cap,
                fetched_at,
            });
        }
        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Key-value metadata
    // -------------------------------------------------------------------------

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scan statistics
    // -------------------------------------------------------------------------

    pub fn record_scan(&self, record: &ScanRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scan_stats
             (stage, scanned, passed, signals, alerts_sent, duration_secs, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.stage,
                record.scanned,
                record.passed,
                record.signals,
                record.alerts_sent,
                record.duration_secs,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn recent_scans(&self, since: DateTime<Utc>) -> Result<Vec<ScanRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, stage, scanned, passed, signals, alerts_sent, duration_secs, created_at
             FROM scan_stats WHERE created_at >= ?1 ORDER BY id",
        )?;
        let rows: Vec<(i64, String, u32, u32, u32, u32, f64, String)> = stmt
            .query_map(params![since.to_rfc3339()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, stage, scanned, passed, signals, alerts_sent, duration_secs, created_at) in rows
        {
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .with_context(|| format!("bad timestamp in scan_stats: {}", created_at))?
                .with_timezone(&Utc);
            records.push(ScanRecord {
                id: Some(id),
                stage,
                scanned,
                passed,
                signals,
                alerts_sent,
                duration_secs,
                created_at,
            });
        }
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// Write the whole admission and watchlist state as pretty JSON, for
    /// inspection and as a secondary backup.
    pub fn export_json(&self) -> Result<()> {
        let daily: BTreeMap<String, u32> = self
            .load_daily_counts()?
            .into_iter()
            .map(|(date, count)| (date.to_string(), count))
            .collect();
        let cooldowns: BTreeMap<String, String> = self
            .load_cooldowns()?
            .into_iter()
            .map(|(symbol, ts)| (symbol.as_str().to_string(), ts.to_rfc3339()))
            .collect();
        let history = self.load_signals()?;
        let watchlist: BTreeMap<String, serde_json::Value> = self
            .load_grace_records()?
            .into_iter()
            .map(|(symbol, record)| {
                (
                    symbol.as_str().to_string(),
                    serde_json::json!({
                        "last_signal": record.last_signal.to_string(),
                        "count": record.signal_count,
                    }),
                )
            })
            .collect();

        let state = serde_json::json!({
            "exported_at": Utc::now().to_rfc3339(),
            "daily_alerts": daily,
            "symbol_cooldown": cooldowns,
            "signal_history": history,
            "watchlist": watchlist,
        });

        std::fs::write(&self.json_backup_path, serde_json::to_string_pretty(&state)?)?;
        debug!("State exported to: {}", self.json_backup_path.display());
        Ok(())
    }
}

// =============================================================================
// Factory Function
// =============================================================================

pub fn create_store<P: AsRef<Path>>(state_dir: P, auto_backup: bool) -> Result<SqliteStore> {
    let state_dir = state_dir.as_ref();
    std::fs::create_dir_all(state_dir)?;

    let db_path = state_dir.join("screener_state.db");
    let json_path = state_dir.join("screener_state.json");

    SqliteStore::new(db_path, json_path, auto_backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn snapshot() -> SignalSnapshot {
        SignalSnapshot {
            price: 71.0,
            market_cap: 9.0e10,
            stoch_k: 0.03,
            stoch_d: 0.02,
            bb_lower: 74.7,
            mfi: 38.5,
            wt1: None,
            wt2: None,
        }
    }

    #[test]
    fn test_daily_counts_and_cooldowns_round_trip() {
        let dir = TempDir::new().unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 6, 4, 14, 30, 0).unwrap();

        {
            let store = create_store(dir.path(), false).unwrap();
            store.upsert_daily_count(d1, 3).unwrap();
            store.upsert_daily_count(d2, 1).unwrap();
            store.upsert_cooldown(&Symbol::new("AAPL"), ts).unwrap();
        }

        // Fresh instance over the same directory must see identical state
        let store = create_store(dir.path(), false).unwrap();
        let counts = store.load_daily_counts().unwrap();
        assert_eq!(counts.get(&d1), Some(&3));
        assert_eq!(counts.get(&d2), Some(&1));

        let cooldowns = store.load_cooldowns().unwrap();
        assert_eq!(cooldowns.get(&Symbol::new("AAPL")), Some(&ts));
    }

    #[test]
    fn test_prune_daily_counts() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();

        let old = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let recent = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        store.upsert_daily_count(old, 5).unwrap();
        store.upsert_daily_count(recent, 2).unwrap();

        let removed = store
            .prune_daily_counts_before(NaiveDate::from_ymd_opt(2024, 5, 28).unwrap())
            .unwrap();
        assert_eq!(removed, 1);

        let counts = store.load_daily_counts().unwrap();
        assert!(!counts.contains_key(&old));
        assert!(counts.contains_key(&recent));
    }

    #[test]
    fn test_signal_history_and_performance() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap();

        let record = SignalRecord {
            id: None,
            symbol: Symbol::new("MSFT"),
            alerted_at: ts,
            kind: "stoch_rsi_buy".to_string(),
            snapshot: snapshot(),
            tracking_start: ts,
            return_pct: None,
        };
        let id = store.insert_signal(&record).unwrap();

        // Pending before the cutoff passes
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap();
        let pending = store.signals_pending_evaluation(cutoff).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, Some(id));
        assert_eq!(pending[0].symbol, Symbol::new("MSFT"));
        assert!((pending[0].snapshot.price - 71.0).abs() < 1e-9);

        store.set_signal_performance(id, 4.21).unwrap();
        assert!(store.signals_pending_evaluation(cutoff).unwrap().is_empty());

        let all = store.load_signals().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].return_pct, Some(4.21));
    }

    #[test]
    fn test_grace_records() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

        let record = GraceRecord {
            symbol: Symbol::new("NVDA"),
            last_signal: date,
            signal_count: 2,
        };
        store.upsert_grace(&record).unwrap();

        let records = store.load_grace_records().unwrap();
        assert_eq!(records.len(), 1);
        let loaded = records.get(&Symbol::new("NVDA")).unwrap();
        assert_eq!(loaded.last_signal, date);
        assert_eq!(loaded.signal_count, 2);

        store.delete_grace(&Symbol::new("NVDA")).unwrap();
        assert!(store.load_grace_records().unwrap().is_empty());
    }

    #[test]
    fn test_market_cap_entries() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

        store
            .upsert_market_cap(&MarketCapEntry {
                symbol: Symbol::new("AAPL"),
                market_cap: 3.1e12,
                fetched_at: ts,
            })
            .unwrap();

        let entries = store.load_market_caps().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].symbol, Symbol::new("AAPL"));
        assert!((entries[0].market_cap - 3.1e12).abs() < 1.0);
        assert_eq!(entries[0].fetched_at, ts);
    }

    #[test]
    fn test_scan_stats() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 6, 3, 16, 0, 0).unwrap();

        store
            .record_scan(&ScanRecord {
                id: None,
                stage: "stage1".to_string(),
                scanned: 120,
                passed: 4,
                signals: 2,
                alerts_sent: 1,
                duration_secs: 33.5,
                created_at: ts,
            })
            .unwrap();

        let since = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let scans = store.recent_scans(since).unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].stage, "stage1");
        assert_eq!(scans[0].scanned, 120);

        // Nothing before an in-the-future cutoff
        let future = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(store.recent_scans(future).unwrap().is_empty());
    }

    #[test]
    fn test_export_json_written() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();
        store
            .upsert_daily_count(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(), 2)
            .unwrap();
        store.export_json().unwrap();

        let path = dir.path().join("screener_state.json");
        let raw = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["daily_alerts"]["2024-06-03"], 2);
    }

    #[test]
    fn test_candidate_queue() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();

        assert!(store.queue_candidate(&Symbol::new("AAPL"), d1).unwrap());
        assert!(store.queue_candidate(&Symbol::new("MSFT"), d2).unwrap());
        // Re-queueing an existing symbol is a no-op
        assert!(!store.queue_candidate(&Symbol::new("AAPL"), d2).unwrap());

        assert!(store.candidate_exists(&Symbol::new("AAPL")).unwrap());
        assert!(!store.candidate_exists(&Symbol::new("NVDA")).unwrap());

        let pending = store.pending_candidates().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].symbol, Symbol::new("AAPL"));
        assert_eq!(pending[0].queued_at, d1);
        assert_eq!(pending[1].symbol, Symbol::new("MSFT"));

        // Confirmed symbols leave the pending view but stay on record
        store
            .mark_candidate_confirmed(&Symbol::new("AAPL"), d2)
            .unwrap();
        let pending = store.pending_candidates().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].symbol, Symbol::new("MSFT"));

        let all = store.all_candidates().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].confirmed_at, Some(d2));
        assert!(store.candidate_exists(&Symbol::new("AAPL")).unwrap());

        store.remove_candidate(&Symbol::new("MSFT")).unwrap();
        assert!(!store.candidate_exists(&Symbol::new("MSFT")).unwrap());
    }

    #[test]
    fn test_prune_candidates() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();

        let old = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let recent = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        store.queue_candidate(&Symbol::new("AAPL"), old).unwrap();
        store.queue_candidate(&Symbol::new("MSFT"), recent).unwrap();
        // Confirmation does not shield a stale entry from pruning
        store
            .mark_candidate_confirmed(&Symbol::new("AAPL"), recent)
            .unwrap();

        let removed = store
            .prune_candidates_before(NaiveDate::from_ymd_opt(2024, 5, 28).unwrap())
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.candidate_exists(&Symbol::new("AAPL")).unwrap());
        assert!(store.candidate_exists(&Symbol::new("MSFT")).unwrap());
    }

    #[test]
    fn test_meta_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = create_store(dir.path(), false).unwrap();

        assert_eq!(store.get_meta("last_report_date").unwrap(), None);
        store
            .set_meta("last_report_date", "2024-06-03T16:00:00Z")
            .unwrap();
        assert_eq!(
            store.get_meta("last_report_date").unwrap().as_deref(),
            Some("2024-06-03T16:00:00Z")
        );

        // overwrite keeps a single row
        store.set_meta("last_report_date", "2024-06-10T16:00:00Z").unwrap();
        assert_eq!(
            store.get_meta("last_report_date").unwrap().as_deref(),
            Some("2024-06-10T16:00:00Z")
        );
    }
}
