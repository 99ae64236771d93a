//! Market-cap cache
//!
//! Market capitalization moves slowly, so quote lookups are cached with a
//! long TTL to keep the scan from hammering the quote endpoint. Entries are
//! held in memory and written through to the store so a restart does not
//! refetch the whole universe.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::state::{MarketCapEntry, SqliteStore};
use crate::types::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
}

pub struct MarketCapCache {
    entries: Mutex<HashMap<Symbol, MarketCapEntry>>,
    store: Arc<SqliteStore>,
    ttl: Duration,
}

impl MarketCapCache {
    /// Hydrate the cache from the store; unreadable state starts empty.
    pub fn new(store: Arc<SqliteStore>, ttl_hours: i64) -> Self {
        let entries = match store.load_market_caps() {
            Ok(loaded) => loaded
                .into_iter()
                .map(|entry| (entry.symbol.clone(), entry))
                .collect(),
            Err(e) => {
                warn!("Failed to load market-cap cache, starting empty: {:#}", e);
                HashMap::new()
            }
        };

        let cache = Self {
            entries: Mutex::new(entries),
            store,
            ttl: Duration::hours(ttl_hours),
        };
        debug!(
            "Market-cap cache loaded: {} entries",
            cache.entries.lock().unwrap().len()
        );
        cache
    }

    pub fn get(&self, symbol: &Symbol) -> Option<f64> {
        self.get_at(symbol, Utc::now())
    }

    /// Fresh value or None; a stale entry reads as missing.
    pub fn get_at(&self, symbol: &Symbol, now: DateTime<Utc>) -> Option<f64> {
        let entries = self.entries.lock().unwrap();
        entries.get(symbol).and_then(|entry| {
            if now - entry.fetched_at < self.ttl {
                Some(entry.market_cap)
            } else {
                None
            }
        })
    }

    pub fn put(&self, symbol: &Symbol, market_cap: f64) {
        self.put_at(symbol, market_cap, Utc::now());
    }

    pub fn put_at(&self, symbol: &Symbol, market_cap: f64, now: DateTime<Utc>) {
        let entry = MarketCapEntry {
            symbol: symbol.clone(),
            market_cap,
            fetched_at: now,
        };

        let mut entries = self.entries.lock().unwrap();
        entries.insert(symbol.clone(), entry.clone());
        drop(entries);

        if let Err(e) = self.store.upsert_market_cap(&entry) {
            warn!(
                "Failed to persist market cap for {}, in-memory state kept: {:#}",
                symbol, e
            );
        }
    }

    pub fn needs_refresh(&self, symbol: &Symbol) -> bool {
        self.needs_refresh_at(symbol, Utc::now())
    }

    pub fn needs_refresh_at(&self, symbol: &Symbol, now: DateTime<Utc>) -> bool {
        let entries = self.entries.lock().unwrap();
        match entries.get(symbol) {
            Some(entry) => now - entry.fetched_at >= self.ttl,
            None => true,
        }
    }

    pub fn clear_expired(&self) -> usize {
        self.clear_expired_at(Utc::now())
    }

    /// Drop stale entries from memory and the store.
    pub fn clear_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<Symbol> = entries
            .iter()
            .filter(|(_, entry)| now - entry.fetched_at >= self.ttl)
            .map(|(symbol, _)| symbol.clone())
            .collect();

        for symbol in &expired {
            entries.remove(symbol);
            if let Err(e) = self.store.delete_market_cap(symbol) {
                warn!("Failed to delete cached market cap for {}: {:#}", symbol, e);
            }
        }
        drop(entries);

        if !expired.is_empty() {
            debug!("Cleared {} expired market-cap entries", expired.len());
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let entries = self.entries.lock().unwrap();
        let fresh = entries
            .values()
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .count();
        CacheStats {
            total: entries.len(),
            fresh,
        }
    }
}
