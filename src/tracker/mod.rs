//! Entry tracking: first-seen price, all-time-high, and derived metrics
//!
//! The entry price for a token is the price at which the scanner first
//! observed it and is never rewritten. The ATH only ever moves up. Both
//! survive restarts through a JSON file next to the suppression list.

pub mod suppression;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::Result;

/// Persisted per-pair entry state
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryRecord {
    pub entry_price: f64,
    pub ath_price: f64,
    pub first_seen_at: DateTime<Utc>,
}

/// Metrics derived from an entry record and the current price.
/// Percentages are `None` when the divisor is zero or non-finite.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EntryMetrics {
    pub entry_price: f64,
    pub ath_price: f64,
    pub current_price: f64,
    pub since_entry_pct: Option<f64>,
    pub off_ath_pct: Option<f64>,
    pub first_seen_at: DateTime<Utc>,
}

impl EntryRecord {
    pub fn metrics(&self, current_price: f64) -> EntryMetrics {
        EntryMetrics {
            entry_price: self.entry_price,
            ath_price: self.ath_price,
            current_price,
            since_entry_pct: pct_change(current_price, self.entry_price),
            off_ath_pct: pct_change(current_price, self.ath_price),
            first_seen_at: self.first_seen_at,
        }
    }
}

fn pct_change(current: f64, basis: f64) -> Option<f64> {
    if basis > 0.0 && basis.is_finite() && current.is_finite() {
        Some((current - basis) / basis * 100.0)
    } else {
        None
    }
}

/// Concurrent map of pair address to entry record, with optional
/// write-through JSON persistence
pub struct EntryBook {
    records: DashMap<String, EntryRecord>,
    persistence_path: Option<PathBuf>,
}

impl EntryBook {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            records: DashMap::new(),
            persistence_path,
        }
    }

    /// Restore persisted entries. A missing file is a clean first run,
    /// not an error.
    pub async fn load(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        if !path.exists() {
            debug!("No entry file at {}, starting empty", path.display());
            return Ok(());
        }

        let bytes = tokio::fs::read(path).await?;
        let stored: HashMap<String, EntryRecord> = serde_json::from_slice(&bytes)?;
        let count = stored.len();
        for (pair, record) in stored {
            self.records.insert(pair, record);
        }
        info!("Restored {} entry record(s) from {}", count, path.display());
        Ok(())
    }

    /// Persist all entries. Callers treat failure as a warning, never as
    /// a reason to abort a refresh cycle.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let snapshot: HashMap<String, EntryRecord> = self
            .records
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Record an observation of a token at a price. First sighting fixes
    /// the entry price, whatever it is (a coerced 0.0 included; the
    /// derived metrics carry the zero guard); later sightings only
    /// ratchet the ATH upward. Returns true when state changed.
    /// Non-finite quotes are ignored so they can never poison the book.
    pub fn observe(&self, pair_address: &str, price: f64, at: DateTime<Utc>) -> bool {
        if !price.is_finite() {
            return false;
        }

        match self.records.entry(pair_address.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if price > record.ath_price {
                    record.ath_price = price;
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(EntryRecord {
                    entry_price: price,
                    ath_price: price,
                    first_seen_at: at,
                });
                true
            }
        }
    }

    pub fn get(&self, pair_address: &str) -> Option<EntryRecord> {
        self.records.get(pair_address).map(|e| *e.value())
    }

    /// Derived metrics for a tracked token at the current price
    pub fn metrics(&self, pair_address: &str, current_price: f64) -> Option<EntryMetrics> {
        self.get(pair_address).map(|r| r.metrics(current_price))
    }

    pub fn remove(&self, pair_address: &str) -> Option<EntryRecord> {
        self.records.remove(pair_address).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_price_is_immutable_and_ath_ratchets() {
        let book = EntryBook::new(None);
        let now = Utc::now();

        assert!(book.observe("P1", 1.00, now));
        assert!(book.observe("P1", 1.50, now));
        assert!(!book.observe("P1", 1.20, now)); // below ATH, no change

        let metrics = book.metrics("P1", 1.20).unwrap();
        assert_eq!(metrics.entry_price, 1.00);
        assert_eq!(metrics.ath_price, 1.50);
        assert!((metrics.since_entry_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!((metrics.off_ath_pct.unwrap() - (-20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_zero_price_first_observation_fixes_entry() {
        let book = EntryBook::new(None);
        let now = Utc::now();

        // A coerced missing price is still the first observation
        assert!(book.observe("P1", 0.0, now));
        assert!(book.observe("P1", 2.0, now));

        let record = book.get("P1").unwrap();
        assert_eq!(record.entry_price, 0.0);
        assert_eq!(record.ath_price, 2.0);
        assert_eq!(record.first_seen_at, now);

        // Zero entry basis means the percentage is undefined, not Inf
        let metrics = book.metrics("P1", 2.0).unwrap();
        assert!(metrics.since_entry_pct.is_none());
        assert!(metrics.off_ath_pct.is_some());
    }

    #[test]
    fn test_non_finite_prices_are_ignored() {
        let book = EntryBook::new(None);
        let now = Utc::now();

        assert!(!book.observe("P1", f64::NAN, now));
        assert!(!book.observe("P1", f64::INFINITY, now));
        assert!(book.is_empty());

        // A NaN quote after a real entry must not wipe anything
        assert!(book.observe("P1", 2.0, now));
        assert!(!book.observe("P1", f64::NAN, now));
        assert_eq!(book.get("P1").unwrap().entry_price, 2.0);
    }

    #[test]
    fn test_metrics_guard_zero_basis() {
        let record = EntryRecord {
            entry_price: 0.0,
            ath_price: 0.0,
            first_seen_at: Utc::now(),
        };
        let metrics = record.metrics(1.0);
        assert!(metrics.since_entry_pct.is_none());
        assert!(metrics.off_ath_pct.is_none());
    }

    #[test]
    fn test_metrics_for_unknown_pair() {
        let book = EntryBook::new(None);
        assert!(book.metrics("NOPE", 1.0).is_none());
    }

    #[test]
    fn test_remove_forgets_entry() {
        let book = EntryBook::new(None);
        book.observe("P1", 1.0, Utc::now());
        assert!(book.remove("P1").is_some());
        assert!(book.get("P1").is_none());

        // Re-observation starts a fresh entry at the new price
        book.observe("P1", 3.0, Utc::now());
        assert_eq!(book.get("P1").unwrap().entry_price, 3.0);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");
        let now = Utc::now();

        let book = EntryBook::new(Some(path.clone()));
        book.observe("P1", 1.0, now);
        book.observe("P1", 2.5, now);
        book.observe("P2", 0.004, now);
        book.save().await.unwrap();

        let restored = EntryBook::new(Some(path));
        restored.load().await.unwrap();
        assert_eq!(restored.len(), 2);
        let t1 = restored.get("P1").unwrap();
        assert_eq!(t1.entry_price, 1.0);
        assert_eq!(t1.ath_price, 2.5);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_clean_start() {
        let dir = tempfile::tempdir().unwrap();
        let book = EntryBook::new(Some(dir.path().join("absent.json")));
        book.load().await.unwrap();
        assert!(book.is_empty());
    }
}
