//! Immutable published view of one completed refresh cycle
//!
//! A snapshot is built off to the side and swapped in atomically behind an
//! `Arc`, so readers either see the previous complete cycle or the new one,
//! never a half-built mix.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::classify::{NarrativeAssessment, RiskAssessment};
use crate::model::TokenRecord;

/// Derived analysis for one record in a snapshot
#[derive(Debug, Clone)]
pub struct TokenAnalysis {
    pub risk: RiskAssessment,
    pub narrative: NarrativeAssessment,
}

/// Everything one refresh cycle produced. Records are shared between the
/// universe and the cohorts via `Arc`.
#[derive(Debug, Clone)]
pub struct ScanSnapshot {
    pub refreshed_at: DateTime<Utc>,
    /// Deduplicated, suppression-filtered universe
    pub universe: Vec<Arc<TokenRecord>>,
    pub trending: Vec<Arc<TokenRecord>>,
    pub ai_picks: Vec<Arc<TokenRecord>>,
    pub volume_spikes: Vec<Arc<TokenRecord>>,
    /// Curated reference tokens, one best pair each; failed lookups are
    /// simply absent
    pub reference_set: Vec<Arc<TokenRecord>>,
    /// Analyses keyed by token address, one per universe record
    pub analyses: HashMap<String, TokenAnalysis>,
}

impl ScanSnapshot {
    /// Pre-first-cycle placeholder
    pub fn empty() -> Self {
        Self {
            refreshed_at: DateTime::<Utc>::MIN_UTC,
            universe: Vec::new(),
            trending: Vec::new(),
            ai_picks: Vec::new(),
            volume_spikes: Vec::new(),
            reference_set: Vec::new(),
            analyses: HashMap::new(),
        }
    }

    /// Whether any cycle has ever completed
    pub fn is_populated(&self) -> bool {
        self.refreshed_at > DateTime::<Utc>::MIN_UTC
    }

    pub fn analysis(&self, token_address: &str) -> Option<&TokenAnalysis> {
        self.analyses.get(token_address)
    }

    pub fn record(&self, token_address: &str) -> Option<&Arc<TokenRecord>> {
        self.universe
            .iter()
            .find(|r| r.token_address == token_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_is_unpopulated() {
        let snapshot = ScanSnapshot::empty();
        assert!(!snapshot.is_populated());
        assert!(snapshot.universe.is_empty());
        assert!(snapshot.analysis("T1").is_none());
        assert!(snapshot.record("T1").is_none());
    }
}
