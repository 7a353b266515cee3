//! Refresh orchestration
//!
//! One background task drives the whole pipeline: fetch the boosted
//! universe and the curated reference set, classify everything, fold the
//! observations into the entry book, then publish an immutable snapshot.
//! A failed cycle leaves the previous snapshot in place.

pub mod snapshot;

use chrono::Utc;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Notify, RwLock};
use tracing::{debug, error, info, warn};

use crate::classify::{cohorts, narrative, risk, NarrativeAssessment, RiskAssessment};
use crate::config::ScannerConfig;
use crate::dexscreener::{DexScreenerClient, MarketDataSource};
use crate::error::{Error, Result};
use crate::model::{best_by_liquidity, dedupe_by_token, TokenRecord};
use crate::tracker::{suppression::SuppressionList, EntryBook, EntryMetrics};

pub use snapshot::{ScanSnapshot, TokenAnalysis};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Broadcast notifications about cycle outcomes
#[derive(Debug, Clone)]
pub enum ScannerEvent {
    SnapshotPublished {
        refreshed_at: chrono::DateTime<Utc>,
        universe_len: usize,
    },
    CycleFailed {
        reason: String,
    },
}

/// Result of an on-demand contract-address lookup
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub record: TokenRecord,
    pub risk: RiskAssessment,
    pub narrative: NarrativeAssessment,
    /// Present only when the scanner has previously observed this token
    pub entry: Option<EntryMetrics>,
}

/// The scanning engine. Cheap to share behind an `Arc`; all interior
/// state is concurrency-safe.
pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    config: ScannerConfig,
    snapshot: RwLock<Arc<ScanSnapshot>>,
    entries: EntryBook,
    suppressed: SuppressionList,
    refreshing: AtomicBool,
    refresh_requested: Notify,
    events: broadcast::Sender<ScannerEvent>,
    shutdown: broadcast::Sender<()>,
}

impl Scanner {
    pub fn new(source: Arc<dyn MarketDataSource>, config: ScannerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = broadcast::channel(1);

        let entries_path = config.persistence.entries_path.as_ref().map(Into::into);
        let suppression_path = config.persistence.suppression_path.as_ref().map(Into::into);

        Self {
            source,
            config,
            snapshot: RwLock::new(Arc::new(ScanSnapshot::empty())),
            entries: EntryBook::new(entries_path),
            suppressed: SuppressionList::new(suppression_path),
            refreshing: AtomicBool::new(false),
            refresh_requested: Notify::new(),
            events,
            shutdown,
        }
    }

    /// Scanner wired to the live DexScreener API
    pub fn with_dexscreener(config: ScannerConfig) -> Self {
        let client = Arc::new(DexScreenerClient::new(&config));
        Self::new(client, config)
    }

    /// Seed persisted entry and suppression state. Call once before the
    /// first refresh.
    pub async fn load_state(&self) -> Result<()> {
        self.entries.load().await?;
        self.suppressed.load().await?;
        Ok(())
    }

    /// Start the background refresh loop. One cycle runs immediately, then
    /// on the configured interval or on demand, until `stop()`.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scanner = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scanner.config.refresh_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut shutdown = scanner.shutdown.subscribe();

            info!(
                interval_secs = scanner.config.refresh_interval_secs,
                "Scanner loop started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scanner.try_refresh().await;
                    }
                    _ = scanner.refresh_requested.notified() => {
                        debug!("Manual refresh requested");
                        scanner.try_refresh().await;
                    }
                    _ = shutdown.recv() => {
                        info!("Scanner loop stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Run one refresh cycle unless one is already in flight. Returns
    /// false when skipped because of the in-flight guard.
    pub async fn try_refresh(&self) -> bool {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Refresh already in flight, skipping");
            return false;
        }

        let outcome = self.run_cycle().await;
        self.refreshing.store(false, Ordering::SeqCst);

        match outcome {
            Ok(published) => {
                let _ = self.events.send(ScannerEvent::SnapshotPublished {
                    refreshed_at: published.refreshed_at,
                    universe_len: published.universe.len(),
                });
            }
            Err(e) => {
                error!("Refresh cycle failed, keeping previous snapshot: {}", e);
                let _ = self.events.send(ScannerEvent::CycleFailed {
                    reason: e.to_string(),
                });
            }
        }
        true
    }

    /// Ask the background loop for an immediate refresh. Dropped silently
    /// when a cycle is already running.
    pub fn refresh_now(&self) {
        if self.refreshing.load(Ordering::SeqCst) {
            debug!("Refresh in flight, ignoring manual request");
            return;
        }
        self.refresh_requested.notify_one();
    }

    async fn run_cycle(&self) -> Result<Arc<ScanSnapshot>> {
        let started = Instant::now();

        // Reference lookups run concurrently and fail independently; the
        // universe fetch failing fails the whole cycle.
        let reference_set = self.fetch_reference_set().await;
        let universe = self.fetch_universe().await?;

        let mut analyses = HashMap::with_capacity(universe.len());
        for record in &universe {
            analyses.insert(
                record.token_address.clone(),
                TokenAnalysis {
                    risk: risk::score(record),
                    narrative: narrative::assess(record),
                },
            );
        }

        let now = Utc::now();
        let mut entries_changed = false;
        for record in &universe {
            entries_changed |= self
                .entries
                .observe(&record.pair_address, record.price_usd, now);
        }
        if entries_changed {
            if let Err(e) = self.entries.save().await {
                warn!("Failed to persist entry records: {}", e);
            }
        }

        let published = Arc::new(ScanSnapshot {
            refreshed_at: now,
            trending: cohorts::trending(&universe),
            ai_picks: cohorts::ai_picks(&universe),
            volume_spikes: cohorts::volume_spikes(&universe),
            universe,
            reference_set,
            analyses,
        });

        *self.snapshot.write().await = Arc::clone(&published);

        info!(
            universe = published.universe.len(),
            trending = published.trending.len(),
            ai_picks = published.ai_picks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh cycle complete"
        );
        Ok(published)
    }

    /// Boosted universe: chain-filtered boost list, pair details, dedupe,
    /// then suppression filtering.
    async fn fetch_universe(&self) -> Result<Vec<Arc<TokenRecord>>> {
        let boosts = self.source.boosted_tokens().await?;

        let mut seen = HashSet::new();
        let mut addresses = Vec::new();
        for boost in boosts
            .into_iter()
            .filter(|b| b.chain_id == self.config.chain_id)
            .take(self.config.boost_limit)
        {
            if seen.insert(boost.token_address.clone()) {
                addresses.push(boost.token_address);
            }
        }

        if addresses.is_empty() {
            debug!("Boost feed returned nothing for {}", self.config.chain_id);
            return Ok(Vec::new());
        }

        let pairs = self.source.pairs_for_tokens(&addresses).await?;
        let records: Vec<TokenRecord> = pairs
            .iter()
            .filter(|p| p.chain_id.is_empty() || p.chain_id == self.config.chain_id)
            .map(TokenRecord::from_raw)
            .collect();

        Ok(dedupe_by_token(records)
            .into_iter()
            .filter(|r| !self.suppressed.is_suppressed(&r.pair_address))
            .map(Arc::new)
            .collect())
    }

    /// Curated reference tokens, fetched concurrently. A failed or empty
    /// lookup drops that token from this cycle and nothing else.
    async fn fetch_reference_set(&self) -> Vec<Arc<TokenRecord>> {
        let lookups = self.config.reference_tokens.iter().map(|address| async move {
            let result = self
                .source
                .pairs_for_tokens(std::slice::from_ref(address))
                .await;
            (address, result)
        });

        let mut out = Vec::new();
        for (address, result) in join_all(lookups).await {
            match result {
                Ok(pairs) => {
                    let records = pairs.iter().map(TokenRecord::from_raw).collect();
                    match best_by_liquidity(records) {
                        Some(best) => out.push(Arc::new(best)),
                        None => warn!("Reference token {} has no pairs", address),
                    }
                }
                Err(e) => warn!("Reference lookup failed for {}: {}", address, e),
            }
        }
        out
    }

    /// Suppress a pair the user reported as a rug. Idempotent; returns
    /// true on first report. Takes effect at the next cycle.
    pub async fn report_rug(&self, pair_address: &str) -> bool {
        let newly = self.suppressed.suppress(pair_address);
        if newly {
            info!("Pair {} suppressed by user report", pair_address);
            if let Err(e) = self.suppressed.save().await {
                warn!("Failed to persist suppression list: {}", e);
            }
        }
        newly
    }

    /// On-demand analysis of an arbitrary contract address. Resolves the
    /// deepest pair, classifies it, and attaches entry metrics when the
    /// token is already tracked.
    pub async fn lookup(&self, token_address: &str) -> Result<LookupResult> {
        let query = [token_address.to_string()];
        let pairs = self.source.pairs_for_tokens(&query).await?;
        let records = pairs.iter().map(TokenRecord::from_raw).collect();
        let record = best_by_liquidity(records)
            .ok_or_else(|| Error::LookupNotFound(token_address.to_string()))?;

        let risk = risk::score(&record);
        let narrative = narrative::assess(&record);
        let entry = self.entries.metrics(&record.pair_address, record.price_usd);

        Ok(LookupResult {
            record,
            risk,
            narrative,
            entry,
        })
    }

    /// Latest published snapshot (the empty placeholder before the first
    /// successful cycle)
    pub async fn snapshot(&self) -> Arc<ScanSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.events.subscribe()
    }

    /// Signal the background loop to exit
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dexscreener::{RawPair, TokenBoost};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct MockSource {
        boosts: Mutex<Vec<TokenBoost>>,
        pairs: Mutex<Vec<RawPair>>,
        fail_boosts: AtomicBool,
        fail_addresses: Mutex<HashSet<String>>,
        pair_calls: AtomicUsize,
    }

    impl MockSource {
        fn new() -> Self {
            Self {
                boosts: Mutex::new(Vec::new()),
                pairs: Mutex::new(Vec::new()),
                fail_boosts: AtomicBool::new(false),
                fail_addresses: Mutex::new(HashSet::new()),
                pair_calls: AtomicUsize::new(0),
            }
        }

        fn set_boosts(&self, boosts: Vec<TokenBoost>) {
            *self.boosts.lock().unwrap() = boosts;
        }

        fn set_pairs(&self, pairs: Vec<RawPair>) {
            *self.pairs.lock().unwrap() = pairs;
        }

        fn fail_address(&self, address: &str) {
            self.fail_addresses
                .lock()
                .unwrap()
                .insert(address.to_string());
        }
    }

    #[async_trait]
    impl MarketDataSource for MockSource {
        async fn boosted_tokens(&self) -> Result<Vec<TokenBoost>> {
            if self.fail_boosts.load(Ordering::SeqCst) {
                return Err(Error::GatewayUnavailable("boost feed down".into()));
            }
            Ok(self.boosts.lock().unwrap().clone())
        }

        async fn pairs_for_tokens(&self, addresses: &[String]) -> Result<Vec<RawPair>> {
            self.pair_calls.fetch_add(1, Ordering::SeqCst);
            let failing = self.fail_addresses.lock().unwrap();
            if addresses.iter().any(|a| failing.contains(a)) {
                return Err(Error::GatewayUnavailable("pair feed down".into()));
            }
            Ok(self
                .pairs
                .lock()
                .unwrap()
                .iter()
                .filter(|p| addresses.contains(&p.base_token.address))
                .cloned()
                .collect())
        }
    }

    fn boost(token: &str, chain: &str) -> TokenBoost {
        serde_json::from_value(json!({
            "chainId": chain,
            "tokenAddress": token,
            "totalAmount": 100.0
        }))
        .unwrap()
    }

    fn pair(token: &str, pair_addr: &str, liquidity: f64, price: &str) -> RawPair {
        serde_json::from_value(json!({
            "chainId": "solana",
            "pairAddress": pair_addr,
            "baseToken": { "address": token, "symbol": "SYM", "name": "Name" },
            "priceUsd": price,
            "volume": { "m5": 0.0, "h1": 0.0, "h24": 20000.0 },
            "liquidity": { "usd": liquidity }
        }))
        .unwrap()
    }

    fn scanner_with(source: Arc<MockSource>, reference_tokens: Vec<String>) -> Scanner {
        let config = ScannerConfig {
            reference_tokens,
            ..Default::default()
        };
        Scanner::new(source, config)
    }

    #[tokio::test]
    async fn test_refresh_publishes_deduplicated_snapshot() {
        let source = Arc::new(MockSource::new());
        source.set_boosts(vec![
            boost("T1", "solana"),
            boost("T2", "solana"),
            boost("T3", "ethereum"), // wrong chain, dropped
        ]);
        source.set_pairs(vec![
            pair("T1", "P1a", 100.0, "1.0"),
            pair("T1", "P1b", 900.0, "1.0"), // deeper pool wins
            pair("T2", "P2", 50_000.0, "0.5"),
        ]);

        let scanner = scanner_with(source, Vec::new());
        let mut events = scanner.subscribe();

        assert!(scanner.try_refresh().await);

        let snapshot = scanner.snapshot().await;
        assert!(snapshot.is_populated());
        assert_eq!(snapshot.universe.len(), 2);
        assert_eq!(snapshot.record("T1").unwrap().pair_address, "P1b");
        assert!(snapshot.analysis("T1").is_some());
        assert!(snapshot.analysis("T2").is_some());

        match events.try_recv().unwrap() {
            ScannerEvent::SnapshotPublished { universe_len, .. } => {
                assert_eq!(universe_len, 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_snapshot() {
        let source = Arc::new(MockSource::new());
        source.set_boosts(vec![boost("T1", "solana")]);
        source.set_pairs(vec![pair("T1", "P1", 1_000.0, "1.0")]);

        let scanner = scanner_with(Arc::clone(&source), Vec::new());
        assert!(scanner.try_refresh().await);
        let before = scanner.snapshot().await;

        source.fail_boosts.store(true, Ordering::SeqCst);
        let mut events = scanner.subscribe();
        assert!(scanner.try_refresh().await);

        let after = scanner.snapshot().await;
        assert_eq!(after.refreshed_at, before.refreshed_at);
        assert_eq!(after.universe.len(), 1);

        // Exactly one failure event for the failed cycle
        match events.try_recv().unwrap() {
            ScannerEvent::CycleFailed { reason } => {
                assert!(reason.contains("boost feed down"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reported_rug_excluded_from_next_cycle() {
        let source = Arc::new(MockSource::new());
        source.set_boosts(vec![boost("T1", "solana"), boost("T2", "solana")]);
        source.set_pairs(vec![
            pair("T1", "P1", 1_000.0, "1.0"),
            pair("T2", "P2", 2_000.0, "1.0"),
        ]);

        let scanner = scanner_with(source, Vec::new());
        scanner.try_refresh().await;
        assert_eq!(scanner.snapshot().await.universe.len(), 2);

        assert!(scanner.report_rug("P1").await);
        assert!(!scanner.report_rug("P1").await); // idempotent

        scanner.try_refresh().await;
        let snapshot = scanner.snapshot().await;
        assert_eq!(snapshot.universe.len(), 1);
        assert!(snapshot.record("T1").is_none());
    }

    #[tokio::test]
    async fn test_reference_failure_does_not_fail_cycle() {
        let source = Arc::new(MockSource::new());
        source.set_boosts(vec![boost("T1", "solana")]);
        source.set_pairs(vec![
            pair("T1", "P1", 1_000.0, "1.0"),
            pair("REF1", "R1", 9_000.0, "2.0"),
            pair("REF2", "R2", 8_000.0, "3.0"),
        ]);
        source.fail_address("REF2");

        let scanner = scanner_with(source, vec!["REF1".into(), "REF2".into()]);
        assert!(scanner.try_refresh().await);

        let snapshot = scanner.snapshot().await;
        assert!(snapshot.is_populated());
        assert_eq!(snapshot.reference_set.len(), 1);
        assert_eq!(snapshot.reference_set[0].token_address, "REF1");
    }

    #[tokio::test]
    async fn test_in_flight_guard_skips_second_refresh() {
        let source = Arc::new(MockSource::new());
        let scanner = scanner_with(source, Vec::new());

        scanner.refreshing.store(true, Ordering::SeqCst);
        assert!(!scanner.try_refresh().await);

        scanner.refreshing.store(false, Ordering::SeqCst);
        assert!(scanner.try_refresh().await);
    }

    #[tokio::test]
    async fn test_entry_tracking_across_cycles() {
        let source = Arc::new(MockSource::new());
        source.set_boosts(vec![boost("T1", "solana")]);
        source.set_pairs(vec![pair("T1", "P1", 1_000.0, "1.00")]);

        let scanner = scanner_with(Arc::clone(&source), Vec::new());
        scanner.try_refresh().await;

        source.set_pairs(vec![pair("T1", "P1", 1_000.0, "1.50")]);
        scanner.try_refresh().await;

        source.set_pairs(vec![pair("T1", "P1", 1_000.0, "1.20")]);
        scanner.try_refresh().await;

        let result = scanner.lookup("T1").await.unwrap();
        let entry = result.entry.unwrap();
        assert_eq!(entry.entry_price, 1.00);
        assert_eq!(entry.ath_price, 1.50);
        assert!((entry.since_entry_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!((entry.off_ath_pct.unwrap() - (-20.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_lookup_unknown_token() {
        let source = Arc::new(MockSource::new());
        let scanner = scanner_with(source, Vec::new());

        let err = scanner.lookup("NOPE").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lookup_picks_deepest_pair() {
        let source = Arc::new(MockSource::new());
        source.set_pairs(vec![
            pair("T1", "Pshallow", 10.0, "1.0"),
            pair("T1", "Pdeep", 5_000.0, "1.0"),
        ]);

        let scanner = scanner_with(source, Vec::new());
        let result = scanner.lookup("T1").await.unwrap();
        assert_eq!(result.record.pair_address, "Pdeep");
        assert!(result.entry.is_none()); // never observed by a cycle
    }

    #[tokio::test]
    async fn test_spawned_loop_publishes_and_stops() {
        let source = Arc::new(MockSource::new());
        source.set_boosts(vec![boost("T1", "solana")]);
        source.set_pairs(vec![pair("T1", "P1", 1_000.0, "1.0")]);

        let scanner = Arc::new(scanner_with(source, Vec::new()));
        let mut events = scanner.subscribe();
        let handle = Arc::clone(&scanner).spawn();

        // The first interval tick fires immediately
        tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .expect("no snapshot within deadline")
            .unwrap();
        assert!(scanner.snapshot().await.is_populated());

        scanner.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_boost_feed_publishes_empty_universe() {
        let source = Arc::new(MockSource::new());
        let scanner = scanner_with(Arc::clone(&source), Vec::new());

        assert!(scanner.try_refresh().await);
        let snapshot = scanner.snapshot().await;
        assert!(snapshot.is_populated());
        assert!(snapshot.universe.is_empty());
        // No detail fetch without addresses
        assert_eq!(source.pair_calls.load(Ordering::SeqCst), 0);
    }
}
