//! Cohort membership predicates and per-cycle cohort building
//!
//! Cohorts are overlapping views over the deduplicated universe: one record
//! may appear in several. Builders clone `Arc`s, never records.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::model::TokenRecord;

const TRENDING_MIN_LIQUIDITY_USD: f64 = 5_000.0;
const TRENDING_MIN_VOLUME_H24_USD: f64 = 10_000.0;
const TRENDING_FROZEN_LIQUIDITY_USD: f64 = 100_000.0;
const TRENDING_FROZEN_VOLUME_RATIO: f64 = 0.02;

const AI_PICK_MIN_LIQUIDITY_USD: f64 = 15_000.0;
const AI_PICK_MIN_VOLUME_H24_USD: f64 = 50_000.0;
const AI_PICK_MAX_FDV_MULTIPLE: f64 = 200.0;
const AI_PICK_FROZEN_LIQUIDITY_USD: f64 = 100_000.0;
const AI_PICK_FROZEN_VOLUME_RATIO: f64 = 0.05;

const VOLUME_SPIKE_M5_SHARE: f64 = 0.10;
const VOLUME_SPIKE_CAP: usize = 5;

/// Baseline activity bar with a frozen-market carve-out
pub fn is_trending(record: &TokenRecord) -> bool {
    let liq = record.liquidity_usd;
    let h24 = record.volume.h24;

    liq >= TRENDING_MIN_LIQUIDITY_USD
        && h24 >= TRENDING_MIN_VOLUME_H24_USD
        && !(liq > TRENDING_FROZEN_LIQUIDITY_USD && h24 < liq * TRENDING_FROZEN_VOLUME_RATIO)
}

/// Stricter conviction bar: deeper liquidity, real volume, a social
/// presence, and a sane valuation
pub fn is_ai_pick(record: &TokenRecord) -> bool {
    let liq = record.liquidity_usd;
    let h24 = record.volume.h24;

    liq >= AI_PICK_MIN_LIQUIDITY_USD
        && h24 >= AI_PICK_MIN_VOLUME_H24_USD
        && !record.socials.is_empty()
        && record.fdv <= liq * AI_PICK_MAX_FDV_MULTIPLE
        && !(liq > AI_PICK_FROZEN_LIQUIDITY_USD && h24 < liq * AI_PICK_FROZEN_VOLUME_RATIO)
}

/// Short-window acceleration: the last 5 minutes carry more than their
/// pro-rata share of the hourly volume
pub fn is_volume_spike(record: &TokenRecord) -> bool {
    record.volume.h1 > 0.0 && record.volume.m5 > record.volume.h1 * VOLUME_SPIKE_M5_SHARE
}

fn sorted_desc_by<F>(universe: &[Arc<TokenRecord>], pred: fn(&TokenRecord) -> bool, key: F) -> Vec<Arc<TokenRecord>>
where
    F: Fn(&TokenRecord) -> f64,
{
    let mut out: Vec<Arc<TokenRecord>> = universe
        .iter()
        .filter(|r| pred(r))
        .cloned()
        .collect();
    // NaNs were coerced away at ingestion, so total ordering holds
    out.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    out
}

/// Trending cohort, sorted by 24h volume descending
pub fn trending(universe: &[Arc<TokenRecord>]) -> Vec<Arc<TokenRecord>> {
    sorted_desc_by(universe, is_trending, |r| r.volume.h24)
}

/// High-conviction cohort, sorted by 1h volume descending
pub fn ai_picks(universe: &[Arc<TokenRecord>]) -> Vec<Arc<TokenRecord>> {
    sorted_desc_by(universe, is_ai_pick, |r| r.volume.h1)
}

/// Volume-spike cohort, sorted by 5m volume descending, capped
pub fn volume_spikes(universe: &[Arc<TokenRecord>]) -> Vec<Arc<TokenRecord>> {
    let mut out = sorted_desc_by(universe, is_volume_spike, |r| r.volume.m5);
    out.truncate(VOLUME_SPIKE_CAP);
    out
}
