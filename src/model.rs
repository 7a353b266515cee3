//! Canonical token records and the numeric coercion boundary
//!
//! Raw DexScreener pairs carry optional and string-typed numerics. This
//! module converts them into fully-typed records exactly once, so the rest
//! of the pipeline never repeats null checks. Missing or non-numeric
//! fields coerce to zero and never raise errors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dexscreener::RawPair;

/// A social/community link attached to a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    pub kind: String,
    pub url: String,
}

/// Trading volume over independent (non-cumulative) windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeWindows {
    pub m5: f64,
    pub h1: f64,
    pub h24: f64,
}

/// One market snapshot of a tradable token at a point in time.
///
/// `pair_address` is stable for the lifetime of a trading pair;
/// `token_address` is the deduplication key (a token may have several
/// pairs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_address: String,
    pub pair_address: String,
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub fdv: f64,
    pub market_cap: f64,
    pub volume: VolumeWindows,
    pub price_change_h24: f64,
    pub socials: Vec<SocialLink>,
    pub description: Option<String>,
}

impl TokenRecord {
    /// Accept a raw wire pair into the typed model. This is the single
    /// defensive-parsing point: every numeric comparison downstream can
    /// assume well-formed values.
    pub fn from_raw(raw: &RawPair) -> Self {
        let volume = raw
            .volume
            .as_ref()
            .map(|v| VolumeWindows {
                m5: coerce(v.m5),
                h1: coerce(v.h1),
                h24: coerce(v.h24),
            })
            .unwrap_or_default();

        let socials = raw
            .info
            .as_ref()
            .and_then(|i| i.socials.as_ref())
            .map(|links| {
                links
                    .iter()
                    .map(|s| SocialLink {
                        kind: s.kind.clone().unwrap_or_default(),
                        url: s.url.clone().unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        // The header field carries the richer copy when both are present
        let description = raw
            .info
            .as_ref()
            .and_then(|i| i.header.clone().or_else(|| i.description.clone()));

        Self {
            token_address: raw.base_token.address.clone(),
            pair_address: raw.pair_address.clone(),
            symbol: raw.base_token.symbol.clone().unwrap_or_default(),
            name: raw.base_token.name.clone().unwrap_or_default(),
            price_usd: coerce_str(raw.price_usd.as_deref()),
            liquidity_usd: coerce(raw.liquidity.as_ref().and_then(|l| l.usd)),
            fdv: coerce(raw.fdv),
            market_cap: coerce(raw.market_cap),
            volume,
            price_change_h24: coerce(raw.price_change.as_ref().and_then(|p| p.h24)),
            socials,
            description,
        }
    }
}

fn coerce(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn coerce_str(value: Option<&str>) -> f64 {
    value
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Collapse records sharing a `token_address` to the single
/// highest-liquidity representative. Stable: ties keep the
/// first-encountered record, and output preserves first-encounter order.
pub fn dedupe_by_token(records: Vec<TokenRecord>) -> Vec<TokenRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<TokenRecord> = Vec::new();

    for record in records {
        match index.get(&record.token_address) {
            Some(&i) => {
                if record.liquidity_usd > out[i].liquidity_usd {
                    out[i] = record;
                }
            }
            None => {
                index.insert(record.token_address.clone(), out.len());
                out.push(record);
            }
        }
    }

    out
}

/// Pick the deepest pair for a single token (used for reference-set and
/// contract-address lookups, where one token fans out to many pairs).
pub fn best_by_liquidity(records: Vec<TokenRecord>) -> Option<TokenRecord> {
    records.into_iter().fold(None, |best, candidate| match best {
        Some(b) if b.liquidity_usd >= candidate.liquidity_usd => Some(b),
        _ => Some(candidate),
    })
}
