//! Manipulation-risk scoring
//!
//! Pure heuristic over a single record: start at 100, subtract
//! independently evaluated additive penalties, clamp to [0, 100].
//! Penalties can overlap. All thresholds are calibrated design constants,
//! not user-configurable.

use serde::Serialize;
use std::fmt;

use crate::model::TokenRecord;

const CRITICAL_LIQUIDITY_USD: f64 = 5_000.0;
const LOW_LIQUIDITY_USD: f64 = 25_000.0;
const FROZEN_MARKET_LIQUIDITY_USD: f64 = 100_000.0;
const FROZEN_MARKET_VOLUME_RATIO: f64 = 0.05;
const INFLATED_FDV_MULTIPLE: f64 = 200.0;
const PUMP_CHANGE_PCT: f64 = 10_000.0;
const PUMP_VOLUME_FLOOR_USD: f64 = 50_000.0;

/// Reason a penalty was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    CriticalLiquidity,
    LowLiquidity,
    FrozenMarket,
    InflatedValuation,
    ArtificialPump,
    NoSocials,
}

impl RiskFlag {
    fn penalty(&self) -> u32 {
        match self {
            RiskFlag::CriticalLiquidity => 50,
            RiskFlag::LowLiquidity => 20,
            RiskFlag::FrozenMarket => 60,
            RiskFlag::InflatedValuation => 40,
            RiskFlag::ArtificialPump => 50,
            RiskFlag::NoSocials => 20,
        }
    }
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskFlag::CriticalLiquidity => write!(f, "critical liquidity risk"),
            RiskFlag::LowLiquidity => write!(f, "low liquidity"),
            RiskFlag::FrozenMarket => write!(f, "frozen market / honeypot risk"),
            RiskFlag::InflatedValuation => write!(f, "inflated valuation"),
            RiskFlag::ArtificialPump => write!(f, "artificial pump, no volume support"),
            RiskFlag::NoSocials => write!(f, "no social links"),
        }
    }
}

/// Scoring result, recomputed every cycle and never stored
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    /// 0 (worst) to 100 (no flags)
    pub score: u8,
    /// Flags in evaluation order; empty means no flags
    pub flags: Vec<RiskFlag>,
}

impl RiskAssessment {
    /// Human-readable reason strings, in flag order
    pub fn reasons(&self) -> Vec<String> {
        self.flags.iter().map(ToString::to_string).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Score a single record. Pure: identical input yields identical output.
pub fn score(record: &TokenRecord) -> RiskAssessment {
    let mut flags = Vec::new();
    let liquidity = record.liquidity_usd;
    let volume_h24 = record.volume.h24;

    // The two liquidity floors are mutually exclusive; critical wins.
    if liquidity < CRITICAL_LIQUIDITY_USD {
        flags.push(RiskFlag::CriticalLiquidity);
    } else if liquidity < LOW_LIQUIDITY_USD {
        flags.push(RiskFlag::LowLiquidity);
    }

    if liquidity > FROZEN_MARKET_LIQUIDITY_USD
        && volume_h24 < liquidity * FROZEN_MARKET_VOLUME_RATIO
    {
        flags.push(RiskFlag::FrozenMarket);
    }

    if record.fdv > liquidity * INFLATED_FDV_MULTIPLE {
        flags.push(RiskFlag::InflatedValuation);
    }

    if record.price_change_h24 > PUMP_CHANGE_PCT && volume_h24 < PUMP_VOLUME_FLOOR_USD {
        flags.push(RiskFlag::ArtificialPump);
    }

    if record.socials.is_empty() {
        flags.push(RiskFlag::NoSocials);
    }

    let penalty: u32 = flags.iter().map(RiskFlag::penalty).sum();
    let score = 100u32.saturating_sub(penalty) as u8;

    RiskAssessment { score, flags }
}
