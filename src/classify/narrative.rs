//! Narrative classification and thesis generation
//!
//! Two pure functions: a fixed, order-significant keyword table maps
//! name+description text to a sector, and a top-to-bottom decision ladder
//! over the numeric fields produces a sentiment label plus thesis copy.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::model::TokenRecord;

const EXCERPT_MAX_CHARS: usize = 140;

const HONEYPOT_LIQUIDITY_USD: f64 = 100_000.0;
const HONEYPOT_VOLUME_RATIO: f64 = 0.05;
const FAKE_VALUATION_FDV_USD: f64 = 10_000_000.0;
const FAKE_VALUATION_VOLUME_USD: f64 = 50_000.0;
const ESTABLISHED_MIN_SOCIALS: usize = 2;
const ESTABLISHED_LIQUIDITY_USD: f64 = 50_000.0;
const HIGH_VELOCITY_TURNOVER: f64 = 2.0;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"(?:https?|ftp)://\S+").expect("static regex");
}

/// Qualitative sector label derived from name/description text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    AiAgent,
    CatMeta,
    DogMeta,
    FrogMeta,
    PolitiFi,
    Meme,
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sector::AiAgent => write!(f, "AI Agent"),
            Sector::CatMeta => write!(f, "Cat Meta"),
            Sector::DogMeta => write!(f, "Dog Meta"),
            Sector::FrogMeta => write!(f, "Frog Meta"),
            Sector::PolitiFi => write!(f, "PolitiFi"),
            Sector::Meme => write!(f, "Meme"),
        }
    }
}

/// Sentiment label from the decision ladder; branches are mutually
/// exclusive by construction (first match wins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    PotentialHoneypot,
    FakeValuation,
    HighVelocity(Sector),
    Established(Sector),
    Early(Sector),
}

impl Sentiment {
    /// Critical framing warrants louder presentation
    pub fn is_critical(&self) -> bool {
        matches!(self, Sentiment::PotentialHoneypot | Sentiment::FakeValuation)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::PotentialHoneypot => write!(f, "POTENTIAL HONEYPOT"),
            Sentiment::FakeValuation => write!(f, "FAKE VALUATION"),
            Sentiment::HighVelocity(sector) => write!(f, "High Velocity {}", sector),
            Sentiment::Established(sector) => write!(f, "Established {}", sector),
            Sentiment::Early(sector) => write!(f, "Early {}", sector),
        }
    }
}

/// Derived narrative view of one record; recomputed every cycle
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeAssessment {
    pub sector: Sector,
    pub sentiment: Sentiment,
    pub thesis: String,
    /// URL-stripped, truncated source text; None when no copy exists
    pub excerpt: Option<String>,
}

/// Match name+description against the fixed keyword table. Order is
/// significant and fixed; first match wins.
pub fn classify_sector(name: &str, description: &str) -> Sector {
    let text = format!("{} {}", name, description).to_lowercase();

    const TABLE: &[(&[&str], Sector)] = &[
        (&["ai", "gpt", "agent", "neural"], Sector::AiAgent),
        (&["cat", "neko", "kitty"], Sector::CatMeta),
        (&["dog", "inu", "pup", "shiba"], Sector::DogMeta),
        (&["pepe", "frog"], Sector::FrogMeta),
        (&["trump", "maga"], Sector::PolitiFi),
    ];

    for (keywords, sector) in TABLE {
        if keywords.iter().any(|k| text.contains(k)) {
            return *sector;
        }
    }
    Sector::Meme
}

/// Strip URLs and truncate the source text for display
pub fn excerpt(description: &str) -> Option<String> {
    let cleaned = URL_RE.replace_all(description, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.chars().count() > EXCERPT_MAX_CHARS {
        let truncated: String = cleaned.chars().take(EXCERPT_MAX_CHARS).collect();
        Some(format!("{}…", truncated))
    } else {
        Some(cleaned.to_string())
    }
}

/// Full narrative assessment for one record. Pure.
pub fn assess(record: &TokenRecord) -> NarrativeAssessment {
    let description = record.description.as_deref().unwrap_or("");
    let sector = classify_sector(&record.name, description);
    let excerpt = excerpt(description);

    let liquidity = record.liquidity_usd;
    let volume_h24 = record.volume.h24;
    let symbol = &record.symbol;

    let (sentiment, thesis) = if liquidity > HONEYPOT_LIQUIDITY_USD
        && volume_h24 < liquidity * HONEYPOT_VOLUME_RATIO
    {
        (
            Sentiment::PotentialHoneypot,
            format!(
                "CRITICAL WARNING: {} has high liquidity (${:.0}) but almost no trading volume. \
                 This pattern often means holders cannot sell.",
                symbol, liquidity
            ),
        )
    } else if record.fdv > FAKE_VALUATION_FDV_USD && volume_h24 < FAKE_VALUATION_VOLUME_USD {
        (
            Sentiment::FakeValuation,
            format!(
                "The ${:.0} valuation is likely manipulated. Real volume is close to non-existent.",
                record.fdv
            ),
        )
    } else if record.socials.len() > ESTABLISHED_MIN_SOCIALS && liquidity > ESTABLISHED_LIQUIDITY_USD
    {
        if volume_h24 > liquidity * HIGH_VELOCITY_TURNOVER {
            (
                Sentiment::HighVelocity(sector),
                format!(
                    "{} is dominating the {} sector right now. Volume turnover is massive \
                     (${:.0}), indicating a potential breakout.",
                    symbol, sector, volume_h24
                ),
            )
        } else {
            (
                Sentiment::Established(sector),
                format!(
                    "{} has solidified its place in the {} narrative. The deep liquidity moat \
                     suggests holders are sticky.",
                    symbol, sector
                ),
            )
        }
    } else {
        (
            Sentiment::Early(sector),
            format!(
                "{} is a speculative play in the {} sector. Needs a viral catalyst.",
                symbol, sector
            ),
        )
    };

    NarrativeAssessment {
        sector,
        sentiment,
        thesis,
        excerpt,
    }
}
