//! Per-record analysis: risk scoring, narrative classification, cohorts

pub mod cohorts;
pub mod narrative;
pub mod risk;

pub use narrative::{NarrativeAssessment, Sector, Sentiment};
pub use risk::{RiskAssessment, RiskFlag};
