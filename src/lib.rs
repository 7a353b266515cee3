//! Solana Token Scanner Library
//!
//! Discovery, risk scoring, and narrative classification over the
//! DexScreener boosted-token feed, with persistent entry tracking.

pub mod classify;
pub mod config;
pub mod dexscreener;
pub mod error;
pub mod model;
pub mod scanner;
pub mod tracker;

// Re-export commonly used types
pub use config::ScannerConfig;
pub use error::{Error, Result};
pub use scanner::{LookupResult, ScanSnapshot, Scanner, ScannerEvent};
