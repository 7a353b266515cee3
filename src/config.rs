//! Configuration loading and validation

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Base URL of the DexScreener API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Chain identifier the boosted-token feed is restricted to
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Seconds between scheduled refresh cycles
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Per-request timeout in seconds; also the retry budget of one call.
    /// Must leave the refresh interval room to breathe (validated below).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How many boosted entries to keep before the detail fetch
    #[serde(default = "default_boost_limit")]
    pub boost_limit: usize,

    /// Curated reference-set contract addresses ("bluechips")
    #[serde(default = "default_reference_tokens")]
    pub reference_tokens: Vec<String>,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Optional durable storage for cross-cycle state. Both stores are read
/// once at startup to seed initial state and written through on mutation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceConfig {
    /// JSON file holding entry/ATH records, keyed by pair address
    #[serde(default)]
    pub entries_path: Option<String>,

    /// JSON file holding suppressed pair addresses
    #[serde(default)]
    pub suppression_path: Option<String>,
}

fn default_api_base() -> String {
    std::env::var("DEXSCREENER_API_BASE")
        .unwrap_or_else(|_| "https://api.dexscreener.com".into())
}

fn default_chain_id() -> String {
    "solana".into()
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_boost_limit() -> usize {
    40
}

// Shipped reference set; users add their own through config.
fn default_reference_tokens() -> Vec<String> {
    vec![
        "5UUH9RTDiSpq6HKS6bp4NdU9PNJpXRXuiw6ShBTBhgH2".into(), // TROLL
        "Dz9mQ9NzkBcCsuGPFJ3r1bS4wgqKMHBPiVuniW8Mbonk".into(), // USELESS
        "9AvytnUKsLxPxFHFqS6VLxaxt5p6BhYNr53SD2Chpump".into(), // 67
    ]
}

impl ScannerConfig {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Pull in a local .env before reading the environment source
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SOLSCANNER_)
            .add_source(
                config::Environment::with_prefix("SOLSCANNER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: ScannerConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be positive");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }

        // A hung upstream call must never starve the refresh interval.
        // Worst case per call is roughly two timeout windows (one attempt
        // plus the retry budget), so require 2x headroom.
        if self.request_timeout_secs * 2 > self.refresh_interval_secs {
            anyhow::bail!(
                "request_timeout_secs ({}) must be at most half of refresh_interval_secs ({})",
                self.request_timeout_secs,
                self.refresh_interval_secs
            );
        }

        if self.boost_limit == 0 {
            anyhow::bail!("boost_limit must be positive");
        }

        if self.chain_id.is_empty() {
            anyhow::bail!("chain_id must not be empty");
        }

        Ok(())
    }

    /// Scheduled refresh cadence
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Upper bound on a single upstream call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            chain_id: default_chain_id(),
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            boost_limit: default_boost_limit(),
            reference_tokens: default_reference_tokens(),
            persistence: PersistenceConfig::default(),
        }
    }
}
