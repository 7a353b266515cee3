//! User-reported rug suppression list
//!
//! Suppression is keyed by pair address and is permanent until the file is
//! edited by hand. Suppressed pairs are dropped from the universe before
//! any cohort or analysis sees them.

use dashmap::DashSet;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::Result;

pub struct SuppressionList {
    pairs: DashSet<String>,
    persistence_path: Option<PathBuf>,
}

impl SuppressionList {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            pairs: DashSet::new(),
            persistence_path,
        }
    }

    /// Restore the persisted list; a missing file means nothing suppressed
    pub async fn load(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        if !path.exists() {
            debug!("No suppression file at {}", path.display());
            return Ok(());
        }

        let bytes = tokio::fs::read(path).await?;
        let stored: Vec<String> = serde_json::from_slice(&bytes)?;
        let count = stored.len();
        for pair in stored {
            self.pairs.insert(pair);
        }
        info!("Restored {} suppressed pair(s)", count);
        Ok(())
    }

    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let mut stored: Vec<String> = self.pairs.iter().map(|p| p.key().clone()).collect();
        stored.sort();
        let bytes = serde_json::to_vec_pretty(&stored)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Add a pair to the list. Idempotent; returns true only on the first
    /// insertion.
    pub fn suppress(&self, pair_address: &str) -> bool {
        self.pairs.insert(pair_address.to_string())
    }

    pub fn is_suppressed(&self, pair_address: &str) -> bool {
        self.pairs.contains(pair_address)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
