//! Persistence layer.
//!
//! The in-memory stores are authoritative; persistence is a whole-state
//! snapshot flushed to a JSON file after mutations complete. The
//! `SnapshotStore` trait is the seam the facade writes through, so the
//! embedding layer can swap the JSON file for another backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::store::markets::MarketStoreState;
use crate::types::Account;

/// Default snapshot file path.
const DEFAULT_SNAPSHOT_FILE: &str = "bookie_state.json";

/// Serializable copy of the whole ledger: both durable collections plus
/// the parlay book, the result archive, and the market id counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub accounts: HashMap<String, Account>,
    pub markets: MarketStoreState,
}

/// Abstraction over snapshot backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load the latest snapshot. Returns None on a fresh start.
    async fn load(&self) -> Result<Option<Snapshot>>;
}

/// JSON-file snapshot store.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: Option<&str>) -> Self {
        Self {
            path: PathBuf::from(path.unwrap_or(DEFAULT_SNAPSHOT_FILE)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the snapshot file (for testing or reset).
    pub async fn delete(&self) -> Result<()> {
        if self.path.exists() {
            tokio::fs::remove_file(&self.path)
                .await
                .with_context(|| format!("Failed to delete snapshot file {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialise ledger snapshot")?;

        tokio::fs::write(&self.path, &json)
            .await
            .with_context(|| format!("Failed to write snapshot to {}", self.path.display()))?;

        debug!(
            path = %self.path.display(),
            accounts = snapshot.accounts.len(),
            markets = snapshot.markets.markets.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved snapshot found, starting fresh");
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot from {}", self.path.display()))?;

        let snapshot: Snapshot = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse snapshot from {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            accounts = snapshot.accounts.len(),
            markets = snapshot.markets.markets.len(),
            "Snapshot loaded from disk"
        );
        Ok(Some(snapshot))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
