//! Durable bridge state.
//!
//! The whole [`BridgeState`] lives behind one mutex. Entry ingestion, identity
//! provisioning and saves all take that lock, so a save always observes a state
//! between two complete mutations.

use crate::config::SavePolicy;
use crate::error::PersistenceError;
use crate::types::{ApplyOutcome, BridgeState, LedgerEntry, OrderingMode};
use crate::utils::{write_atomic, write_atomic_blocking};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct PersistentLedger {
    path: PathBuf,
    state: Arc<Mutex<BridgeState>>,
    ordering: OrderingMode,
    save_policy: SavePolicy,
}

impl PersistentLedger {
    /// Loads the state stored at `path`, starting empty when there is none.
    pub fn open(path: impl Into<PathBuf>, ordering: OrderingMode, save_policy: SavePolicy) -> Self {
        let path = path.into();
        let state = load(&path);
        Self::with_state(path, state, ordering, save_policy)
    }

    pub fn with_state(
        path: impl Into<PathBuf>,
        state: BridgeState,
        ordering: OrderingMode,
        save_policy: SavePolicy,
    ) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(state)),
            ordering,
            save_policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn apply_entry(&self, entry: LedgerEntry) -> ApplyOutcome {
        let mut state = self.state.lock().await;
        let sequence = entry.sequence;
        let outcome = state.apply_entry(entry, self.ordering);

        match outcome {
            ApplyOutcome::Accepted => {
                debug!(sequence, "ledger entry accepted");
                if self.save_policy == SavePolicy::EveryEntry {
                    if let Err(e) = save_blocking(&state, &self.path).await {
                        warn!(sequence, error = %e, "failed to persist accepted entry; it will be retried at exit");
                    }
                }
            }
            ApplyOutcome::RejectedDuplicate => {
                debug!(sequence, watermark = state.last_consumed_sequence, "duplicate entry dropped");
            }
            ApplyOutcome::RejectedOutOfOrder => {
                debug!(sequence, watermark = state.last_consumed_sequence, "out-of-order entry dropped");
            }
        }

        outcome
    }

    pub async fn save(&self) -> Result<(), PersistenceError> {
        let state = self.state.lock().await;
        save_blocking(&state, &self.path).await
    }

    pub async fn snapshot(&self) -> BridgeState {
        self.state.lock().await.clone()
    }

    pub async fn last_consumed_sequence(&self) -> u64 {
        self.state.lock().await.last_consumed_sequence
    }

    pub async fn topic_identity(&self) -> Option<String> {
        self.state.lock().await.topic().map(str::to_string)
    }

    pub async fn bridge_identity(&self) -> Option<String> {
        self.state.lock().await.bridge().map(str::to_string)
    }

    /// Records the topic identity unless one is already set.
    pub async fn set_topic_identity(&self, id: &str) -> bool {
        self.state.lock().await.assign_topic_identity(id)
    }

    /// Records the bridge identity unless one is already set.
    pub async fn set_bridge_identity(&self, id: &str) -> bool {
        self.state.lock().await.assign_bridge_identity(id)
    }
}

/// Reads a persisted state. Absent, unreadable or inconsistent files yield an empty state.
pub fn load(path: &Path) -> BridgeState {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            info!(path = %path.display(), error = %e, "no persisted ledger, starting empty");
            return BridgeState::new();
        }
    };

    let parsed = serde_json::from_slice::<BridgeState>(&content)
        .map_err(|e| e.to_string())
        .and_then(|state| state.check_consistency().map(|()| state));

    match parsed {
        Ok(state) => {
            info!(
                path = %path.display(),
                entries = state.entries.len(),
                watermark = state.last_consumed_sequence,
                "ledger loaded"
            );
            state
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "persisted ledger is malformed, starting empty");
            BridgeState::new()
        }
    }
}

/// Like [`save`], with the file write moved to the blocking pool. Callers keep the
/// state lock across the await so writes land in mutation order.
async fn save_blocking(state: &BridgeState, path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_vec_pretty(state)?;
    write_atomic_blocking(path.to_path_buf(), json)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), entries = state.entries.len(), "ledger saved");
    Ok(())
}

pub fn save(state: &BridgeState, path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_vec_pretty(state)?;
    write_atomic(path, &json).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), entries = state.entries.len(), "ledger saved");
    Ok(())
}
