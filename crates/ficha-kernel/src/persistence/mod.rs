//! Persistence contracts and implementations
//!
//! - [`SnapshotStore`]: snapshots per ficha, newest first
//! - [`PersistenceLayer`]: last valid state and validated save
//! - [`StorageAdapter`]: raw key/value JSON storage behind [`SafePersist`]

mod safe_persist;
mod snapshot_store;
mod storage;

pub use safe_persist::{PersistOperation, PersistRecord, SafePersist};
pub use snapshot_store::InMemorySnapshotStore;
pub use storage::{InMemoryStorage, StorageAdapter};

use crate::error::StoreError;
use async_trait::async_trait;
use ficha_model::{FichaId, FichaState};
use serde::{Deserialize, Serialize};

/// Read access to stored snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Most recent snapshot state of a ficha
    async fn latest_snapshot(&self, ficha_id: &FichaId) -> Result<Option<FichaState>, StoreError>;

    /// Every snapshot state of a ficha, newest first
    async fn all_snapshots(&self, ficha_id: &FichaId) -> Result<Vec<FichaState>, StoreError>;
}

/// Outcome of a validated save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SaveOutcome {
    /// Stored and recorded as last valid state
    Saved,
    /// Refused by validation; nothing was written
    Rejected {
        /// Validator errors
        reasons: Vec<String>,
    },
}

impl SaveOutcome {
    /// Whether the state was stored
    #[inline]
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// Validated persistence
#[async_trait]
pub trait PersistenceLayer: Send + Sync {
    /// Last state of a ficha that passed validation
    async fn last_valid_state(&self, ficha_id: &FichaId) -> Result<Option<FichaState>, StoreError>;

    /// Store `state` if it passes validation
    async fn safe_save(&self, ficha_id: &FichaId, state: &FichaState) -> Result<SaveOutcome, StoreError>;
}
