use super::SnapshotStore;
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use ficha_model::{FichaId, FichaState, Snapshot};
use std::collections::VecDeque;

/// Bounded per-ficha snapshot store; oldest snapshots are evicted
#[derive(Debug)]
pub struct InMemorySnapshotStore {
    capacity: usize,
    snapshots: DashMap<FichaId, VecDeque<Snapshot>>,
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new(10)
    }
}

impl InMemorySnapshotStore {
    /// Create new store keeping `capacity` snapshots per ficha
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            snapshots: DashMap::new(),
        }
    }

    /// Store a snapshot under its ficha
    pub fn save_snapshot(&self, snapshot: Snapshot) {
        let mut entry = self.snapshots.entry(snapshot.ficha_id.clone()).or_default();
        entry.push_back(snapshot);
        while entry.len() > self.capacity {
            entry.pop_front();
        }
    }

    /// Snapshots of a ficha, newest first
    #[must_use]
    pub fn snapshots(&self, ficha_id: &FichaId) -> Vec<Snapshot> {
        self.snapshots
            .get(ficha_id)
            .map(|s| s.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every snapshot of a ficha
    pub fn clear(&self, ficha_id: &FichaId) -> usize {
        self.snapshots
            .remove(ficha_id)
            .map_or(0, |(_, snapshots)| snapshots.len())
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn latest_snapshot(&self, ficha_id: &FichaId) -> Result<Option<FichaState>, StoreError> {
        Ok(self
            .snapshots
            .get(ficha_id)
            .and_then(|s| s.back().map(|snapshot| snapshot.state.clone())))
    }

    async fn all_snapshots(&self, ficha_id: &FichaId) -> Result<Vec<FichaState>, StoreError> {
        Ok(self
            .snapshots(ficha_id)
            .into_iter()
            .map(|snapshot| snapshot.state)
            .collect())
    }
}
