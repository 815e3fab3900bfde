//! Per-ficha history manager
//!
//! Three independent concerns:
//! - Undo/redo: bounded linear stack with a cursor
//! - Snapshots: bounded list of deep copies, oldest evicted
//! - Finalize lock: one-way, freezes the terminal state
//!
//! The cursor counts applied entries. `undo` steps it back and returns the
//! entry it stepped over; `redo` returns the next entry and steps forward.

use crate::config::HistoryConfig;
use crate::error::HistoryError;
use ficha_model::{now_millis, FichaId, FichaState, HistoryEntry, Snapshot, SnapshotTrigger};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Diagnostic summary of a history manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryInfo {
    /// Entries that can be undone
    pub undo_count: usize,
    /// Entries that can be redone
    pub redo_count: usize,
    /// Stored snapshots
    pub snapshot_count: usize,
    /// Lock flag
    pub finalized: bool,
}

/// Serializable form of a history manager
///
/// Carries the undo/redo stack with its cursor, the snapshots and the
/// finalize lock, so both survive a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryExport {
    /// Owning ficha
    pub ficha_id: FichaId,
    /// Entries, oldest first
    pub entries: Vec<HistoryEntry>,
    /// Applied entry count
    pub cursor: usize,
    /// Snapshots, oldest first
    pub snapshots: Vec<Snapshot>,
    /// Frozen terminal state when locked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_state: Option<FichaState>,
    /// Time of the last snapshot (ms)
    pub last_snapshot_at: i64,
}

/// Undo/redo stack, snapshots and finalize lock for one ficha
#[derive(Debug)]
pub struct HistoryManager {
    ficha_id: FichaId,
    config: HistoryConfig,
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    snapshots: VecDeque<Snapshot>,
    finalized_state: Option<FichaState>,
    last_snapshot_at: i64,
}

impl HistoryManager {
    /// Create new empty history
    #[must_use]
    pub fn new(ficha_id: FichaId, config: HistoryConfig) -> Self {
        Self {
            ficha_id,
            config,
            entries: VecDeque::with_capacity(config.max_undo.min(64)),
            cursor: 0,
            snapshots: VecDeque::with_capacity(config.max_snapshots.min(16)),
            finalized_state: None,
            last_snapshot_at: now_millis(),
        }
    }

    /// Rebuild a history from its exported form
    ///
    /// The cursor is clamped to the entry count, and entries and snapshots
    /// beyond the configured bounds are dropped oldest first.
    #[must_use]
    pub fn import(export: HistoryExport, config: HistoryConfig) -> Self {
        let mut entries: VecDeque<HistoryEntry> = export.entries.into();
        let mut cursor = export.cursor.min(entries.len());
        while entries.len() > config.max_undo {
            entries.pop_front();
            cursor = cursor.saturating_sub(1);
        }
        let mut snapshots: VecDeque<Snapshot> = export.snapshots.into();
        while snapshots.len() > config.max_snapshots {
            snapshots.pop_front();
        }
        tracing::debug!(
            ficha_id = %export.ficha_id,
            entries = entries.len(),
            snapshots = snapshots.len(),
            finalized = export.finalized_state.is_some(),
            "history imported"
        );
        Self {
            ficha_id: export.ficha_id,
            config,
            entries,
            cursor,
            snapshots,
            finalized_state: export.finalized_state,
            last_snapshot_at: export.last_snapshot_at,
        }
    }

    /// Serializable copy of the whole history
    #[must_use]
    pub fn export(&self) -> HistoryExport {
        HistoryExport {
            ficha_id: self.ficha_id.clone(),
            entries: self.entries.iter().cloned().collect(),
            cursor: self.cursor,
            snapshots: self.snapshots.iter().cloned().collect(),
            finalized_state: self.finalized_state.clone(),
            last_snapshot_at: self.last_snapshot_at,
        }
    }

    /// Owning ficha
    #[inline]
    #[must_use]
    pub fn ficha_id(&self) -> &FichaId {
        &self.ficha_id
    }

    fn ensure_mutable(&self) -> Result<(), HistoryError> {
        if self.is_finalized() {
            Err(HistoryError::Finalized)
        } else {
            Ok(())
        }
    }

    /// Record an entry, discarding any redo tail
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn add_entry(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.ensure_mutable()?;
        self.entries.truncate(self.cursor);
        self.entries.push_back(entry);
        self.cursor += 1;
        while self.entries.len() > self.config.max_undo {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
        Ok(())
    }

    /// Step back, returning the undone entry, or `None` at the start
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Step forward, returning the redone entry, or `None` at the end
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.entries.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(entry)
    }

    /// Whether there is an entry to undo
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether there is an entry to redo
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// All recorded entries, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of recorded entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every undo/redo entry
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn clear_undo_redo(&mut self) -> Result<(), HistoryError> {
        self.ensure_mutable()?;
        self.reset_stack();
        Ok(())
    }

    fn reset_stack(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    /// Store a deep copy of `state`
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn create_snapshot(
        &mut self,
        state: &FichaState,
        trigger: SnapshotTrigger,
    ) -> Result<Snapshot, HistoryError> {
        self.ensure_mutable()?;
        Ok(self.push_snapshot(Snapshot::capture(state, trigger)))
    }

    fn push_snapshot(&mut self, snapshot: Snapshot) -> Snapshot {
        self.last_snapshot_at = snapshot.timestamp;
        self.snapshots.push_back(snapshot.clone());
        while self.snapshots.len() > self.config.max_snapshots {
            self.snapshots.pop_front();
        }
        tracing::debug!(
            ficha_id = %self.ficha_id,
            snapshot_id = %snapshot.id,
            trigger = ?snapshot.trigger,
            "snapshot created"
        );
        snapshot
    }

    /// Restore a snapshot by id
    ///
    /// Clears the entire undo/redo stack whenever the snapshot exists.
    /// Returns `Ok(None)` for an unknown id.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn restore_snapshot(&mut self, snapshot_id: &str) -> Result<Option<FichaState>, HistoryError> {
        self.ensure_mutable()?;
        let Some(snapshot) = self.snapshots.iter().find(|s| s.id == snapshot_id) else {
            return Ok(None);
        };
        let state = snapshot.state.clone();
        self.reset_stack();
        tracing::info!(ficha_id = %self.ficha_id, snapshot_id, "snapshot restored");
        Ok(Some(state))
    }

    /// Look up a snapshot
    #[must_use]
    pub fn snapshot(&self, snapshot_id: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == snapshot_id)
    }

    /// Most recent snapshot
    #[inline]
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    /// Snapshots, oldest first
    pub fn snapshots(&self) -> impl DoubleEndedIterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    /// Number of stored snapshots
    #[inline]
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Delete a snapshot, returning whether it existed
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn delete_snapshot(&mut self, snapshot_id: &str) -> Result<bool, HistoryError> {
        self.ensure_mutable()?;
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.id != snapshot_id);
        Ok(self.snapshots.len() != before)
    }

    /// Keep only the `keep` most recent snapshots, returning how many were dropped
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn prune_snapshots(&mut self, keep: usize) -> Result<usize, HistoryError> {
        self.ensure_mutable()?;
        let excess = self.snapshots.len().saturating_sub(keep);
        for _ in 0..excess {
            self.snapshots.pop_front();
        }
        Ok(excess)
    }

    /// Whether the auto-snapshot interval has elapsed
    #[inline]
    #[must_use]
    pub fn should_auto_snapshot(&self) -> bool {
        self.should_auto_snapshot_at(now_millis())
    }

    /// Whether the auto-snapshot interval has elapsed at `now` (ms)
    #[must_use]
    pub fn should_auto_snapshot_at(&self, now: i64) -> bool {
        if self.is_finalized() {
            return false;
        }
        let interval = i64::try_from(self.config.auto_snapshot_interval_ms).unwrap_or(i64::MAX);
        now.saturating_sub(self.last_snapshot_at) >= interval
    }

    /// Lock the history, freezing a copy of `final_state`
    ///
    /// Also records a final manual snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::AlreadyFinalized`] on a second call.
    pub fn finalize(&mut self, final_state: &FichaState) -> Result<Snapshot, HistoryError> {
        if self.is_finalized() {
            return Err(HistoryError::AlreadyFinalized);
        }
        let snapshot = self.push_snapshot(
            Snapshot::capture(final_state, SnapshotTrigger::Manual).with_description("final"),
        );
        self.finalized_state = Some(final_state.clone());
        tracing::info!(ficha_id = %self.ficha_id, "history finalized");
        Ok(snapshot)
    }

    /// Lock flag
    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized_state.is_some()
    }

    /// Frozen terminal state
    #[inline]
    #[must_use]
    pub fn finalized_state(&self) -> Option<&FichaState> {
        self.finalized_state.as_ref()
    }

    /// Diagnostic summary
    #[must_use]
    pub fn info(&self) -> HistoryInfo {
        HistoryInfo {
            undo_count: self.cursor,
            redo_count: self.entries.len() - self.cursor,
            snapshot_count: self.snapshots.len(),
            finalized: self.is_finalized(),
        }
    }
}
