//! Per-ficha manager registry
//!
//! Explicit container holding one state machine, history manager, event log
//! and lifecycle manager per ficha, keyed by ficha id. Get-or-create is the
//! only creation path, so a ficha never has two managers of the same kind.
//! Each mutable manager sits behind its own mutex.

use crate::config::KernelConfig;
use crate::history::{HistoryExport, HistoryManager};
use crate::lifecycle::LifecycleManager;
use crate::logging::EventLog;
use crate::state_machine::FichaStateMachine;
use dashmap::DashMap;
use ficha_model::{FichaId, FichaStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to a ficha's state machine
pub type MachineHandle = Arc<Mutex<FichaStateMachine>>;

/// Shared handle to a ficha's history manager
pub type HistoryHandle = Arc<Mutex<HistoryManager>>;

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Live state machines
    pub machines: usize,
    /// Live history managers
    pub histories: usize,
    /// Live event logs
    pub event_logs: usize,
    /// Live lifecycle managers
    pub lifecycles: usize,
}

/// Registry of per-ficha managers
#[derive(Debug)]
pub struct FichaRegistry {
    config: KernelConfig,
    machines: DashMap<FichaId, MachineHandle>,
    histories: DashMap<FichaId, HistoryHandle>,
    event_logs: DashMap<FichaId, Arc<EventLog>>,
    lifecycles: DashMap<FichaId, Arc<LifecycleManager>>,
}

impl Default for FichaRegistry {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl FichaRegistry {
    /// Create new empty registry
    #[must_use]
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            machines: DashMap::new(),
            histories: DashMap::new(),
            event_logs: DashMap::new(),
            lifecycles: DashMap::new(),
        }
    }

    /// Configuration used for new managers
    #[inline]
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Get or create the state machine of a ficha
    pub fn machine(&self, ficha_id: &FichaId) -> MachineHandle {
        self.machines
            .entry(ficha_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(FichaStateMachine::new(ficha_id.clone()))))
            .clone()
    }

    /// Get or create the state machine of a ficha, starting at `status`
    /// when it does not exist yet
    pub fn machine_at(&self, ficha_id: &FichaId, status: FichaStatus) -> MachineHandle {
        self.machines
            .entry(ficha_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(FichaStateMachine::with_state(
                    ficha_id.clone(),
                    status,
                )))
            })
            .clone()
    }

    /// Existing state machine of a ficha
    #[must_use]
    pub fn get_machine(&self, ficha_id: &FichaId) -> Option<MachineHandle> {
        self.machines.get(ficha_id).map(|m| Arc::clone(&m))
    }

    /// Reset the state machine of a ficha to `status` in place
    ///
    /// Creates the machine when missing. Existing handles keep pointing at
    /// the same machine.
    pub fn reset_machine(&self, ficha_id: &FichaId, status: FichaStatus) -> MachineHandle {
        let machine = self.machine_at(ficha_id, status);
        machine.lock().reset_to(status);
        machine
    }

    /// Get or create the history manager of a ficha
    pub fn history(&self, ficha_id: &FichaId) -> HistoryHandle {
        self.histories
            .entry(ficha_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(HistoryManager::new(
                    ficha_id.clone(),
                    self.config.history,
                )))
            })
            .clone()
    }

    /// Load an exported history into the ficha's history manager
    ///
    /// The manager is replaced in place, so existing handles see the
    /// imported stack, snapshots and lock.
    pub fn import_history(&self, export: HistoryExport) -> HistoryHandle {
        let handle = self.history(&export.ficha_id);
        *handle.lock() = HistoryManager::import(export, self.config.history);
        handle
    }

    /// Existing history manager of a ficha
    #[must_use]
    pub fn get_history(&self, ficha_id: &FichaId) -> Option<HistoryHandle> {
        self.histories.get(ficha_id).map(|h| Arc::clone(&h))
    }

    /// Get or create the event log of a ficha
    pub fn event_log(&self, ficha_id: &FichaId) -> Arc<EventLog> {
        self.event_logs
            .entry(ficha_id.clone())
            .or_insert_with(|| {
                Arc::new(EventLog::new(ficha_id.clone(), self.config.event_log.capacity))
            })
            .clone()
    }

    /// Existing event log of a ficha
    #[must_use]
    pub fn get_event_log(&self, ficha_id: &FichaId) -> Option<Arc<EventLog>> {
        self.event_logs.get(ficha_id).map(|l| Arc::clone(&l))
    }

    /// Get or create the lifecycle manager of a ficha
    pub fn lifecycle(&self, ficha_id: &FichaId) -> Arc<LifecycleManager> {
        self.lifecycles
            .entry(ficha_id.clone())
            .or_insert_with(|| Arc::new(LifecycleManager::new(ficha_id.clone())))
            .clone()
    }

    /// Existing lifecycle manager of a ficha
    #[must_use]
    pub fn get_lifecycle(&self, ficha_id: &FichaId) -> Option<Arc<LifecycleManager>> {
        self.lifecycles.get(ficha_id).map(|l| Arc::clone(&l))
    }

    /// Drop every manager of a ficha, returning whether any existed
    pub fn remove(&self, ficha_id: &FichaId) -> bool {
        let removed = [
            self.machines.remove(ficha_id).is_some(),
            self.histories.remove(ficha_id).is_some(),
            self.event_logs.remove(ficha_id).is_some(),
            self.lifecycles.remove(ficha_id).is_some(),
        ];
        let any = removed.iter().any(|r| *r);
        if any {
            tracing::debug!(%ficha_id, "ficha managers removed");
        }
        any
    }

    /// Destroy the lifecycle of a ficha, then drop every manager
    pub async fn remove_and_destroy(&self, ficha_id: &FichaId) -> bool {
        if let Some(lifecycle) = self.get_lifecycle(ficha_id) {
            lifecycle.destroy().await;
        }
        self.remove(ficha_id)
    }

    /// Drop every manager of every ficha
    pub fn clear(&self) {
        self.machines.clear();
        self.histories.clear();
        self.event_logs.clear();
        self.lifecycles.clear();
    }

    /// Ids of every ficha with at least one manager
    #[must_use]
    pub fn ficha_ids(&self) -> Vec<FichaId> {
        let mut ids: Vec<FichaId> = self
            .machines
            .iter()
            .map(|e| e.key().clone())
            .chain(self.histories.iter().map(|e| e.key().clone()))
            .chain(self.event_logs.iter().map(|e| e.key().clone()))
            .chain(self.lifecycles.iter().map(|e| e.key().clone()))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Registry statistics
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            machines: self.machines.len(),
            histories: self.histories.len(),
            event_logs: self.event_logs.len(),
            lifecycles: self.lifecycles.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::FichaEvent;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = FichaRegistry::default();
        let id = FichaId::new("a");
        let first = registry.machine(&id);
        let second = registry.machine(&id);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&registry.event_log(&id), &registry.event_log(&id)));
        assert!(Arc::ptr_eq(&registry.history(&id), &registry.history(&id)));
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = FichaRegistry::default();
        let id = FichaId::new("a");
        assert!(registry.get_machine(&id).is_none());
        assert!(registry.get_history(&id).is_none());
        assert!(registry.get_event_log(&id).is_none());
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn test_remove() {
        let registry = FichaRegistry::default();
        let id = FichaId::new("a");
        registry.machine(&id);
        registry.event_log(&id);
        assert_eq!(registry.ficha_ids(), vec![id.clone()]);
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.ficha_ids().is_empty());
    }

    #[test]
    fn test_machine_at_only_applies_on_create() {
        let registry = FichaRegistry::default();
        let id = FichaId::new("a");
        registry
            .machine(&id)
            .lock()
            .transition(FichaEvent::StartEditing, None)
            .unwrap();
        let machine = registry.machine_at(&id, FichaStatus::Complete);
        assert_eq!(machine.lock().current(), FichaStatus::Editing);

        let reset = registry.reset_machine(&id, FichaStatus::Draft);
        assert!(Arc::ptr_eq(&reset, &machine));
        assert_eq!(machine.lock().current(), FichaStatus::Draft);
        assert!(machine.lock().transitions().is_empty());
    }
}
