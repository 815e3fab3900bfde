//! Recovery pipeline
//!
//! Produces a usable state for a ficha in a fixed order:
//! 1. Last valid state, if it still passes business validation
//! 2. Stored snapshots, newest first, the first that passes
//! 3. Base state stamped with the ficha id
//!
//! The last step cannot fail, so [`Recovery::recover`] always returns a
//! state. A store failure skips straight to the base state and reports
//! `success = false`.

use crate::error::StoreError;
use crate::logging::{EventKind, EventSeverity};
use crate::persistence::{PersistenceLayer, SnapshotStore};
use crate::registry::FichaRegistry;
use async_trait::async_trait;
use ficha_model::{now_millis, FichaId, FichaState, RecoverySource};
use ficha_validate::FinalValidator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Outcome of one recovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResult {
    /// False only when a store failure forced the base state
    pub success: bool,
    /// Recovered state
    pub state: FichaState,
    /// Where the state came from
    pub source: RecoverySource,
    /// Description
    pub message: String,
    /// When recovery ran (ms)
    pub timestamp: i64,
}

/// Anything that can recover a ficha state
#[async_trait]
pub trait Recovery: Send + Sync {
    /// Produce a usable state for `ficha_id`; never fails
    async fn recover(&self, ficha_id: &FichaId) -> RecoveryResult;
}

/// Ordered recovery over a persistence layer and a snapshot store
pub struct RecoveryManager {
    persistence: Arc<dyn PersistenceLayer>,
    snapshots: Arc<dyn SnapshotStore>,
    validator: Arc<FinalValidator>,
    registry: Arc<FichaRegistry>,
    log: Mutex<VecDeque<RecoveryResult>>,
    log_capacity: usize,
}

impl std::fmt::Debug for RecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryManager")
            .field("log_len", &self.log.lock().len())
            .field("log_capacity", &self.log_capacity)
            .finish_non_exhaustive()
    }
}

impl RecoveryManager {
    /// Create new recovery manager
    #[must_use]
    pub fn new(
        persistence: Arc<dyn PersistenceLayer>,
        snapshots: Arc<dyn SnapshotStore>,
        validator: Arc<FinalValidator>,
        registry: Arc<FichaRegistry>,
    ) -> Self {
        let log_capacity = registry.config().recovery.log_capacity.max(1);
        Self {
            persistence,
            snapshots,
            validator,
            registry,
            log: Mutex::new(VecDeque::new()),
            log_capacity,
        }
    }

    async fn try_stores(&self, ficha_id: &FichaId) -> Result<Option<(FichaState, RecoverySource)>, StoreError> {
        if let Some(state) = self.persistence.last_valid_state(ficha_id).await? {
            if self.validator.is_valid(&state) {
                return Ok(Some((state, RecoverySource::LastValid)));
            }
            tracing::debug!(%ficha_id, "last valid state no longer validates");
        }

        for state in self.snapshots.all_snapshots(ficha_id).await? {
            if self.validator.is_valid(&state) {
                return Ok(Some((state, RecoverySource::Snapshot)));
            }
        }
        Ok(None)
    }

    fn record(&self, result: &RecoveryResult) {
        let mut log = self.log.lock();
        log.push_back(result.clone());
        while log.len() > self.log_capacity {
            log.pop_front();
        }
    }

    /// Return `state` as is when it validates, otherwise recover
    pub async fn validate_and_recover(&self, ficha_id: &FichaId, state: FichaState) -> RecoveryResult {
        let report = self.validator.validate(&state);
        if report.valid {
            return RecoveryResult {
                success: true,
                state,
                source: RecoverySource::LastValid,
                message: "state is valid".into(),
                timestamp: now_millis(),
            };
        }

        self.registry.event_log(ficha_id).log(
            EventKind::Validate,
            "invalid state detected",
            EventSeverity::Warning,
            Some(serde_json::json!({ "errors": report.errors })),
        );
        self.recover(ficha_id).await
    }

    /// Recovery runs so far, oldest first
    #[must_use]
    pub fn recovery_log(&self) -> Vec<RecoveryResult> {
        self.log.lock().iter().cloned().collect()
    }

    /// Drop the recovery log
    pub fn clear_log(&self) {
        self.log.lock().clear();
    }
}

#[async_trait]
impl Recovery for RecoveryManager {
    async fn recover(&self, ficha_id: &FichaId) -> RecoveryResult {
        let timestamp = now_millis();
        let events = self.registry.event_log(ficha_id);

        let result = match self.try_stores(ficha_id).await {
            Ok(Some((state, source))) => {
                let message = match source {
                    RecoverySource::LastValid => "recovered from last valid state",
                    _ => "recovered from snapshot",
                };
                events.log_restore(
                    message,
                    EventSeverity::Info,
                    Some(serde_json::json!({ "source": source })),
                );
                RecoveryResult {
                    success: true,
                    state,
                    source,
                    message: message.into(),
                    timestamp,
                }
            }
            Ok(None) => {
                events.log_restore(
                    "recovered from base state",
                    EventSeverity::Warning,
                    Some(serde_json::json!({ "source": RecoverySource::Base })),
                );
                RecoveryResult {
                    success: true,
                    state: FichaState::base(ficha_id),
                    source: RecoverySource::Base,
                    message: "recovered from base state (reset)".into(),
                    timestamp,
                }
            }
            Err(err) => {
                tracing::warn!(%ficha_id, error = %err, "recovery store failure, using base state");
                events.log_error(
                    format!("recovery failed: {err}"),
                    Some(serde_json::json!({ "context": "recover" })),
                );
                RecoveryResult {
                    success: false,
                    state: FichaState::base(ficha_id),
                    source: RecoverySource::Base,
                    message: format!("recovery failed: {err}; using base state"),
                    timestamp,
                }
            }
        };

        tracing::info!(%ficha_id, source = result.source.as_str(), success = result.success, "recovery completed");
        self.record(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemorySnapshotStore, InMemoryStorage, SafePersist};
    use ficha_model::{Snapshot, SnapshotTrigger};
    use ficha_test_utils::valid_ficha;

    fn manager() -> (RecoveryManager, Arc<SafePersist>, Arc<InMemorySnapshotStore>) {
        let registry = Arc::new(FichaRegistry::default());
        let validator = Arc::new(FinalValidator::default());
        let persist = Arc::new(SafePersist::new(
            Arc::new(InMemoryStorage::new()),
            Arc::clone(&validator),
            Arc::clone(&registry),
        ));
        let snapshots = Arc::new(InMemorySnapshotStore::default());
        let manager = RecoveryManager::new(
            Arc::clone(&persist) as Arc<dyn PersistenceLayer>,
            Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
            validator,
            registry,
        );
        (manager, persist, snapshots)
    }

    #[tokio::test]
    async fn test_prefers_last_valid_over_snapshot() {
        let (manager, persist, snapshots) = manager();
        let id = FichaId::new("r1");
        let mut snap = valid_ficha("r1");
        snap.version = 2;
        snapshots.save_snapshot(Snapshot::capture(&snap, SnapshotTrigger::Auto));
        let mut last = valid_ficha("r1");
        last.version = 7;
        persist.set_last_valid(&id, &last);

        let result = manager.recover(&id).await;
        assert!(result.success);
        assert_eq!(result.source, RecoverySource::LastValid);
        assert_eq!(result.state.version, 7);
    }

    #[tokio::test]
    async fn test_log_is_bounded() {
        let (manager, _, _) = manager();
        let id = FichaId::new("r2");
        for _ in 0..60 {
            manager.recover(&id).await;
        }
        assert_eq!(manager.recovery_log().len(), 50);
        manager.clear_log();
        assert!(manager.recovery_log().is_empty());
    }
}
