use super::{PersistenceLayer, SaveOutcome, StorageAdapter};
use crate::error::StoreError;
use crate::logging::{EventKind, EventSeverity};
use crate::registry::FichaRegistry;
use crate::schema::SchemaVersionManager;
use async_trait::async_trait;
use dashmap::DashMap;
use ficha_model::{now_millis, FichaId, FichaState};
use ficha_validate::{validate_structure, FinalValidator};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Persistence operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum PersistOperation {
    Save,
    Load,
}

/// One entry of the persistence log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistRecord {
    /// Ficha concerned
    pub ficha_id: FichaId,
    /// Operation
    pub operation: PersistOperation,
    /// Whether it succeeded
    pub success: bool,
    /// When it happened (ms)
    pub timestamp: i64,
    /// Description
    pub message: String,
}

/// Validated persistence over a [`StorageAdapter`]
///
/// Never writes a state that fails business validation, so a good stored
/// state is never overwritten by a broken one.
pub struct SafePersist {
    storage: Arc<dyn StorageAdapter>,
    validator: Arc<FinalValidator>,
    registry: Arc<FichaRegistry>,
    schema: SchemaVersionManager,
    last_valid: DashMap<FichaId, FichaState>,
    log: Mutex<VecDeque<PersistRecord>>,
    log_capacity: usize,
}

impl std::fmt::Debug for SafePersist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafePersist")
            .field("last_valid", &self.last_valid.len())
            .field("log_capacity", &self.log_capacity)
            .finish_non_exhaustive()
    }
}

fn storage_key(ficha_id: &FichaId) -> String {
    format!("ficha:{ficha_id}")
}

impl SafePersist {
    /// Create new persistence layer
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        validator: Arc<FinalValidator>,
        registry: Arc<FichaRegistry>,
    ) -> Self {
        let log_capacity = registry.config().persistence.log_capacity.max(1);
        Self {
            storage,
            validator,
            registry,
            schema: SchemaVersionManager::with_capacity(log_capacity),
            last_valid: DashMap::new(),
            log: Mutex::new(VecDeque::new()),
            log_capacity,
        }
    }

    fn record(&self, ficha_id: &FichaId, operation: PersistOperation, success: bool, message: impl Into<String>) {
        let mut log = self.log.lock();
        log.push_back(PersistRecord {
            ficha_id: ficha_id.clone(),
            operation,
            success,
            timestamp: now_millis(),
            message: message.into(),
        });
        while log.len() > self.log_capacity {
            log.pop_front();
        }
    }

    async fn save_validated(
        &self,
        ficha_id: &FichaId,
        state: &FichaState,
    ) -> Result<SaveOutcome, StoreError> {
        let events = self.registry.event_log(ficha_id);
        let report = self.validator.validate(state);
        if !report.valid {
            let message = format!("invalid state: {}", report.errors.join(", "));
            events.log(
                EventKind::Validate,
                &message,
                EventSeverity::Error,
                Some(serde_json::json!({ "errors": report.errors })),
            );
            self.record(ficha_id, PersistOperation::Save, false, format!("save rejected: {message}"));
            return Ok(SaveOutcome::Rejected {
                reasons: report.errors,
            });
        }

        let value = serde_json::to_value(state)?;
        let size = value.to_string().len();
        if let Err(err) = self.storage.save(&storage_key(ficha_id), value).await {
            events.log_error(
                format!("save failed: {err}"),
                Some(serde_json::json!({ "context": "safe_save" })),
            );
            self.record(ficha_id, PersistOperation::Save, false, format!("save failed: {err}"));
            return Err(err);
        }

        self.last_valid.insert(ficha_id.clone(), state.clone());
        events.log(
            EventKind::Snapshot,
            "state saved",
            EventSeverity::Info,
            Some(serde_json::json!({ "size": size, "version": state.version })),
        );
        self.record(ficha_id, PersistOperation::Save, true, "state saved");
        Ok(SaveOutcome::Saved)
    }

    /// Load, migrate and validate the stored state of a ficha
    ///
    /// Corrupt, unreadable or invalid payloads yield `None` and a warning
    /// event; the stored payload is left untouched.
    pub async fn safe_load(&self, ficha_id: &FichaId) -> Option<FichaState> {
        let events = self.registry.event_log(ficha_id);
        let raw = match self.storage.load(&storage_key(ficha_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                events.log_error(
                    format!("load failed: {err}"),
                    Some(serde_json::json!({ "context": "safe_load" })),
                );
                self.record(ficha_id, PersistOperation::Load, false, format!("load failed: {err}"));
                return None;
            }
        };

        match self.decode(raw) {
            Ok(state) => {
                self.last_valid.insert(ficha_id.clone(), state.clone());
                self.record(ficha_id, PersistOperation::Load, true, "state loaded");
                Some(state)
            }
            Err(errors) => {
                events.log(
                    EventKind::Error,
                    "corrupt state detected",
                    EventSeverity::Warning,
                    Some(serde_json::json!({ "errors": errors })),
                );
                self.record(ficha_id, PersistOperation::Load, false, "corrupt state detected");
                None
            }
        }
    }

    fn decode(&self, raw: serde_json::Value) -> Result<FichaState, Vec<String>> {
        let migrated = self
            .schema
            .migrate(raw)
            .map_err(|err| vec![err.to_string()])?;
        let structure = validate_structure(&migrated.value);
        if !structure.valid {
            return Err(structure
                .critical()
                .map(|issue| format!("{}: {}", issue.field, issue.message))
                .collect());
        }
        let state = FichaState::from_value(migrated.value).map_err(|err| vec![err.to_string()])?;
        let report = self.validator.validate(&state);
        if report.valid {
            Ok(state)
        } else {
            Err(report.errors)
        }
    }

    /// Delete the stored state of a ficha
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn delete(&self, ficha_id: &FichaId) -> Result<bool, StoreError> {
        self.last_valid.remove(ficha_id);
        self.storage.delete(&storage_key(ficha_id)).await
    }

    /// Last state of a ficha that passed validation
    #[must_use]
    pub fn last_valid(&self, ficha_id: &FichaId) -> Option<FichaState> {
        self.last_valid.get(ficha_id).map(|s| s.value().clone())
    }

    /// Record a known-good state without storing it
    pub fn set_last_valid(&self, ficha_id: &FichaId, state: &FichaState) {
        self.last_valid.insert(ficha_id.clone(), state.clone());
    }

    /// Forget the last valid state of a ficha
    pub fn clear_last_valid(&self, ficha_id: &FichaId) {
        self.last_valid.remove(ficha_id);
    }

    /// Persistence log, oldest first
    #[must_use]
    pub fn persistence_log(&self) -> Vec<PersistRecord> {
        self.log.lock().iter().cloned().collect()
    }

    /// Drop the persistence log
    pub fn clear_persistence_log(&self) {
        self.log.lock().clear();
    }

    /// Schema migrations run by loads
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &SchemaVersionManager {
        &self.schema
    }
}

#[async_trait]
impl PersistenceLayer for SafePersist {
    async fn last_valid_state(&self, ficha_id: &FichaId) -> Result<Option<FichaState>, StoreError> {
        Ok(self.last_valid(ficha_id))
    }

    async fn safe_save(&self, ficha_id: &FichaId, state: &FichaState) -> Result<SaveOutcome, StoreError> {
        self.save_validated(ficha_id, state).await
    }
}
