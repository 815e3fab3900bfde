//! Schema version detection and migration
//!
//! Externally loaded payloads are migrated to the current schema before any
//! validation. Each step only adds fields:
//! - v1 -> v2: `history`
//! - v2 -> v3: `errors`, and `version` when missing
//! - v3 -> v4: explicit `schemaVersion`

use crate::error::SchemaError;
use ficha_model::{now_millis, CURRENT_SCHEMA_VERSION};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;

/// Migration records kept by [`SchemaVersionManager::new`]
pub const DEFAULT_MIGRATION_HISTORY: usize = 100;

/// Record of one migration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Detected version
    pub from_version: u32,
    /// Resulting version
    pub to_version: u32,
    /// When it ran (ms)
    pub timestamp: i64,
    /// Human-readable steps applied
    pub changes: Vec<String>,
}

/// Result of [`SchemaVersionManager::migrate`]
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    /// Payload at the current schema version
    pub value: Value,
    /// Migration record, `None` when the payload was already current
    pub record: Option<MigrationRecord>,
}

/// Summary of migration activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    /// Current schema version
    pub current_version: u32,
    /// Migrations run so far, including records evicted from the history
    pub migration_count: usize,
    /// Most recent migration
    pub last_migration: Option<MigrationRecord>,
}

/// Detect the schema version of a payload
///
/// Uses the explicit `schemaVersion` tag when present, otherwise infers it
/// from field presence.
///
/// # Errors
///
/// Returns [`SchemaError::NotAnObject`] for non-object payloads.
pub fn detect_version(payload: &Value) -> Result<u32, SchemaError> {
    let obj = payload.as_object().ok_or(SchemaError::NotAnObject)?;
    if let Some(explicit) = obj.get("schemaVersion").and_then(Value::as_u64) {
        return Ok(u32::try_from(explicit).unwrap_or(u32::MAX));
    }
    let version = match (obj.contains_key("history"), obj.contains_key("errors")) {
        (true, true) => 3,
        (true, false) => 2,
        _ => 1,
    };
    Ok(version)
}

fn v1_to_v2(obj: &mut Map<String, Value>, changes: &mut Vec<String>) {
    obj.entry("history").or_insert_with(|| json!([]));
    changes.push("v1 -> v2: added history".into());
}

fn v2_to_v3(obj: &mut Map<String, Value>, changes: &mut Vec<String>) {
    obj.entry("errors").or_insert_with(|| json!([]));
    obj.entry("version").or_insert_with(|| json!(1));
    changes.push("v2 -> v3: added errors and version tracking".into());
}

fn v3_to_v4(obj: &mut Map<String, Value>, changes: &mut Vec<String>) {
    obj.insert("schemaVersion".into(), json!(CURRENT_SCHEMA_VERSION));
    changes.push("v3 -> v4: added explicit schemaVersion".into());
}

#[derive(Debug, Default)]
struct MigrationLog {
    records: VecDeque<MigrationRecord>,
    total: usize,
}

/// Stepwise migrator with a bounded migration history
#[derive(Debug)]
pub struct SchemaVersionManager {
    history: Mutex<MigrationLog>,
    capacity: usize,
}

impl Default for SchemaVersionManager {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MIGRATION_HISTORY)
    }
}

impl SchemaVersionManager {
    /// Create new manager keeping [`DEFAULT_MIGRATION_HISTORY`] records
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new manager keeping at most `capacity` migration records
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: Mutex::new(MigrationLog::default()),
            capacity: capacity.max(1),
        }
    }

    /// Migrate a payload to the current schema version
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NotAnObject`] for non-object payloads and
    /// [`SchemaError::Unsupported`] for payloads from a newer schema.
    pub fn migrate(&self, payload: Value) -> Result<Migrated, SchemaError> {
        let from_version = detect_version(&payload)?;
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(SchemaError::Unsupported {
                found: from_version,
                latest: CURRENT_SCHEMA_VERSION,
            });
        }
        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(Migrated {
                value: payload,
                record: None,
            });
        }

        let mut payload = payload;
        let obj = payload.as_object_mut().ok_or(SchemaError::NotAnObject)?;
        let mut changes = Vec::new();
        if from_version < 2 {
            v1_to_v2(obj, &mut changes);
        }
        if from_version < 3 {
            v2_to_v3(obj, &mut changes);
        }
        v3_to_v4(obj, &mut changes);

        let record = MigrationRecord {
            from_version,
            to_version: CURRENT_SCHEMA_VERSION,
            timestamp: now_millis(),
            changes,
        };
        tracing::info!(
            from = record.from_version,
            to = record.to_version,
            steps = record.changes.len(),
            "schema migrated"
        );
        {
            let mut log = self.history.lock();
            log.records.push_back(record.clone());
            log.total += 1;
            while log.records.len() > self.capacity {
                log.records.pop_front();
            }
        }
        Ok(Migrated {
            value: payload,
            record: Some(record),
        })
    }

    /// Most recent migration records, oldest first
    #[must_use]
    pub fn migration_history(&self) -> Vec<MigrationRecord> {
        self.history.lock().records.iter().cloned().collect()
    }

    /// Forget the migration history
    pub fn clear_history(&self) {
        let mut log = self.history.lock();
        log.records.clear();
        log.total = 0;
    }

    /// Summary of migration activity
    #[must_use]
    pub fn info(&self) -> SchemaInfo {
        let log = self.history.lock();
        SchemaInfo {
            current_version: CURRENT_SCHEMA_VERSION,
            migration_count: log.total,
            last_migration: log.records.back().cloned(),
        }
    }
}
