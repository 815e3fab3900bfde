use ficha_kernel::error::SchemaError;
use ficha_kernel::schema::{detect_version, SchemaVersionManager};
use ficha_model::{FichaState, CURRENT_SCHEMA_VERSION};
use ficha_test_utils::valid_ficha_json;
use proptest::prelude::*;
use serde_json::{json, Value};

fn legacy(keep_history: bool, keep_errors: bool, keep_version: bool) -> Value {
    let mut payload = valid_ficha_json("m");
    let obj = payload.as_object_mut().unwrap();
    obj.remove("schemaVersion");
    if !keep_history {
        obj.remove("history");
    }
    if !keep_errors {
        obj.remove("errors");
    }
    if !keep_version {
        obj.remove("version");
    }
    payload
}

#[test]
fn test_detect_version() {
    assert_eq!(detect_version(&legacy(false, false, true)), Ok(1));
    assert_eq!(detect_version(&legacy(true, false, true)), Ok(2));
    assert_eq!(detect_version(&legacy(true, true, true)), Ok(3));
    assert_eq!(detect_version(&valid_ficha_json("m")), Ok(CURRENT_SCHEMA_VERSION));
    assert_eq!(detect_version(&json!([1, 2])), Err(SchemaError::NotAnObject));
}

#[test]
fn test_version_counter_is_not_schema_version() {
    let mut payload = legacy(false, false, true);
    payload["version"] = json!(4);
    assert_eq!(detect_version(&payload), Ok(1));
}

#[test]
fn test_v1_migrates_to_current() {
    let manager = SchemaVersionManager::new();
    let migrated = manager.migrate(legacy(false, false, false)).unwrap();

    let record = migrated.record.unwrap();
    assert_eq!(record.from_version, 1);
    assert_eq!(record.to_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(record.changes.len(), 3);

    assert_eq!(migrated.value["history"], json!([]));
    assert_eq!(migrated.value["errors"], json!([]));
    assert_eq!(migrated.value["version"], json!(1));
    assert_eq!(migrated.value["schemaVersion"], json!(CURRENT_SCHEMA_VERSION));
    assert!(FichaState::from_value(migrated.value).is_ok());
}

#[test]
fn test_current_payload_is_untouched() {
    let manager = SchemaVersionManager::new();
    let payload = valid_ficha_json("m");
    let migrated = manager.migrate(payload.clone()).unwrap();
    assert_eq!(migrated.value, payload);
    assert!(migrated.record.is_none());
    assert_eq!(manager.info().migration_count, 0);
}

#[test]
fn test_newer_schema_unsupported() {
    let manager = SchemaVersionManager::new();
    let mut payload = valid_ficha_json("m");
    payload["schemaVersion"] = json!(CURRENT_SCHEMA_VERSION + 1);
    assert_eq!(
        manager.migrate(payload),
        Err(SchemaError::Unsupported {
            found: CURRENT_SCHEMA_VERSION + 1,
            latest: CURRENT_SCHEMA_VERSION,
        })
    );
}

#[test]
fn test_history_and_clear() {
    let manager = SchemaVersionManager::new();
    manager.migrate(legacy(false, false, true)).unwrap();
    manager.migrate(legacy(true, true, true)).unwrap();

    let history = manager.migration_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].from_version, 3);
    assert_eq!(manager.info().last_migration, Some(history[1].clone()));

    manager.clear_history();
    assert!(manager.migration_history().is_empty());
}

proptest! {
    #[test]
    fn prop_migration_is_idempotent(
        keep_history in any::<bool>(),
        keep_errors in any::<bool>(),
        keep_version in any::<bool>(),
    ) {
        let manager = SchemaVersionManager::new();
        let once = manager.migrate(legacy(keep_history, keep_errors, keep_version)).unwrap();
        let twice = manager.migrate(once.value.clone()).unwrap();
        prop_assert_eq!(&twice.value, &once.value);
        prop_assert!(twice.record.is_none());
        prop_assert_eq!(detect_version(&once.value), Ok(CURRENT_SCHEMA_VERSION));
    }
}

#[test]
fn test_history_is_bounded_but_count_is_total() {
    let manager = SchemaVersionManager::with_capacity(3);
    for _ in 0..5 {
        manager.migrate(legacy(true, false, true)).unwrap();
    }
    assert_eq!(manager.migration_history().len(), 3);

    let info = manager.info();
    assert_eq!(info.migration_count, 5);
    assert_eq!(info.last_migration.unwrap().from_version, 2);
}
