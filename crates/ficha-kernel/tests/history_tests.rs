use ficha_kernel::config::HistoryConfig;
use ficha_kernel::error::HistoryError;
use ficha_kernel::history::{HistoryExport, HistoryManager};
use ficha_model::{FichaId, FichaState, HistoryEntry, SnapshotTrigger};
use ficha_test_utils::valid_ficha;
use proptest::prelude::*;
use serde_json::json;

fn manager() -> HistoryManager {
    HistoryManager::new(FichaId::new("h"), HistoryConfig::default())
}

fn entry(n: usize) -> HistoryEntry {
    HistoryEntry::new("edit_field", json!({ "n": n }), json!({ "n": n + 1 }))
}

#[test]
fn test_undo_redo_pointer() {
    let mut history = manager();
    for n in 0..3 {
        history.add_entry(entry(n)).unwrap();
    }
    assert_eq!(history.undo().unwrap().previous_state, json!({ "n": 2 }));
    assert_eq!(history.undo().unwrap().previous_state, json!({ "n": 1 }));
    assert!(history.can_redo());
    assert_eq!(history.redo().unwrap().new_state, json!({ "n": 2 }));

    // A new entry drops the redo tail
    history.add_entry(entry(10)).unwrap();
    assert!(!history.can_redo());
    assert_eq!(history.len(), 3);
}

#[test]
fn test_restore_snapshot_clears_undo_redo() {
    let mut history = manager();
    let state = ficha_test_utils::valid_ficha("h");
    let snapshot = history.create_snapshot(&state, SnapshotTrigger::Manual).unwrap();
    for n in 0..4 {
        history.add_entry(entry(n)).unwrap();
    }
    history.undo();

    let restored = history.restore_snapshot(&snapshot.id).unwrap().unwrap();
    assert_eq!(restored, state);
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert!(history.is_empty());
}

#[test]
fn test_unknown_snapshot_keeps_stack() {
    let mut history = manager();
    history.add_entry(entry(0)).unwrap();
    assert_eq!(history.restore_snapshot("missing").unwrap(), None);
    assert!(history.can_undo());
}

#[test]
fn test_finalize_locks_history() {
    let mut history = manager();
    let state = ficha_test_utils::valid_ficha("h");
    let snapshot = history.finalize(&state).unwrap();
    assert_eq!(snapshot.trigger, SnapshotTrigger::Manual);
    assert_eq!(snapshot.description.as_deref(), Some("final"));
    assert_eq!(history.finalized_state(), Some(&state));

    assert_eq!(history.add_entry(entry(0)), Err(HistoryError::Finalized));
    assert_eq!(
        history
            .create_snapshot(&state, SnapshotTrigger::Auto)
            .unwrap_err(),
        HistoryError::Finalized
    );
    assert_eq!(
        history.restore_snapshot(&snapshot.id).unwrap_err(),
        HistoryError::Finalized
    );
    assert_eq!(history.clear_undo_redo(), Err(HistoryError::Finalized));
    assert_eq!(history.finalize(&state).unwrap_err(), HistoryError::AlreadyFinalized);
}

#[test]
fn test_snapshot_is_deep_copy() {
    let mut history = manager();
    let mut state = ficha_test_utils::valid_ficha("h");
    let snapshot = history.create_snapshot(&state, SnapshotTrigger::PreAction).unwrap();
    state.pozo_id = "changed".into();
    assert_eq!(history.snapshot(&snapshot.id).unwrap().state.pozo_id, "PZ-h");
}

#[test]
fn test_auto_snapshot_interval() {
    let config = HistoryConfig {
        auto_snapshot_interval_ms: 1_000,
        ..HistoryConfig::default()
    };
    let mut history = HistoryManager::new(FichaId::new("h"), config);
    let state = FichaState::base(&FichaId::new("h"));
    let snapshot = history.create_snapshot(&state, SnapshotTrigger::Auto).unwrap();
    assert!(!history.should_auto_snapshot_at(snapshot.timestamp + 999));
    assert!(history.should_auto_snapshot_at(snapshot.timestamp + 1_000));
}

#[test]
fn test_export_import_keeps_cursor_and_lock() {
    let mut history = manager();
    for n in 0..3 {
        history.add_entry(entry(n)).unwrap();
    }
    history.undo();
    let state = valid_ficha("h");
    history.create_snapshot(&state, SnapshotTrigger::Auto).unwrap();
    history.finalize(&state).unwrap();

    let json = serde_json::to_string(&history.export()).unwrap();
    let export: HistoryExport = serde_json::from_str(&json).unwrap();
    let mut reloaded = HistoryManager::import(export, HistoryConfig::default());

    assert_eq!(reloaded.info(), history.info());
    assert_eq!(reloaded.entries(), history.entries());
    assert_eq!(reloaded.finalized_state(), Some(&state));
    assert_eq!(reloaded.latest_snapshot().unwrap().description.as_deref(), Some("final"));
    assert_eq!(reloaded.add_entry(entry(9)), Err(HistoryError::Finalized));
    assert_eq!(reloaded.finalize(&state).unwrap_err(), HistoryError::AlreadyFinalized);
}

#[test]
fn test_import_applies_bounds() {
    let mut history = manager();
    for n in 0..6 {
        history.add_entry(entry(n)).unwrap();
    }
    let mut export = history.export();
    export.cursor = 99;

    let config = HistoryConfig {
        max_undo: 4,
        max_snapshots: 1,
        ..HistoryConfig::default()
    };
    let mut imported = HistoryManager::import(export, config);
    assert_eq!(imported.len(), 4);
    assert!(!imported.can_redo());
    assert_eq!(imported.undo().unwrap().previous_state, json!({ "n": 5 }));
}

proptest! {
    #[test]
    fn prop_bounded_growth(entries in 0usize..200, snapshots in 0usize..40) {
        let mut history = manager();
        for n in 0..entries {
            history.add_entry(entry(n)).unwrap();
        }
        let state = FichaState::base(&FichaId::new("h"));
        for _ in 0..snapshots {
            history.create_snapshot(&state, SnapshotTrigger::Auto).unwrap();
        }
        prop_assert_eq!(history.len(), entries.min(50));
        prop_assert_eq!(history.snapshot_count(), snapshots.min(10));

        let mut undone = 0;
        while history.undo().is_some() {
            undone += 1;
        }
        prop_assert_eq!(undone, entries.min(50));
    }
}
