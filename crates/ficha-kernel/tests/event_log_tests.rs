use ficha_kernel::logging::{EventKind, EventLog, EventSeverity};
use ficha_model::FichaId;
use proptest::prelude::*;

fn log() -> EventLog {
    EventLog::new(FichaId::new("e"), 1000)
}

#[test]
fn test_queries() {
    let log = log();
    log.log_edit("identification.surveyor", "", "A");
    log.log_transition("draft", "editing", "START_EDITING");
    log.log_error("disk full", None);
    log.log_validate(false, &["ficha has no sections".to_owned()]);

    assert_eq!(log.by_kind(EventKind::Edit).len(), 1);
    assert_eq!(log.by_severity(EventSeverity::Warning).len(), 1);
    assert_eq!(log.by_severity(EventSeverity::Error).len(), 1);

    let last = log.last(2);
    assert_eq!(last[0].kind, EventKind::Error);
    assert_eq!(last[1].kind, EventKind::Validate);

    let all = log.events();
    let (start, end) = (all[0].timestamp, all[3].timestamp);
    assert_eq!(log.in_range(start, end).len(), 4);
    assert!(log.in_range(end + 1, end + 10).is_empty());
}

#[test]
fn test_stats() {
    let log = log();
    log.log_undo("edit_field");
    log.log_undo("edit_field");
    log.log_redo("edit_field");
    log.log_finalize(7);

    let stats = log.stats();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.by_kind[&EventKind::Undo], 2);
    assert_eq!(stats.by_severity[&EventSeverity::Info], 4);
    assert!(stats.first_timestamp <= stats.last_timestamp);
}

#[test]
fn test_export_formats() {
    let log = log();
    log.log_snapshot("snap-1", "manual");
    log.log_restore("snapshot restored", EventSeverity::Info, None);

    let document: serde_json::Value = serde_json::from_str(&log.export_json().unwrap()).unwrap();
    assert_eq!(document["fichaId"], "e");
    assert_eq!(document["stats"]["total"], 2);
    assert_eq!(document["events"][0]["type"], "SNAPSHOT");
    assert!(document["exportedAt"].is_string());

    let ndjson = log.export_ndjson().unwrap();
    let lines: Vec<&str> = ndjson.lines().collect();
    assert_eq!(lines.len(), 2);
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["type"], "RESTORE");
    assert!(second.get("data").is_none());
}

#[test]
fn test_clear() {
    let log = log();
    log.log_undo("x");
    log.clear();
    assert!(log.is_empty());
    assert_eq!(log.stats().first_timestamp, None);
}

proptest! {
    #[test]
    fn prop_log_is_bounded_and_keeps_newest(capacity in 1usize..50, count in 0usize..200) {
        let log = EventLog::new(FichaId::new("e"), capacity);
        for n in 0..count {
            log.log_undo(&n.to_string());
        }
        prop_assert_eq!(log.len(), count.min(capacity));
        if count > 0 {
            let newest = log.last(1);
            prop_assert_eq!(newest[0].message.clone(), format!("undo {}", count - 1));
        }
    }
}
