use ficha_test_utils::{arb_status, valid_ficha, valid_ficha_json};
use ficha_validate::{
    validate_field_value_structure, validate_structure, StructuralSeverity,
};
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn test_valid_payload_has_no_issues() {
    let report = validate_structure(&valid_ficha_json("f"));
    assert!(report.valid);
    assert!(report.errors.is_empty());
}

#[test]
fn test_critical_fields() {
    let report = validate_structure(&json!({
        "id": "",
        "status": "archived",
        "sections": {},
        "customizations": null,
        "history": [],
        "errors": [],
        "lastModified": 1,
        "version": 1,
    }));
    assert!(!report.valid);
    let fields: Vec<&str> = report.critical().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["id", "status", "sections", "customizations"]);
}

#[test]
fn test_section_issues_are_indexed() {
    let mut payload = valid_ficha_json("f");
    payload["sections"] = json!([
        "not-a-section",
        { "id": "s", "type": "photos", "order": "0", "visible": 1, "locked": false, "content": [] },
    ]);

    let report = validate_structure(&payload);
    assert!(!report.valid);

    let find = |field: &str| report.errors.iter().find(|e| e.field == field).map(|e| e.severity);
    assert_eq!(find("sections[0]"), Some(StructuralSeverity::Critical));
    assert_eq!(find("sections[1].order"), Some(StructuralSeverity::Warning));
    assert_eq!(find("sections[1].visible"), Some(StructuralSeverity::Warning));
    assert_eq!(find("sections[1].content"), Some(StructuralSeverity::Critical));
    assert_eq!(find("sections[1].locked"), None);
}

#[test]
fn test_numeric_fields_are_warnings() {
    let mut payload = valid_ficha_json("f");
    payload["lastModified"] = json!("yesterday");
    payload["version"] = Value::Null;

    let report = validate_structure(&payload);
    assert!(report.valid);
    assert_eq!(report.warnings().count(), 2);
}

#[test]
fn test_field_value_structure() {
    assert!(validate_field_value_structure(&json!({"value": "x", "source": "excel"})).is_empty());

    let issues = validate_field_value_structure(&json!({"value": null, "source": "guess"}));
    assert_eq!(issues.len(), 2);

    let issues = validate_field_value_structure(&json!("x"));
    assert_eq!(issues[0].field, "fieldValue");
}

#[test]
fn test_typed_state_renderable() {
    assert!(ficha_validate::is_renderable(&valid_ficha("f")));
}

proptest! {
    #[test]
    fn prop_never_panics_on_arbitrary_json(
        key in "[a-zA-Z]{0,12}",
        number in any::<i64>(),
        flag in any::<bool>(),
        text in ".{0,16}",
    ) {
        let candidates = vec![
            json!({ key.clone(): number }),
            json!([text.clone(), flag]),
            json!({ "id": text.clone(), "sections": [ { key.clone(): flag } ] }),
            json!({ "status": text, "sections": number, "customizations": flag }),
        ];
        for candidate in candidates {
            let report = validate_structure(&candidate);
            let has_critical = report
                .errors
                .iter()
                .any(|e| e.severity == StructuralSeverity::Critical);
            prop_assert_eq!(report.valid, !has_critical);
        }
    }

    #[test]
    fn prop_status_set_accepted(status in arb_status()) {
        let mut payload = valid_ficha_json("f");
        payload["status"] = json!(status.as_str());
        prop_assert!(validate_structure(&payload).valid);
    }
}
