use ficha_model::{FichaId, FichaSection, FichaState, FichaStatus, FieldValue, SectionKind};
use ficha_test_utils::{complete_ficha, empty_fields_ficha, identification_section, valid_ficha};
use ficha_validate::{FinalValidator, ValidationConfig};
use pretty_assertions::assert_eq;

#[test]
fn test_zero_sections_blocks_finalize_and_pdf() {
    let validator = FinalValidator::default();
    let state = FichaState::base(&FichaId::new("empty"));

    let report = validator.validate(&state);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("no sections")));

    let finalize = validator.can_finalize(&state);
    assert!(!finalize.allowed);
    assert!(finalize.reasons.iter().any(|r| r.contains("no sections")));

    let pdf = validator.can_generate_pdf(&state);
    assert!(!pdf.allowed);
    assert!(pdf.reasons.iter().any(|r| r.contains("no sections")));
}

#[test]
fn test_default_config_is_permissive() {
    let validator = FinalValidator::default();
    let state = FichaState::base(&FichaId::new("f")).with_section(
        FichaSection::new("ident", SectionKind::Identification)
            .with_field("pozoId", FieldValue::manual("PZ-9")),
    );

    let report = validator.validate(&state);
    assert!(report.valid, "{:?}", report.errors);
    assert_eq!(report.warnings.len(), 3);
    assert_eq!(
        report.missing_fields,
        vec![
            "identification.inspectionDate",
            "identification.surveyor",
            "identification.condition",
        ]
    );
    assert!(validator.can_finalize(&state).allowed);
}

#[test]
fn test_require_all_fields_promotes_to_errors() {
    let validator = FinalValidator::new(ValidationConfig::new().with_require_all_fields(true));
    let state = empty_fields_ficha("f");

    let report = validator.validate(&state);
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 4);
    assert_eq!(report.invalid_fields.len(), 4);
    assert!(report.errors[0].starts_with("required field is empty"));
}

#[test]
fn test_all_fields_empty_cannot_finalize() {
    let validator = FinalValidator::default();
    let state = empty_fields_ficha("f");

    assert!(validator.is_valid(&state));
    let check = validator.can_finalize(&state);
    assert!(!check.allowed);
    assert_eq!(check.reasons, vec!["ficha must have at least some data"]);

    let pdf = validator.can_generate_pdf(&state);
    assert!(!pdf.allowed);
    assert!(pdf.reasons[0].ends_with("to generate PDF"));
}

#[test]
fn test_finalized_short_circuits_finalize_only() {
    let validator = FinalValidator::default();
    let mut state = valid_ficha("f");
    state.status = FichaStatus::Finalized;

    let check = validator.can_finalize(&state);
    assert!(!check.allowed);
    assert_eq!(check.reasons, vec!["ficha is already finalized"]);
    assert!(validator.can_generate_pdf(&state).allowed);
}

#[test]
fn test_strict_mode_checks() {
    let strict = FinalValidator::new(ValidationConfig::strict());

    let report = strict.validate(&valid_ficha("f"));
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("fewer than 5 sections")));
    assert!(report.errors.iter().any(|e| e.contains("photo")));
    assert!(report.errors.iter().any(|e| e.contains("coordinates")));

    let complete = complete_ficha("f");
    let report = strict.validate(&complete);
    assert!(report.valid, "{:?}", report.errors);
    assert!(strict.can_finalize(&complete).allowed);
}

#[test]
fn test_individual_strict_flags() {
    let photos_only = FinalValidator::new(ValidationConfig::new().with_require_photos(true));
    let report = photos_only.validate(&valid_ficha("f"));
    assert_eq!(report.errors, vec!["ficha requires at least one photo"]);

    let coords_only = FinalValidator::new(ValidationConfig::new().with_require_coordinates(true));
    let report = coords_only.validate(&valid_ficha("f"));
    assert_eq!(report.errors, vec!["ficha requires coordinates (X, Y)"]);
}

#[test]
fn test_summary_completeness() {
    let validator = FinalValidator::default();
    let state = FichaState::base(&FichaId::new("f"))
        .with_section(identification_section(true))
        .with_section(
            FichaSection::new("loc", SectionKind::Location)
                .with_field("address", FieldValue::manual(""))
                .with_field("neighborhood", FieldValue::manual("")),
        );

    let summary = validator.summary(&state);
    assert!(summary.is_valid);
    assert!(summary.can_finalize);
    assert!(summary.can_generate_pdf);
    assert_eq!(summary.error_count, 0);
    assert_eq!(summary.warning_count, 2);
    // 4 of 6 fields filled
    assert_eq!(summary.completeness, 67);
}

#[test]
fn test_hard_errors_for_identifiers_and_counters() {
    let validator = FinalValidator::default();
    let mut state = valid_ficha("f").with_pozo_id("");
    state.version = 0;
    state.last_modified = 0;

    let report = validator.validate(&state);
    assert_eq!(
        report.errors,
        vec![
            "pozo id is missing",
            "invalid lastModified timestamp",
            "invalid version number",
        ]
    );
}
