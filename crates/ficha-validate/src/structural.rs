//! Structural validation
//!
//! Answers one question: is this value shaped like a ficha well enough to be
//! rendered and stored? Business rules are out of scope here.
//!
//! Operates on raw JSON so that payloads of unknown provenance can be checked
//! before any deserialization is attempted.

use ficha_model::{FichaState, FichaStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const VALID_SOURCES: [&str; 3] = ["excel", "manual", "default"];

/// Severity of a structural issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuralSeverity {
    /// Makes the value unusable
    Critical,
    /// Tolerated
    Warning,
}

/// One structural problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralIssue {
    /// Path of the offending field, e.g. `sections[2].content`
    pub field: String,
    /// Description
    pub message: String,
    /// Severity
    pub severity: StructuralSeverity,
}

impl StructuralIssue {
    fn critical(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: StructuralSeverity::Critical,
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: StructuralSeverity::Warning,
        }
    }
}

/// Result of a structural check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralReport {
    /// `false` iff any critical issue is present
    pub valid: bool,
    /// Every issue found
    pub errors: Vec<StructuralIssue>,
}

impl StructuralReport {
    fn from_issues(errors: Vec<StructuralIssue>) -> Self {
        let valid = !errors
            .iter()
            .any(|e| e.severity == StructuralSeverity::Critical);
        Self { valid, errors }
    }

    /// Critical issues only
    pub fn critical(&self) -> impl Iterator<Item = &StructuralIssue> {
        self.errors
            .iter()
            .filter(|e| e.severity == StructuralSeverity::Critical)
    }

    /// Warnings only
    pub fn warnings(&self) -> impl Iterator<Item = &StructuralIssue> {
        self.errors
            .iter()
            .filter(|e| e.severity == StructuralSeverity::Warning)
    }
}

fn is_non_empty_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// Validate the minimal shape of a ficha payload
#[must_use]
pub fn validate_structure(candidate: &Value) -> StructuralReport {
    let Some(obj) = candidate.as_object() else {
        return StructuralReport::from_issues(vec![StructuralIssue::critical(
            "root",
            "state is not an object",
        )]);
    };

    let mut errors = Vec::new();

    if !is_non_empty_str(obj.get("id")) {
        errors.push(StructuralIssue::critical("id", "id must be a non-empty string"));
    }

    let status_ok = obj
        .get("status")
        .and_then(Value::as_str)
        .and_then(FichaStatus::parse)
        .is_some();
    if !status_ok {
        errors.push(StructuralIssue::critical(
            "status",
            "status must be one of: draft, editing, complete, finalized",
        ));
    }

    match obj.get("sections").and_then(Value::as_array) {
        Some(sections) => {
            for (index, section) in sections.iter().enumerate() {
                validate_section_structure(section, index, &mut errors);
            }
        }
        None => errors.push(StructuralIssue::critical("sections", "sections must be a list")),
    }

    if !obj.get("customizations").is_some_and(Value::is_object) {
        errors.push(StructuralIssue::critical(
            "customizations",
            "customizations must be an object",
        ));
    }

    if !obj.get("history").is_some_and(Value::is_array) {
        errors.push(StructuralIssue::warning("history", "history must be a list"));
    }
    if !obj.get("errors").is_some_and(Value::is_array) {
        errors.push(StructuralIssue::warning("errors", "errors must be a list"));
    }
    if !obj.get("lastModified").is_some_and(Value::is_number) {
        errors.push(StructuralIssue::warning(
            "lastModified",
            "lastModified must be a numeric timestamp",
        ));
    }
    if !obj.get("version").is_some_and(Value::is_number) {
        errors.push(StructuralIssue::warning("version", "version must be a number"));
    }

    StructuralReport::from_issues(errors)
}

fn validate_section_structure(section: &Value, index: usize, errors: &mut Vec<StructuralIssue>) {
    let path = |field: &str| format!("sections[{index}].{field}");

    let Some(obj) = section.as_object() else {
        errors.push(StructuralIssue::critical(
            format!("sections[{index}]"),
            "section is not an object",
        ));
        return;
    };

    if !is_non_empty_str(obj.get("id")) {
        errors.push(StructuralIssue::critical(path("id"), "section id must be a string"));
    }
    if !is_non_empty_str(obj.get("type")) {
        errors.push(StructuralIssue::critical(path("type"), "section type must be a string"));
    }
    if !obj.get("order").is_some_and(Value::is_number) {
        errors.push(StructuralIssue::warning(path("order"), "order must be a number"));
    }
    if !obj.get("visible").is_some_and(Value::is_boolean) {
        errors.push(StructuralIssue::warning(path("visible"), "visible must be a boolean"));
    }
    if !obj.get("locked").is_some_and(Value::is_boolean) {
        errors.push(StructuralIssue::warning(path("locked"), "locked must be a boolean"));
    }
    if !obj.get("content").is_some_and(Value::is_object) {
        errors.push(StructuralIssue::critical(path("content"), "content must be an object"));
    }
}

/// Validate the shape of a single field value
#[must_use]
pub fn validate_field_value_structure(field: &Value) -> Vec<StructuralIssue> {
    let Some(obj) = field.as_object() else {
        return vec![StructuralIssue::critical(
            "fieldValue",
            "field value is not an object",
        )];
    };

    let mut errors = Vec::new();
    if !obj.get("value").is_some_and(Value::is_string) {
        errors.push(StructuralIssue::critical("value", "value must be a string"));
    }
    let source_ok = obj
        .get("source")
        .and_then(Value::as_str)
        .is_some_and(|s| VALID_SOURCES.contains(&s));
    if !source_ok {
        errors.push(StructuralIssue::critical(
            "source",
            "source must be one of: excel, manual, default",
        ));
    }
    errors
}

/// Structural check of a typed state
#[must_use]
pub fn validate_state_structure(state: &FichaState) -> StructuralReport {
    match serde_json::to_value(state) {
        Ok(value) => validate_structure(&value),
        Err(err) => StructuralReport::from_issues(vec![StructuralIssue::critical(
            "root",
            format!("state cannot be serialized: {err}"),
        )]),
    }
}

/// Whether a state can be rendered
#[inline]
#[must_use]
pub fn is_renderable(state: &FichaState) -> bool {
    validate_state_structure(state).valid
}

/// Whether a state can be persisted; same predicate as [`is_renderable`]
#[inline]
#[must_use]
pub fn is_persistible(state: &FichaState) -> bool {
    is_renderable(state)
}
