//! Domain invariants
//!
//! Properties every ficha must satisfy at all times:
//! - ids present
//! - unique section ids
//! - section orders form a 0-based sequence matching list position
//! - positive version
//! - `lastModified` positive and not in the future
//! - finalized fichas have at least one section
//! - customizations internally consistent
//! - every error record belongs to the ficha

use ficha_model::{now_millis, FichaState, FichaStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of an invariant check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    /// `true` iff there are no violations
    pub valid: bool,
    /// Human-readable violations
    pub violations: Vec<String>,
}

/// Check every invariant
#[must_use]
pub fn check_all_invariants(state: &FichaState) -> InvariantReport {
    let checks: [(fn(&FichaState) -> bool, &str); 9] = [
        (id_exists, "ficha id must exist"),
        (pozo_id_exists, "pozo id must exist"),
        (unique_section_ids, "section ids must be unique"),
        (
            sequential_section_order,
            "section order must be sequential starting from 0",
        ),
        (positive_version, "version must be a positive number"),
        (valid_timestamp, "lastModified must be a valid timestamp"),
        (
            finalized_has_sections,
            "a finalized ficha must have at least one section",
        ),
        (valid_customizations, "customizations must have valid structure"),
        (errors_belong_to_ficha, "all errors must have the correct fichaId"),
    ];

    let violations: Vec<String> = checks
        .iter()
        .filter(|(check, _)| !check(state))
        .map(|(_, message)| format!("invariant violated: {message}"))
        .collect();

    InvariantReport {
        valid: violations.is_empty(),
        violations,
    }
}

/// Ficha id is non-empty
#[must_use]
pub fn id_exists(state: &FichaState) -> bool {
    !state.id.is_empty()
}

/// Pozo id is non-empty
#[must_use]
pub fn pozo_id_exists(state: &FichaState) -> bool {
    !state.pozo_id.is_empty()
}

/// No two sections share an id, and none is empty
#[must_use]
pub fn unique_section_ids(state: &FichaState) -> bool {
    let mut seen = HashSet::with_capacity(state.sections.len());
    state
        .sections
        .iter()
        .all(|s| !s.id.is_empty() && seen.insert(s.id.as_str()))
}

/// `sections[i].order == i`
#[must_use]
pub fn sequential_section_order(state: &FichaState) -> bool {
    state
        .sections
        .iter()
        .enumerate()
        .all(|(i, s)| usize::try_from(s.order).is_ok_and(|order| order == i))
}

/// Version is at least 1
#[must_use]
pub fn positive_version(state: &FichaState) -> bool {
    state.version > 0
}

/// Timestamp is positive and not in the future
#[must_use]
pub fn valid_timestamp(state: &FichaState) -> bool {
    state.last_modified > 0 && state.last_modified <= now_millis()
}

/// Finalized fichas are never empty
#[must_use]
pub fn finalized_has_sections(state: &FichaState) -> bool {
    state.status != FichaStatus::Finalized || !state.sections.is_empty()
}

/// Font sizes are positive and the template is named
#[must_use]
pub fn valid_customizations(state: &FichaState) -> bool {
    let fonts = &state.customizations.fonts;
    fonts.title_size > 0
        && fonts.label_size > 0
        && fonts.value_size > 0
        && !fonts.font_family.is_empty()
        && !state.customizations.template.is_empty()
}

/// Every error record names this ficha
#[must_use]
pub fn errors_belong_to_ficha(state: &FichaState) -> bool {
    state.errors.iter().all(|e| e.ficha_id == state.id)
}
