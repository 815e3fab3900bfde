//! Business (final) validation
//!
//! Decides whether a ficha may be finalized or exported. Permissive by
//! default: missing business data is reported as warnings, and only
//! structural corruption blocks. `strict_mode` and the `require_*` flags
//! promote checks to hard errors.

use ficha_model::{FichaSection, FichaState, SectionKind};
use serde::{Deserialize, Serialize};

/// Minimum section count under strict validation
const MIN_SECTIONS: usize = 5;

/// Minimum fields expected per known section kind
fn required_fields(kind: &SectionKind) -> &'static [&'static str] {
    match kind {
        SectionKind::Identification => &["pozoId", "inspectionDate", "surveyor", "condition"],
        SectionKind::Location => &["address", "neighborhood"],
        SectionKind::Components => &["hasCover", "hasCylinder"],
        _ => &[],
    }
}

/// Validation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Require at least five sections
    pub require_all_sections: bool,
    /// Missing required fields are errors
    pub require_all_fields: bool,
    /// Require at least one photo
    pub require_photos: bool,
    /// Require identification coordinates
    pub require_coordinates: bool,
    /// Enable every check above
    pub strict_mode: bool,
}

impl ValidationConfig {
    /// Create default (permissive) configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict configuration
    #[inline]
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            ..Self::default()
        }
    }

    /// With strict mode
    #[inline]
    #[must_use]
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// With required fields as errors
    #[inline]
    #[must_use]
    pub fn with_require_all_fields(mut self, require: bool) -> Self {
        self.require_all_fields = require;
        self
    }

    /// With required photos
    #[inline]
    #[must_use]
    pub fn with_require_photos(mut self, require: bool) -> Self {
        self.require_photos = require;
        self
    }

    /// With required coordinates
    #[inline]
    #[must_use]
    pub fn with_require_coordinates(mut self, require: bool) -> Self {
        self.require_coordinates = require;
        self
    }

    /// With required section count
    #[inline]
    #[must_use]
    pub fn with_require_all_sections(mut self, require: bool) -> Self {
        self.require_all_sections = require;
        self
    }

    fn fields_required(self) -> bool {
        self.strict_mode || self.require_all_fields
    }

    fn sections_required(self) -> bool {
        self.strict_mode || self.require_all_sections
    }

    fn photos_required(self) -> bool {
        self.strict_mode || self.require_photos
    }

    fn coordinates_required(self) -> bool {
        self.strict_mode || self.require_coordinates
    }
}

/// Result of business validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// `true` iff `errors` is empty
    pub valid: bool,
    /// Blocking problems
    pub errors: Vec<String>,
    /// Non-blocking problems
    pub warnings: Vec<String>,
    /// `kind.field` paths of absent required fields
    pub missing_fields: Vec<String>,
    /// `kind.field` paths of present but blank required fields
    pub invalid_fields: Vec<String>,
}

/// Outcome of a finalize or export check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeCheck {
    /// Whether the action is allowed
    pub allowed: bool,
    /// Why not, when not allowed
    pub reasons: Vec<String>,
}

impl FinalizeCheck {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reasons: Vec::new(),
        }
    }

    fn denied(reasons: Vec<String>) -> Self {
        Self {
            allowed: false,
            reasons,
        }
    }
}

/// Aggregate validation summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Business validation passed
    pub is_valid: bool,
    /// Finalize allowed
    pub can_finalize: bool,
    /// Export allowed
    pub can_generate_pdf: bool,
    /// Number of errors
    pub error_count: usize,
    /// Number of warnings
    pub warning_count: usize,
    /// Filled fields over all fields, 0 to 100
    pub completeness: u8,
}

/// Business validator
#[derive(Debug, Clone, Default)]
pub struct FinalValidator {
    config: ValidationConfig,
}

impl FinalValidator {
    /// Create new validator
    #[inline]
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> ValidationConfig {
        self.config
    }

    /// Replace the configuration
    pub fn set_config(&mut self, config: ValidationConfig) {
        self.config = config;
    }

    /// Validate a ficha
    #[must_use]
    pub fn validate(&self, ficha: &FichaState) -> ValidationReport {
        let mut report = ValidationReport::default();

        if ficha.id.is_empty() {
            report.errors.push("ficha id is missing".into());
        }
        if ficha.pozo_id.is_empty() {
            report.errors.push("pozo id is missing".into());
        }
        if ficha.sections.is_empty() {
            report.errors.push("ficha has no sections".into());
        }
        if ficha.last_modified <= 0 {
            report.errors.push("invalid lastModified timestamp".into());
        }
        if ficha.version == 0 {
            report.errors.push("invalid version number".into());
        }

        for section in &ficha.sections {
            self.validate_section(section, &mut report);
        }

        if self.config.sections_required() && ficha.sections.len() < MIN_SECTIONS {
            report.errors.push(format!(
                "ficha has fewer than {MIN_SECTIONS} sections (expected identification, location, components, pipes, photos)"
            ));
        }

        if self.config.photos_required() {
            let has_photo = ficha
                .section_of_kind(&SectionKind::Photos)
                .is_some_and(|s| s.is_filled("images"));
            if !has_photo {
                report.errors.push("ficha requires at least one photo".into());
            }
        }

        if self.config.coordinates_required() {
            let has_coordinates = ficha
                .section_of_kind(&SectionKind::Identification)
                .is_some_and(|s| s.is_filled("coordinateX") && s.is_filled("coordinateY"));
            if !has_coordinates {
                report.errors.push("ficha requires coordinates (X, Y)".into());
            }
        }

        report.valid = report.errors.is_empty();
        tracing::trace!(
            ficha_id = %ficha.id,
            valid = report.valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "business validation"
        );
        report
    }

    fn validate_section(&self, section: &FichaSection, report: &mut ValidationReport) {
        if section.id.is_empty() {
            report.errors.push("section has no id".into());
        }
        if section.kind.as_str().is_empty() {
            report.errors.push("section has no type".into());
        }

        let strict = self.config.fields_required();
        for field in required_fields(&section.kind) {
            let path = format!("{}.{field}", section.kind);
            match section.field(field) {
                None => {
                    let message = if strict {
                        format!("required field missing: {path}")
                    } else {
                        format!("recommended field missing: {path}")
                    };
                    push_by_strictness(report, strict, message);
                    report.missing_fields.push(path);
                }
                Some(value) if value.is_empty() => {
                    let message = if strict {
                        format!("required field is empty: {path}")
                    } else {
                        format!("recommended field is empty: {path}")
                    };
                    push_by_strictness(report, strict, message);
                    report.invalid_fields.push(path);
                }
                Some(_) => {}
            }
        }
    }

    /// Boolean shortcut for [`Self::validate`]
    #[inline]
    #[must_use]
    pub fn is_valid(&self, ficha: &FichaState) -> bool {
        self.validate(ficha).valid
    }

    /// Whether a ficha can be finalized
    #[must_use]
    pub fn can_finalize(&self, ficha: &FichaState) -> FinalizeCheck {
        if ficha.status.is_terminal() {
            return FinalizeCheck::denied(vec!["ficha is already finalized".into()]);
        }
        self.check_exportable(ficha, "")
    }

    /// Whether a ficha can be exported to PDF
    #[must_use]
    pub fn can_generate_pdf(&self, ficha: &FichaState) -> FinalizeCheck {
        self.check_exportable(ficha, " to generate PDF")
    }

    fn check_exportable(&self, ficha: &FichaState, purpose: &str) -> FinalizeCheck {
        let report = self.validate(ficha);
        if !report.valid {
            return FinalizeCheck::denied(report.errors);
        }
        if ficha.sections.is_empty() {
            return FinalizeCheck::denied(vec![format!(
                "ficha must have at least one section{purpose}"
            )]);
        }
        if !ficha.has_data() {
            return FinalizeCheck::denied(vec![format!(
                "ficha must have at least some data{purpose}"
            )]);
        }
        FinalizeCheck::allowed()
    }

    /// Aggregate summary with a completeness score
    #[must_use]
    pub fn summary(&self, ficha: &FichaState) -> ValidationSummary {
        let report = self.validate(ficha);
        ValidationSummary {
            is_valid: report.valid,
            can_finalize: self.can_finalize(ficha).allowed,
            can_generate_pdf: self.can_generate_pdf(ficha).allowed,
            error_count: report.errors.len(),
            warning_count: report.warnings.len(),
            completeness: completeness(ficha),
        }
    }
}

fn push_by_strictness(report: &mut ValidationReport, strict: bool, message: String) {
    if strict {
        report.errors.push(message);
    } else {
        report.warnings.push(message);
    }
}

/// Filled fields over total fields across all sections, rounded, 0 to 100
#[must_use]
pub fn completeness(ficha: &FichaState) -> u8 {
    let (filled, total) = ficha.sections.iter().fold((0usize, 0usize), |(f, t), s| {
        (f + s.filled_count(), t + s.content.len())
    });
    if total == 0 {
        return 0;
    }
    // filled <= total, so the rounded ratio always fits in 0..=100
    u8::try_from((filled * 200 + total) / (total * 2)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ficha_model::{FichaId, FieldValue};

    #[test]
    fn test_completeness_rounding() {
        let state = FichaState::base(&FichaId::new("c")).with_section(
            FichaSection::new("s", SectionKind::Observations)
                .with_field("a", FieldValue::manual("x"))
                .with_field("b", FieldValue::manual(""))
                .with_field("c", FieldValue::manual("")),
        );
        // 1 / 3 = 33.3
        assert_eq!(completeness(&state), 33);

        let two_thirds = FichaState::base(&FichaId::new("c")).with_section(
            FichaSection::new("s", SectionKind::Observations)
                .with_field("a", FieldValue::manual("x"))
                .with_field("b", FieldValue::manual("y"))
                .with_field("c", FieldValue::manual("")),
        );
        // 2 / 3 = 66.7
        assert_eq!(completeness(&two_thirds), 67);
    }

    #[test]
    fn test_completeness_empty() {
        assert_eq!(completeness(&FichaState::base(&FichaId::new("e"))), 0);
    }

    #[test]
    fn test_required_fields_lookup() {
        assert_eq!(required_fields(&SectionKind::Location).len(), 2);
        assert!(required_fields(&SectionKind::Pipes).is_empty());
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: ValidationConfig = serde_json::from_str(r#"{"strict_mode": true}"#).unwrap();
        assert!(config.strict_mode);
        assert!(!config.require_photos);
    }
}
