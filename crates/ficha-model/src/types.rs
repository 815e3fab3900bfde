//! Core ficha types
//!
//! Defines the building blocks of a ficha:
//! - Ficha identifiers
//! - Lifecycle status values
//! - Sections and traceable field values
//! - Presentation customizations

use crate::time::now_millis;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique ficha identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FichaId(String);

impl FichaId {
    /// Create ficha ID from an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random ficha ID
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check for the empty identifier
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FichaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FichaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FichaId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for FichaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a ficha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FichaStatus {
    /// Freshly created, not yet edited
    #[default]
    Draft,
    /// Being edited
    Editing,
    /// Marked complete, still revertible
    Complete,
    /// Terminal and immutable
    Finalized,
}

impl FichaStatus {
    /// All statuses in lifecycle order
    pub const ALL: [Self; 4] = [Self::Draft, Self::Editing, Self::Complete, Self::Finalized];

    /// Wire name of the status
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Editing => "editing",
            Self::Complete => "complete",
            Self::Finalized => "finalized",
        }
    }

    /// Parse a wire name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Check for the terminal status
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized)
    }
}

impl fmt::Display for FichaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    /// Imported from a spreadsheet
    Excel,
    /// Typed by the user
    Manual,
    /// System default
    #[default]
    Default,
}

impl FieldSource {
    /// Wire name of the source
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::Manual => "manual",
            Self::Default => "default",
        }
    }
}

/// A field value with traceability of where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    /// Current value, always a string
    pub value: String,
    /// Origin of the value
    pub source: FieldSource,
    /// Last modification time (ms)
    #[serde(default)]
    pub modified_at: i64,
    /// Value before the first manual edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
}

impl FieldValue {
    /// Create a field value with an explicit source
    #[must_use]
    pub fn new(value: impl Into<String>, source: FieldSource) -> Self {
        Self {
            value: value.into(),
            source,
            modified_at: now_millis(),
            original_value: None,
        }
    }

    /// Value typed by the user
    #[inline]
    #[must_use]
    pub fn manual(value: impl Into<String>) -> Self {
        Self::new(value, FieldSource::Manual)
    }

    /// Value imported from a spreadsheet
    #[inline]
    #[must_use]
    pub fn excel(value: impl Into<String>) -> Self {
        Self::new(value, FieldSource::Excel)
    }

    /// System default value
    #[inline]
    #[must_use]
    pub fn default_value(value: impl Into<String>) -> Self {
        Self::new(value, FieldSource::Default)
    }

    /// Check whether the value is blank
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Apply a manual edit, remembering the first pre-edit value
    pub fn edit(&mut self, value: impl Into<String>) {
        if self.original_value.is_none() && self.source != FieldSource::Manual {
            self.original_value = Some(self.value.clone());
        }
        self.value = value.into();
        self.source = FieldSource::Manual;
        self.modified_at = now_millis();
    }
}

/// Semantic category of a section
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionKind {
    /// Pozo identification data
    Identification,
    /// Street address and neighborhood
    Location,
    /// Physical components (cover, cylinder, ...)
    Components,
    /// Connected pipes
    Pipes,
    /// Photo attachments
    Photos,
    /// Structural data
    Structure,
    /// Connected sinks
    Sinks,
    /// Free-form observations
    Observations,
    /// Any other category
    Other(String),
}

impl SectionKind {
    /// Wire name of the kind
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Identification => "identification",
            Self::Location => "location",
            Self::Components => "components",
            Self::Pipes => "pipes",
            Self::Photos => "photos",
            Self::Structure => "structure",
            Self::Sinks => "sinks",
            Self::Observations => "observations",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for SectionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "identification" => Self::Identification,
            "location" => Self::Location,
            "components" => Self::Components,
            "pipes" => Self::Pipes,
            "photos" => Self::Photos,
            "structure" => Self::Structure,
            "sinks" => Self::Sinks,
            "observations" => Self::Observations,
            _ => Self::Other(s),
        }
    }
}

impl From<SectionKind> for String {
    fn from(kind: SectionKind) -> Self {
        match kind {
            SectionKind::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One section of a ficha
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FichaSection {
    /// Section identifier, unique within the ficha
    pub id: String,
    /// Semantic category
    #[serde(rename = "type")]
    pub kind: SectionKind,
    /// Position in the section list (0-based)
    pub order: u32,
    /// Whether the section is rendered
    pub visible: bool,
    /// Whether the section rejects edits
    pub locked: bool,
    /// Field name to value, in display order
    pub content: IndexMap<String, FieldValue>,
}

impl FichaSection {
    /// Create new empty visible section
    #[must_use]
    pub fn new(id: impl Into<String>, kind: SectionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            order: 0,
            visible: true,
            locked: false,
            content: IndexMap::new(),
        }
    }

    /// With a field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.content.insert(name.into(), value);
        self
    }

    /// With locked flag
    #[inline]
    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Look up a field
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.content.get(name)
    }

    /// Check whether a field exists and is non-blank
    #[inline]
    #[must_use]
    pub fn is_filled(&self, name: &str) -> bool {
        self.field(name).is_some_and(|v| !v.is_empty())
    }

    /// Number of non-blank fields
    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.content.values().filter(|v| !v.is_empty()).count()
    }
}

/// Colors used when rendering a ficha
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ColorScheme {
    pub header_bg: String,
    pub header_text: String,
    pub section_bg: String,
    pub section_text: String,
    pub label_text: String,
    pub value_text: String,
    pub border_color: String,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header_bg: "#1F4E79".into(),
            header_text: "#FFFFFF".into(),
            section_bg: "#F5F5F5".into(),
            section_text: "#333333".into(),
            label_text: "#666666".into(),
            value_text: "#000000".into(),
            border_color: "#CCCCCC".into(),
        }
    }
}

/// Font sizes and family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct FontScheme {
    pub title_size: u32,
    pub label_size: u32,
    pub value_size: u32,
    pub font_family: String,
}

impl Default for FontScheme {
    fn default() -> Self {
        Self {
            title_size: 16,
            label_size: 12,
            value_size: 14,
            font_family: "Inter".into(),
        }
    }
}

/// Layout spacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SpacingScheme {
    pub section_gap: u32,
    pub field_gap: u32,
    pub padding: u32,
    pub margin: u32,
}

impl Default for SpacingScheme {
    fn default() -> Self {
        Self {
            section_gap: 16,
            field_gap: 8,
            padding: 12,
            margin: 8,
        }
    }
}

/// Presentation customizations of a ficha
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customizations {
    /// Color scheme
    pub colors: ColorScheme,
    /// Font scheme
    pub fonts: FontScheme,
    /// Spacing scheme
    pub spacing: SpacingScheme,
    /// Template name
    pub template: String,
    /// Whether these customizations apply to every ficha
    pub is_global: bool,
}

impl Default for Customizations {
    fn default() -> Self {
        Self {
            colors: ColorScheme::default(),
            fonts: FontScheme::default(),
            spacing: SpacingScheme::default(),
            template: "default".into(),
            is_global: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_wire_names() {
        for status in FichaStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(FichaStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FichaStatus::parse("archived"), None);
    }

    #[test]
    fn test_section_kind_other_preserved() {
        let kind: SectionKind = serde_json::from_str("\"cameras\"").unwrap();
        assert_eq!(kind, SectionKind::Other("cameras".into()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"cameras\"");

        let known: SectionKind = serde_json::from_str("\"photos\"").unwrap();
        assert_eq!(known, SectionKind::Photos);
    }

    #[test]
    fn test_field_edit_keeps_original() {
        let mut field = FieldValue::excel("PZ-1");
        field.edit("PZ-2");
        field.edit("PZ-3");
        assert_eq!(field.value, "PZ-3");
        assert_eq!(field.source, FieldSource::Manual);
        assert_eq!(field.original_value.as_deref(), Some("PZ-1"));
    }

    #[test]
    fn test_blank_field_is_empty() {
        assert!(FieldValue::manual("   ").is_empty());
        assert!(!FieldValue::manual("x").is_empty());
    }

    #[test]
    fn test_section_wire_format() {
        let section = FichaSection::new("s1", SectionKind::Location)
            .with_field("address", FieldValue::manual("Calle 1"));
        let value = serde_json::to_value(&section).unwrap();
        assert_eq!(value["type"], "location");
        assert_eq!(value["content"]["address"]["source"], "manual");
        assert!(value["content"]["address"].get("originalValue").is_none());
    }

    #[test]
    fn test_customizations_camel_case() {
        let value = serde_json::to_value(Customizations::default()).unwrap();
        assert_eq!(value["isGlobal"], false);
        assert_eq!(value["colors"]["headerBg"], "#1F4E79");
        assert_eq!(value["fonts"]["fontFamily"], "Inter");
    }
}
