//! The ficha aggregate

use crate::error::ModelError;
use crate::ficha_error::FichaError;
use crate::status::{StateStatus, StateStatusInfo};
use crate::time::now_millis;
use crate::types::{Customizations, FichaId, FichaSection, FichaStatus, SectionKind};
use serde::{Deserialize, Serialize};

/// Schema version written by this crate
pub const CURRENT_SCHEMA_VERSION: u32 = 4;

fn current_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

/// One undo/redo unit
///
/// `previous_state` and `new_state` are partial JSON patches of the ficha;
/// applying `previous_state` undoes the entry, applying `new_state` redoes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Entry identifier
    pub id: String,
    /// Creation time (ms)
    pub timestamp: i64,
    /// Short action label, e.g. `edit_field`
    pub action: String,
    /// Patch restoring the state before the action
    pub previous_state: serde_json::Value,
    /// Patch producing the state after the action
    pub new_state: serde_json::Value,
}

impl HistoryEntry {
    /// Create new history entry
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        previous_state: serde_json::Value,
        new_state: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            action: action.into(),
            previous_state,
            new_state,
        }
    }
}

/// Complete state of one ficha
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FichaState {
    /// Ficha identifier
    pub id: FichaId,
    /// Associated pozo identifier
    pub pozo_id: String,
    /// Lifecycle status, mirrors the ficha's state machine
    pub status: FichaStatus,
    /// Ordered sections
    pub sections: Vec<FichaSection>,
    /// Presentation customizations
    pub customizations: Customizations,
    /// Undo/redo entries
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Errors owned by this ficha
    #[serde(default)]
    pub errors: Vec<FichaError>,
    /// Last modification time (ms)
    pub last_modified: i64,
    /// Monotonic version counter
    pub version: u64,
    /// Schema version of the payload
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,
    /// Recovery status tag, absent for states that never went through recovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_info: Option<StateStatusInfo>,
}

impl FichaState {
    /// Canonical base state stamped with `id`
    ///
    /// Empty sections, default customizations, `draft`, version 1.
    #[must_use]
    pub fn base(id: &FichaId) -> Self {
        Self {
            id: id.clone(),
            pozo_id: id.as_str().to_owned(),
            status: FichaStatus::Draft,
            sections: Vec::new(),
            customizations: Customizations::default(),
            history: Vec::new(),
            errors: Vec::new(),
            last_modified: now_millis(),
            version: 1,
            schema_version: CURRENT_SCHEMA_VERSION,
            status_info: None,
        }
    }

    /// With pozo id
    #[inline]
    #[must_use]
    pub fn with_pozo_id(mut self, pozo_id: impl Into<String>) -> Self {
        self.pozo_id = pozo_id.into();
        self
    }

    /// Append a section, assigning its order from its position
    #[must_use]
    pub fn with_section(mut self, mut section: FichaSection) -> Self {
        section.order = u32::try_from(self.sections.len()).unwrap_or(u32::MAX);
        self.sections.push(section);
        self
    }

    /// Mark a modification: bump version and refresh the timestamp
    pub fn touch(&mut self) {
        self.version = self.version.saturating_add(1);
        self.last_modified = now_millis().max(self.last_modified);
    }

    /// Look up a section by id
    #[must_use]
    pub fn section(&self, section_id: &str) -> Option<&FichaSection> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    /// Look up a section by id, mutably
    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut FichaSection> {
        self.sections.iter_mut().find(|s| s.id == section_id)
    }

    /// First section of a kind
    #[must_use]
    pub fn section_of_kind(&self, kind: &SectionKind) -> Option<&FichaSection> {
        self.sections.iter().find(|s| &s.kind == kind)
    }

    /// Reassign section orders to match list positions
    pub fn renumber_sections(&mut self) {
        for (index, section) in self.sections.iter_mut().enumerate() {
            section.order = u32::try_from(index).unwrap_or(u32::MAX);
        }
    }

    /// Check whether any field in any section is non-blank
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.sections.iter().any(|s| s.filled_count() > 0)
    }

    /// Append an error record
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ForeignError`] if the record belongs to another ficha.
    pub fn push_error(&mut self, error: FichaError) -> Result<(), ModelError> {
        if error.ficha_id != self.id {
            return Err(ModelError::ForeignError {
                expected: self.id.to_string(),
                found: error.ficha_id.to_string(),
                error_id: error.id,
            });
        }
        self.errors.push(error);
        Ok(())
    }

    /// Mark an error record resolved
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ErrorNotFound`] if no record has `error_id`.
    pub fn resolve_error(&mut self, error_id: &str) -> Result<(), ModelError> {
        let error = self
            .errors
            .iter_mut()
            .find(|e| e.id == error_id)
            .ok_or_else(|| ModelError::ErrorNotFound(error_id.to_owned()))?;
        error.resolved = true;
        Ok(())
    }

    /// Remove every error record
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Errors that are not yet resolved
    pub fn unresolved_errors(&self) -> impl Iterator<Item = &FichaError> {
        self.errors.iter().filter(|e| !e.resolved)
    }

    /// Attach a status tag
    #[must_use]
    pub fn with_status_info(mut self, info: StateStatusInfo) -> Self {
        self.status_info = Some(info);
        self
    }

    /// Drop the status tag once the user has seen it
    pub fn clear_status_info(&mut self) {
        self.status_info = None;
    }

    /// Check whether the state was recovered or reset
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        self.status_info
            .as_ref()
            .is_some_and(|info| info.status != StateStatus::Ok)
    }

    /// Serialize to a JSON value
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Serialization`] if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, ModelError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a JSON value
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Serialization`] if the value is not a ficha.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(value)?)
    }
}
