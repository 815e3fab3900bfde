//! Error records carried inside a ficha
//!
//! These are data, not Rust errors: they are appended to the owning ficha's
//! `errors` list and shown to the user. A record never leaves its ficha.

use crate::time::now_millis;
use crate::types::FichaId;
use serde::{Deserialize, Serialize};

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Malformed or missing input data
    Data,
    /// Invalid user-initiated action
    User,
    /// Internal fault
    System,
}

/// Error severity; there is no fatal level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational, non-blocking
    Warning,
    /// Blocks the specific operation
    Error,
}

/// An error recorded against one ficha
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FichaError {
    /// Record identifier
    pub id: String,
    /// Owning ficha
    pub ficha_id: FichaId,
    /// Taxonomy
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Severity
    pub severity: ErrorSeverity,
    /// Technical message
    pub message: String,
    /// Message suitable for end users
    pub user_message: String,
    /// Field the error refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Creation time (ms)
    pub timestamp: i64,
    /// Whether the user dismissed or fixed it
    #[serde(default)]
    pub resolved: bool,
}

impl FichaError {
    fn build(
        ficha_id: &FichaId,
        kind: ErrorKind,
        severity: ErrorSeverity,
        message: impl Into<String>,
        user_message: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ficha_id: ficha_id.clone(),
            kind,
            severity,
            message: message.into(),
            user_message: user_message.to_owned(),
            field: None,
            timestamp: now_millis(),
            resolved: false,
        }
    }

    /// Data error (warning)
    #[must_use]
    pub fn data(ficha_id: &FichaId, message: impl Into<String>) -> Self {
        Self::build(
            ficha_id,
            ErrorKind::Data,
            ErrorSeverity::Warning,
            message,
            "Some data could not be read correctly. Please review it.",
        )
    }

    /// User error (warning)
    #[must_use]
    pub fn user(ficha_id: &FichaId, message: impl Into<String>) -> Self {
        Self::build(
            ficha_id,
            ErrorKind::User,
            ErrorSeverity::Warning,
            message,
            "That action is not available right now.",
        )
    }

    /// System error (error)
    #[must_use]
    pub fn system(ficha_id: &FichaId, message: impl Into<String>) -> Self {
        Self::build(
            ficha_id,
            ErrorKind::System,
            ErrorSeverity::Error,
            message,
            "Something went wrong. Your data is safe.",
        )
    }

    /// With the field the error refers to
    #[inline]
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// With a custom user-facing message
    #[inline]
    #[must_use]
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = message.into();
        self
    }

    /// Check whether the error blocks its operation
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == ErrorSeverity::Error && !self.resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_severities() {
        let id = FichaId::new("f1");
        assert_eq!(FichaError::data(&id, "x").severity, ErrorSeverity::Warning);
        assert_eq!(FichaError::user(&id, "x").severity, ErrorSeverity::Warning);
        assert_eq!(FichaError::system(&id, "x").severity, ErrorSeverity::Error);
    }

    #[test]
    fn test_wire_format() {
        let err = FichaError::data(&FichaId::new("f1"), "bad date").with_field("inspectionDate");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["fichaId"], "f1");
        assert_eq!(value["type"], "data");
        assert_eq!(value["field"], "inspectionDate");
        assert_eq!(value["resolved"], false);
    }

    #[test]
    fn test_blocking() {
        let mut err = FichaError::system(&FichaId::new("f1"), "store down");
        assert!(err.is_blocking());
        err.resolved = true;
        assert!(!err.is_blocking());
    }
}
