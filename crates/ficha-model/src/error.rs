//! Error types for the ficha model

/// Errors raised by model-level mutations
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// An error record belongs to a different ficha
    #[error("error {error_id} belongs to ficha {found}, not {expected}")]
    ForeignError {
        /// Owning ficha
        expected: String,
        /// Ficha named by the rejected record
        found: String,
        /// Id of the rejected record
        error_id: String,
    },

    /// Section id not present in the ficha
    #[error("section not found: {0}")]
    SectionNotFound(String),

    /// Field not present in a section
    #[error("field {field} not found in section {section}")]
    FieldNotFound {
        /// Section id
        section: String,
        /// Field name
        field: String,
    },

    /// Error record id not present in the ficha
    #[error("error record not found: {0}")]
    ErrorNotFound(String),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// Whether the error was caused by caller input rather than corrupt data
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Serialization(_))
    }
}
