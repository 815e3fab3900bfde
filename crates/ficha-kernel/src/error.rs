//! Error types for the ficha kernel
//!
//! One enum per concern, aggregated into [`KernelError`]:
//! - Invalid state machine transitions
//! - Writes against a finalized history
//! - Storage failures
//! - Schema detection and migration failures
//! - Lifecycle phase violations
//! - Configuration loading failures

use crate::lifecycle::LifecyclePhase;
use crate::state_machine::FichaEvent;
use ficha_model::{FichaStatus, ModelError};

/// Main kernel error type
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Invalid state machine transition
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    /// History manager misuse
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Storage failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Schema failure
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Lifecycle phase violation
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Configuration failure
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model mutation failure
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Finalize refused by the business validator
    #[error("ficha cannot be finalized: {}", reasons.join("; "))]
    FinalizeDenied {
        /// Validator reasons
        reasons: Vec<String>,
    },

    /// Edit attempted on a locked section
    #[error("section {0} is locked")]
    SectionLocked(String),

    /// Save refused because the state failed validation
    #[error("state rejected by validation: {}", reasons.join("; "))]
    SaveRejected {
        /// Validator errors
        reasons: Vec<String>,
    },
}

impl KernelError {
    /// Check if the caller can retry after correcting input
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Config(_) | Self::Schema(_) => false,
            Self::History(HistoryError::Finalized | HistoryError::AlreadyFinalized) => false,
            _ => true,
        }
    }

    /// Check if the error stems from caller misuse rather than a system fault
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Transition(_)
                | Self::History(_)
                | Self::Lifecycle(_)
                | Self::FinalizeDenied { .. }
                | Self::SectionLocked(_)
                | Self::SaveRejected { .. }
        ) || matches!(self, Self::Model(e) if e.is_user_error())
    }
}

/// State machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Event not accepted in the current state
    #[error("invalid transition: {event} is not accepted in state {from}")]
    Invalid {
        /// Current state
        from: FichaStatus,
        /// Rejected event
        event: FichaEvent,
    },
}

/// History manager errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Write attempted after finalize
    #[error("ficha is finalized and immutable")]
    Finalized,

    /// Finalize called twice
    #[error("ficha is already finalized")]
    AlreadyFinalized,
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend unavailable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend I/O failure
    #[error("store I/O failed: {0}")]
    Io(String),

    /// Stored payload could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if the operation may succeed on retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Schema versioning errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Payload is not a JSON object
    #[error("payload is not an object")]
    NotAnObject,

    /// Payload declares a schema newer than this build understands
    #[error("unsupported schema version {found} (latest known is {latest})")]
    Unsupported {
        /// Declared version
        found: u32,
        /// Latest supported version
        latest: u32,
    },
}

/// Lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// Operation not allowed in the current phase
    #[error("cannot {operation} while {phase}")]
    InvalidPhase {
        /// Attempted operation
        operation: &'static str,
        /// Current phase
        phase: LifecyclePhase,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config value out of range
    #[error("invalid config value for {key}: {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// Why it is invalid
        reason: String,
    },
}
