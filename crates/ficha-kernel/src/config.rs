//! Kernel configuration
//!
//! Every section defaults independently, so a TOML file only needs the keys
//! it wants to override. Unknown keys are ignored.
//!
//! ```toml
//! [history]
//! max_undo = 100
//!
//! [validation]
//! strict_mode = true
//! ```

use crate::error::ConfigError;
use ficha_validate::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// History manager limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum undo/redo entries
    pub max_undo: usize,
    /// Maximum snapshots
    pub max_snapshots: usize,
    /// Minimum time between automatic snapshots, in milliseconds
    pub auto_snapshot_interval_ms: u64,
}

impl HistoryConfig {
    /// Auto snapshot interval as a duration
    #[inline]
    #[must_use]
    pub fn auto_snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.auto_snapshot_interval_ms)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo: 50,
            max_snapshots: 10,
            auto_snapshot_interval_ms: 30_000,
        }
    }
}

/// Event log limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Events kept per ficha
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Recovery manager limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Recovery attempts kept in the recovery log
    pub log_capacity: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self { log_capacity: 50 }
    }
}

/// Persistence limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Save/load records kept in the persistence log
    pub log_capacity: usize,
    /// Snapshots kept per ficha by the in-memory snapshot store
    pub snapshot_store_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            log_capacity: 100,
            snapshot_store_capacity: 10,
        }
    }
}

/// Kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// History limits
    pub history: HistoryConfig,
    /// Event log limits
    pub event_log: EventLogConfig,
    /// Recovery limits
    pub recovery: RecoveryConfig,
    /// Persistence limits
    pub persistence: PersistenceConfig,
    /// Business validation flags
    pub validation: ValidationConfig,
}

impl KernelConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With history limits
    #[inline]
    #[must_use]
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// With max undo entries
    #[inline]
    #[must_use]
    pub fn with_max_undo(mut self, max: usize) -> Self {
        self.history.max_undo = max;
        self
    }

    /// With max snapshots
    #[inline]
    #[must_use]
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.history.max_snapshots = max;
        self
    }

    /// With event log capacity
    #[inline]
    #[must_use]
    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log.capacity = capacity;
        self
    }

    /// With validation flags
    #[inline]
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Parse from a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for zero capacities.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first zero capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("history.max_undo", self.history.max_undo),
            ("history.max_snapshots", self.history.max_snapshots),
            ("event_log.capacity", self.event_log.capacity),
            ("recovery.log_capacity", self.recovery.log_capacity),
            ("persistence.log_capacity", self.persistence.log_capacity),
            (
                "persistence.snapshot_store_capacity",
                self.persistence.snapshot_store_capacity,
            ),
        ];
        match capacities.into_iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::Invalid {
                key,
                reason: "must be greater than zero".into(),
            }),
            None => Ok(()),
        }
    }
}
