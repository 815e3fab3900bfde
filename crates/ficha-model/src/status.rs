//! State status tags
//!
//! A state handed to the UI may carry a tag telling whether it is the state
//! the user left (`ok`), one recovered from a backup (`recovered`), or a fresh
//! base state (`reset`).

use crate::time::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStatus {
    /// Normal state
    Ok,
    /// Recovered from a previous valid state or snapshot
    Recovered,
    /// Reset to the base state
    Reset,
}

impl StateStatus {
    /// Default user-facing message
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Ok => "Your ficha is in good shape",
            Self::Recovered => "Your ficha was recovered from a previous state",
            Self::Reset => "Your ficha was reset.",
        }
    }
}

/// Where a recovered state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoverySource {
    /// Last state that passed validation
    LastValid,
    /// A stored snapshot
    Snapshot,
    /// The canonical base state
    Base,
}

impl RecoverySource {
    /// Wire name of the source
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastValid => "lastValid",
            Self::Snapshot => "snapshot",
            Self::Base => "base",
        }
    }

    /// Status tag a state recovered from this source carries
    #[inline]
    #[must_use]
    pub const fn status(self) -> StateStatus {
        match self {
            Self::LastValid | Self::Snapshot => StateStatus::Recovered,
            Self::Base => StateStatus::Reset,
        }
    }
}

impl fmt::Display for RecoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status information attached to a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateStatusInfo {
    /// Condition tag
    pub status: StateStatus,
    /// Technical message
    pub message: String,
    /// When the tag was attached (ms)
    pub timestamp: i64,
    /// Recovery source, for recovered or reset states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_from: Option<RecoverySource>,
    /// Message suitable for end users
    pub user_message: String,
}

impl StateStatusInfo {
    /// Create new status info with the default user message for `status`
    #[must_use]
    pub fn new(
        status: StateStatus,
        message: impl Into<String>,
        recovered_from: Option<RecoverySource>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: now_millis(),
            recovered_from,
            user_message: status.user_message().to_owned(),
        }
    }

    /// Status info for a state recovered from `source`
    #[inline]
    #[must_use]
    pub fn from_recovery(source: RecoverySource, message: impl Into<String>) -> Self {
        Self::new(source.status(), message, Some(source))
    }

    /// Message to show the user, `None` for `ok`
    #[must_use]
    pub fn display_message(&self) -> Option<String> {
        match self.status {
            StateStatus::Ok => None,
            StateStatus::Recovered => Some(format!(
                "{} (from {})",
                self.user_message,
                self.recovered_from.map_or("backup", RecoverySource::as_str)
            )),
            StateStatus::Reset => Some(format!(
                "{} Some changes may have been lost.",
                self.user_message
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_maps_to_status() {
        assert_eq!(RecoverySource::LastValid.status(), StateStatus::Recovered);
        assert_eq!(RecoverySource::Snapshot.status(), StateStatus::Recovered);
        assert_eq!(RecoverySource::Base.status(), StateStatus::Reset);
    }

    #[test]
    fn test_display_messages() {
        let ok = StateStatusInfo::new(StateStatus::Ok, "fine", None);
        assert!(ok.display_message().is_none());

        let recovered = StateStatusInfo::from_recovery(RecoverySource::Snapshot, "r");
        assert!(recovered.display_message().unwrap().ends_with("(from snapshot)"));

        let reset = StateStatusInfo::from_recovery(RecoverySource::Base, "b");
        assert!(reset
            .display_message()
            .unwrap()
            .contains("Some changes may have been lost"));
    }

    #[test]
    fn test_source_wire_name() {
        assert_eq!(
            serde_json::to_string(&RecoverySource::LastValid).unwrap(),
            "\"lastValid\""
        );
    }
}
