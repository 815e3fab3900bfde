//! Point-in-time copies of a ficha

use crate::state::FichaState;
use crate::time::now_millis;
use crate::types::FichaId;
use serde::{Deserialize, Serialize};

/// What caused a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotTrigger {
    /// Periodic snapshot
    Auto,
    /// Explicit user request or finalize
    Manual,
    /// Taken before a risky action
    PreAction,
}

/// A full deep copy of a ficha at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot identifier
    pub id: String,
    /// Owning ficha
    pub ficha_id: FichaId,
    /// Copied state
    pub state: FichaState,
    /// Creation time (ms)
    pub timestamp: i64,
    /// Cause
    pub trigger: SnapshotTrigger,
    /// Optional label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Snapshot {
    /// Capture a copy of `state`
    #[must_use]
    pub fn capture(state: &FichaState, trigger: SnapshotTrigger) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ficha_id: state.id.clone(),
            state: state.clone(),
            timestamp: now_millis(),
            trigger,
            description: None,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
