//! Ficha status state machine
//!
//! `draft -> editing -> complete -> finalized`, driven by events. The
//! accepted event set is a pure function of the current state, and
//! `finalized` accepts nothing.

use crate::error::TransitionError;
use ficha_model::{now_millis, FichaId, FichaStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Events that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FichaEvent {
    /// draft -> editing
    StartEditing,
    /// editing -> complete
    Complete,
    /// draft | editing | complete -> finalized
    Finalize,
    /// editing -> draft
    Reset,
    /// complete -> editing
    Revert,
}

impl FichaEvent {
    /// All events
    pub const ALL: [Self; 5] = [
        Self::StartEditing,
        Self::Complete,
        Self::Finalize,
        Self::Reset,
        Self::Revert,
    ];

    /// Wire name of the event
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartEditing => "START_EDITING",
            Self::Complete => "COMPLETE",
            Self::Finalize => "FINALIZE",
            Self::Reset => "RESET",
            Self::Revert => "REVERT",
        }
    }

    /// Parse a wire name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == s)
    }
}

impl fmt::Display for FichaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events accepted in `from`
#[must_use]
pub fn valid_events(from: FichaStatus) -> Vec<FichaEvent> {
    use FichaEvent::{Complete, Finalize, Reset, Revert, StartEditing};
    match from {
        FichaStatus::Draft => vec![StartEditing, Finalize],
        FichaStatus::Editing => vec![Complete, Finalize, Reset],
        FichaStatus::Complete => vec![Finalize, Revert],
        FichaStatus::Finalized => vec![],
    }
}

/// Target state of `event` from `from`, if accepted
#[must_use]
pub fn target_state(from: FichaStatus, event: FichaEvent) -> Option<FichaStatus> {
    use FichaStatus::{Complete, Draft, Editing, Finalized};
    match (from, event) {
        (Draft, FichaEvent::StartEditing) | (Complete, FichaEvent::Revert) => Some(Editing),
        (Editing, FichaEvent::Complete) => Some(Complete),
        (Draft | Editing | Complete, FichaEvent::Finalize) => Some(Finalized),
        (Editing, FichaEvent::Reset) => Some(Draft),
        _ => None,
    }
}

/// Validates a transition and returns its target state
///
/// # Errors
///
/// Returns [`TransitionError::Invalid`] if `event` is not accepted in `from`.
pub fn validate_transition(
    from: FichaStatus,
    event: FichaEvent,
) -> Result<FichaStatus, TransitionError> {
    target_state(from, event).ok_or(TransitionError::Invalid { from, event })
}

/// Immutable record of one successful transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    /// Record identifier
    pub id: String,
    /// State before
    pub from_state: FichaStatus,
    /// State after
    pub to_state: FichaStatus,
    /// Triggering event
    pub event: FichaEvent,
    /// When it happened (ms)
    pub timestamp: i64,
    /// Caller-supplied context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Snapshot of a machine for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineInfo {
    /// Owning ficha
    pub ficha_id: FichaId,
    /// Current state
    pub current: FichaStatus,
    /// Events accepted now
    pub valid_events: Vec<FichaEvent>,
    /// Number of transitions so far
    pub transition_count: usize,
    /// Most recent transition
    pub last_transition: Option<StateTransition>,
}

/// Per-ficha state machine; the sole mutator of a ficha's status
#[derive(Debug, Clone)]
pub struct FichaStateMachine {
    ficha_id: FichaId,
    current: FichaStatus,
    transitions: Vec<StateTransition>,
}

impl FichaStateMachine {
    /// Create new machine in `draft`
    #[inline]
    #[must_use]
    pub fn new(ficha_id: FichaId) -> Self {
        Self::with_state(ficha_id, FichaStatus::Draft)
    }

    /// Create a machine resuming at `current`, e.g. for a loaded ficha
    #[inline]
    #[must_use]
    pub fn with_state(ficha_id: FichaId, current: FichaStatus) -> Self {
        Self {
            ficha_id,
            current,
            transitions: Vec::new(),
        }
    }

    /// Owning ficha
    #[inline]
    #[must_use]
    pub fn ficha_id(&self) -> &FichaId {
        &self.ficha_id
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn current(&self) -> FichaStatus {
        self.current
    }

    /// Whether `event` is accepted now
    #[inline]
    #[must_use]
    pub fn can_transition(&self, event: FichaEvent) -> bool {
        target_state(self.current, event).is_some()
    }

    /// Events accepted now
    #[inline]
    #[must_use]
    pub fn valid_events(&self) -> Vec<FichaEvent> {
        valid_events(self.current)
    }

    /// Apply `event`, appending a transition record
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Invalid`] if `event` is not accepted; the
    /// state and log are left untouched.
    pub fn transition(
        &mut self,
        event: FichaEvent,
        metadata: Option<serde_json::Value>,
    ) -> Result<StateTransition, TransitionError> {
        let to_state = match validate_transition(self.current, event) {
            Ok(to_state) => to_state,
            Err(err) => {
                tracing::warn!(
                    ficha_id = %self.ficha_id,
                    state = %self.current,
                    %event,
                    "rejected transition"
                );
                return Err(err);
            }
        };

        let record = StateTransition {
            id: uuid::Uuid::new_v4().to_string(),
            from_state: self.current,
            to_state,
            event,
            timestamp: now_millis(),
            metadata,
        };
        tracing::info!(
            ficha_id = %self.ficha_id,
            from = %record.from_state,
            to = %record.to_state,
            %event,
            "state transition"
        );
        self.current = to_state;
        self.transitions.push(record.clone());
        Ok(record)
    }

    /// Move to `status` and drop the transition log
    ///
    /// Used by an explicit user reset; every holder of this machine sees the
    /// new status.
    pub fn reset_to(&mut self, status: FichaStatus) {
        tracing::info!(
            ficha_id = %self.ficha_id,
            from = %self.current,
            to = %status,
            "state machine reset"
        );
        self.current = status;
        self.transitions.clear();
    }

    /// Transition log, oldest first
    #[inline]
    #[must_use]
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Most recent transition
    #[inline]
    #[must_use]
    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.transitions.last()
    }

    /// In `draft`
    #[inline]
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.current == FichaStatus::Draft
    }

    /// In `editing`
    #[inline]
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.current == FichaStatus::Editing
    }

    /// In `complete`
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current == FichaStatus::Complete
    }

    /// In `finalized`
    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.current == FichaStatus::Finalized
    }

    /// Diagnostic summary
    #[must_use]
    pub fn info(&self) -> MachineInfo {
        MachineInfo {
            ficha_id: self.ficha_id.clone(),
            current: self.current,
            valid_events: self.valid_events(),
            transition_count: self.transitions.len(),
            last_transition: self.transitions.last().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_valid_events() {
        for status in FichaStatus::ALL {
            for event in FichaEvent::ALL {
                assert_eq!(
                    target_state(status, event).is_some(),
                    valid_events(status).contains(&event),
                    "{status} / {event}"
                );
            }
        }
    }

    #[test]
    fn test_event_wire_names() {
        for event in FichaEvent::ALL {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
            assert_eq!(FichaEvent::parse(event.as_str()), Some(event));
        }
    }

    #[test]
    fn test_info() {
        let mut machine = FichaStateMachine::new(FichaId::new("f"));
        machine
            .transition(FichaEvent::StartEditing, Some(serde_json::json!({"by": "test"})))
            .unwrap();
        let info = machine.info();
        assert_eq!(info.current, FichaStatus::Editing);
        assert_eq!(info.transition_count, 1);
        assert_eq!(
            info.valid_events,
            vec![FichaEvent::Complete, FichaEvent::Finalize, FichaEvent::Reset]
        );
        assert!(info.last_transition.unwrap().metadata.is_some());
    }
}
