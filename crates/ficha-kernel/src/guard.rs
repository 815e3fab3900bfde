//! Render and persistence guard
//!
//! An invalid state never leaves the guard. Invalid input goes through
//! recovery; recovered states are tagged with a [`StateStatusInfo`]. A panic
//! inside recovery is the single terminal failure and is reported as
//! [`RejectReason::Error`], for which [`FallbackScreen`] provides a
//! dependency-free rendering.

use crate::recovery::Recovery;
use ficha_model::{FichaId, FichaState, StateStatusInfo};
use ficha_validate::{validate_state_structure, FinalValidator};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Why a state was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// The state fails validation
    Invalid,
    /// Recovery itself failed
    Error,
}

impl RejectReason {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}

/// Guard verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum GuardOutcome {
    /// Safe to render or persist
    Valid {
        /// Validated or recovered state
        state: FichaState,
    },
    /// Must not be rendered
    Rejected {
        /// Failure category
        reason: RejectReason,
        /// Description
        message: String,
    },
}

impl GuardOutcome {
    /// Whether the outcome carries a usable state
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// The usable state, if any
    #[must_use]
    pub fn state(&self) -> Option<&FichaState> {
        match self {
            Self::Valid { state } => Some(state),
            Self::Rejected { .. } => None,
        }
    }

    /// Consume into the usable state, if any
    #[must_use]
    pub fn into_state(self) -> Option<FichaState> {
        match self {
            Self::Valid { state } => Some(state),
            Self::Rejected { .. } => None,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

/// Validation gate in front of rendering and persistence
pub struct StateGuard {
    recovery: Arc<dyn Recovery>,
    validator: Arc<FinalValidator>,
}

impl fmt::Debug for StateGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateGuard")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl StateGuard {
    /// Create new guard
    #[must_use]
    pub fn new(recovery: Arc<dyn Recovery>, validator: Arc<FinalValidator>) -> Self {
        Self { recovery, validator }
    }

    /// Validate `state`, recovering when it is invalid
    pub async fn guard_state(&self, ficha_id: &FichaId, state: FichaState) -> GuardOutcome {
        if self.validator.is_valid(&state) {
            return GuardOutcome::Valid { state };
        }

        let recovered = AssertUnwindSafe(self.recovery.recover(ficha_id))
            .catch_unwind()
            .await;
        let result = match recovered {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("recovery failed: {}", panic_message(payload.as_ref()));
                tracing::error!(%ficha_id, %message, "state guard gave up");
                return GuardOutcome::Rejected {
                    reason: RejectReason::Error,
                    message,
                };
            }
        };

        let state = result
            .state
            .with_status_info(StateStatusInfo::from_recovery(result.source, result.message));
        if !validate_state_structure(&state).valid {
            tracing::error!(%ficha_id, "recovered state is not renderable");
            return GuardOutcome::Rejected {
                reason: RejectReason::Invalid,
                message: "recovered state is not renderable".into(),
            };
        }
        tracing::info!(%ficha_id, source = result.source.as_str(), "state guarded through recovery");
        GuardOutcome::Valid { state }
    }

    /// Validate `state` without recovery or side effects
    #[must_use]
    pub fn guard_state_sync(&self, state: FichaState) -> GuardOutcome {
        let report = self.validator.validate(&state);
        if report.valid {
            GuardOutcome::Valid { state }
        } else {
            GuardOutcome::Rejected {
                reason: RejectReason::Invalid,
                message: format!("invalid state: {}", report.errors.join(", ")),
            }
        }
    }
}

/// Plain-text screen for states that cannot be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackScreen {
    /// Ficha concerned, when known
    pub ficha_id: Option<FichaId>,
    /// Failure category
    pub reason: RejectReason,
    /// Technical detail
    pub message: String,
}

impl Default for FallbackScreen {
    fn default() -> Self {
        Self {
            ficha_id: None,
            reason: RejectReason::Error,
            message: "the ficha could not be loaded".into(),
        }
    }
}

impl FallbackScreen {
    /// Screen for a rejected guard outcome; `None` for a valid one
    #[must_use]
    pub fn from_outcome(ficha_id: &FichaId, outcome: &GuardOutcome) -> Option<Self> {
        match outcome {
            GuardOutcome::Valid { .. } => None,
            GuardOutcome::Rejected { reason, message } => Some(Self {
                ficha_id: Some(ficha_id.clone()),
                reason: *reason,
                message: message.clone(),
            }),
        }
    }

    /// Heading line
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self.reason {
            RejectReason::Error => "Recovery error",
            RejectReason::Invalid => "Invalid state",
        }
    }

    /// Explanation line
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self.reason {
            RejectReason::Error => "An error occurred while trying to recover your ficha.",
            RejectReason::Invalid => "Your ficha is in a state that cannot be displayed.",
        }
    }
}

impl fmt::Display for FallbackScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title())?;
        writeln!(f, "{}", self.description())?;
        if let Some(id) = &self.ficha_id {
            writeln!(f, "ficha: {id}")?;
        }
        writeln!(f, "detail: {}", self.message)?;
        write!(f, "Retry, or reset the ficha to its base state.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_screen_text() {
        let id = FichaId::new("f1");
        let outcome = GuardOutcome::Rejected {
            reason: RejectReason::Error,
            message: "boom".into(),
        };
        let screen = FallbackScreen::from_outcome(&id, &outcome).unwrap();
        let text = screen.to_string();
        assert!(text.starts_with("Recovery error"));
        assert!(text.contains("ficha: f1"));
        assert!(text.contains("detail: boom"));
        assert!(FallbackScreen::default().to_string().contains("could not be loaded"));
    }
}
