//! User-initiated reset
//!
//! Resets a ficha to its last valid state or to the base state. Either way
//! the undo/redo stack is dropped and the ficha's state machine is moved to
//! the status of the returned state. A finalized ficha cannot be reset.

use crate::error::HistoryError;
use crate::logging::EventSeverity;
use crate::persistence::{PersistenceLayer, SafePersist, SaveOutcome};
use crate::registry::FichaRegistry;
use ficha_model::{now_millis, FichaId, FichaState, RecoverySource, StateStatusInfo};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// What to reset to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResetTarget {
    /// Last state that passed validation, else base
    LastValid,
    /// Canonical base state
    Base,
}

/// Outcome of a reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResult {
    /// False when the base state could not be stored
    pub success: bool,
    /// State to continue from
    pub state: FichaState,
    /// Target actually used
    pub target: ResetTarget,
    /// Description
    pub message: String,
    /// When the reset ran (ms)
    pub timestamp: i64,
}

/// Explicit reset over the persistence layer
#[derive(Debug)]
pub struct SafeReset {
    persist: Arc<SafePersist>,
    registry: Arc<FichaRegistry>,
}

impl SafeReset {
    /// Create new reset helper
    #[must_use]
    pub fn new(persist: Arc<SafePersist>, registry: Arc<FichaRegistry>) -> Self {
        Self { persist, registry }
    }

    fn prepare(&self, ficha_id: &FichaId, state: &FichaState) -> Result<(), HistoryError> {
        let finalized = self
            .registry
            .get_machine(ficha_id)
            .is_some_and(|machine| machine.lock().is_finalized());
        if finalized {
            return Err(HistoryError::Finalized);
        }
        let history = self.registry.history(ficha_id);
        history.lock().clear_undo_redo()?;
        self.registry.reset_machine(ficha_id, state.status);
        Ok(())
    }

    /// Reset to the last valid state, falling back to the base state
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] for a finalized ficha.
    pub async fn reset_to_last_valid(&self, ficha_id: &FichaId) -> Result<ResetResult, HistoryError> {
        let Some(last_valid) = self.persist.last_valid(ficha_id) else {
            return self.reset_to_base(ficha_id).await;
        };

        let message = "ficha restored to last valid state";
        let state = last_valid.with_status_info(StateStatusInfo::from_recovery(
            RecoverySource::LastValid,
            message,
        ));
        self.prepare(ficha_id, &state)?;
        self.registry.event_log(ficha_id).log_restore(
            message,
            EventSeverity::Info,
            Some(serde_json::json!({ "target": ResetTarget::LastValid })),
        );
        tracing::info!(%ficha_id, "reset to last valid state");
        Ok(ResetResult {
            success: true,
            state,
            target: ResetTarget::LastValid,
            message: message.into(),
            timestamp: now_millis(),
        })
    }

    /// Reset to the base state and try to store it
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] for a finalized ficha.
    pub async fn reset_to_base(&self, ficha_id: &FichaId) -> Result<ResetResult, HistoryError> {
        let message = "ficha reset to base state";
        let state = FichaState::base(ficha_id)
            .with_status_info(StateStatusInfo::from_recovery(RecoverySource::Base, message));
        self.prepare(ficha_id, &state)?;
        let events = self.registry.event_log(ficha_id);

        let (success, message) = match self.persist.safe_save(ficha_id, &state).await {
            Ok(SaveOutcome::Saved) => (true, message.to_owned()),
            Ok(SaveOutcome::Rejected { reasons }) => {
                tracing::debug!(%ficha_id, ?reasons, "base state kept in memory only");
                (true, message.to_owned())
            }
            Err(err) => {
                events.log_error(
                    format!("reset to base failed: {err}"),
                    Some(serde_json::json!({ "target": ResetTarget::Base })),
                );
                (false, format!("reset failed: {err}; using in-memory base state"))
            }
        };

        events.log_restore(
            "ficha reset to base state",
            EventSeverity::Warning,
            Some(serde_json::json!({ "target": ResetTarget::Base })),
        );
        tracing::info!(%ficha_id, success, "reset to base state");
        Ok(ResetResult {
            success,
            state,
            target: ResetTarget::Base,
            message,
            timestamp: now_millis(),
        })
    }

    /// Reset after `confirm` approves; `None` when cancelled
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] for a finalized ficha.
    pub async fn reset_with_confirmation<F, Fut>(
        &self,
        ficha_id: &FichaId,
        target: ResetTarget,
        confirm: F,
    ) -> Result<Option<ResetResult>, HistoryError>
    where
        F: FnOnce(ResetTarget) -> Fut + Send,
        Fut: Future<Output = bool> + Send,
    {
        if !confirm(target).await {
            self.registry.event_log(ficha_id).log_restore(
                "reset cancelled by user",
                EventSeverity::Info,
                Some(serde_json::json!({ "target": target })),
            );
            return Ok(None);
        }
        let result = match target {
            ResetTarget::LastValid => self.reset_to_last_valid(ficha_id).await?,
            ResetTarget::Base => self.reset_to_base(ficha_id).await?,
        };
        Ok(Some(result))
    }
}
