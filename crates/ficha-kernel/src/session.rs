//! Editing session for one ficha
//!
//! Binds a ficha state to its registry entries. Every mutation goes through
//! the session so that:
//! - field edits become undo/redo entries carrying JSON patches
//! - `status` always equals the state machine's state
//! - every action lands in the ficha's event log
//!
//! Registry locks are never held across an `.await`.

use crate::context::FichaContext;
use crate::error::{HistoryError, KernelError};
use crate::lifecycle::LifecycleManager;
use crate::logging::{EventKind, EventLog, EventSeverity};
use crate::persistence::{PersistenceLayer, SaveOutcome};
use crate::registry::{HistoryHandle, MachineHandle};
use crate::reset::{ResetResult, ResetTarget};
use crate::state_machine::{FichaEvent, StateTransition};
use ficha_model::{
    ErrorSeverity, FichaError, FichaId, FichaState, FichaStatus, FieldValue, HistoryEntry,
    ModelError, Snapshot, SnapshotTrigger,
};
use ficha_validate::{FinalizeCheck, ValidationSummary};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

const EDIT_FIELD: &str = "edit_field";

/// Patch recorded by a field edit; `value: None` means the field was absent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldPatch {
    section_id: String,
    field: String,
    value: Option<FieldValue>,
}

/// Mutation facade over one ficha
#[derive(Debug)]
pub struct FichaSession {
    context: FichaContext,
    state: FichaState,
    machine: MachineHandle,
    history: HistoryHandle,
    events: Arc<EventLog>,
}

impl FichaSession {
    /// Open a session on `state`
    ///
    /// A ficha seen for the first time gets a state machine at the state's
    /// status. For a known ficha the machine wins and `status` is synced.
    /// A finalized ficha gets its history locked on the loaded content.
    #[must_use]
    pub fn open(context: &FichaContext, state: FichaState) -> Self {
        let registry = context.registry();
        let machine = registry.machine_at(&state.id, state.status);
        let history = registry.history(&state.id);
        let events = registry.event_log(&state.id);

        let mut state = state;
        state.status = machine.lock().current();
        if state.status == FichaStatus::Finalized {
            let mut history = history.lock();
            if !history.is_finalized() {
                if let Err(err) = history.finalize(&state) {
                    tracing::warn!(ficha_id = %state.id, error = %err, "could not lock loaded history");
                }
            }
        }
        tracing::debug!(ficha_id = %state.id, status = %state.status, "session opened");
        Self {
            context: context.clone(),
            state,
            machine,
            history,
            events,
        }
    }

    /// Ficha id
    #[inline]
    #[must_use]
    pub fn ficha_id(&self) -> &FichaId {
        &self.state.id
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &FichaState {
        &self.state
    }

    /// Consume into the current state
    #[inline]
    #[must_use]
    pub fn into_state(self) -> FichaState {
        self.state
    }

    /// Current status, as held by the ficha's state machine
    #[inline]
    #[must_use]
    pub fn status(&self) -> FichaStatus {
        self.machine.lock().current()
    }

    /// The ficha's event log
    #[inline]
    #[must_use]
    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// The ficha's lifecycle manager
    #[must_use]
    pub fn lifecycle(&self) -> Arc<LifecycleManager> {
        self.context.registry().lifecycle(&self.state.id)
    }

    /// Whether there is an edit to undo
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.lock().can_undo()
    }

    /// Whether there is an edit to redo
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.lock().can_redo()
    }

    fn ensure_editable(&self) -> Result<(), KernelError> {
        if self.machine.lock().is_finalized() {
            return Err(HistoryError::Finalized.into());
        }
        Ok(())
    }

    fn sync_status(&mut self) {
        self.state.status = self.machine.lock().current();
    }

    fn apply_patch(&mut self, patch: &serde_json::Value) -> Result<(), KernelError> {
        let patch: FieldPatch =
            serde_json::from_value(patch.clone()).map_err(ModelError::from)?;
        let section = self
            .state
            .section_mut(&patch.section_id)
            .ok_or_else(|| ModelError::SectionNotFound(patch.section_id.clone()))?;
        match patch.value {
            Some(value) => {
                section.content.insert(patch.field, value);
            }
            None => {
                section.content.shift_remove(&patch.field);
            }
        }
        self.state.touch();
        Ok(())
    }

    /// Set a field value, recording an undo entry
    ///
    /// The first edit of a draft moves the ficha to `editing`.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::Finalized`] once the ficha is finalized
    /// - [`ModelError::SectionNotFound`] for an unknown section
    /// - [`KernelError::SectionLocked`] for a locked section
    pub fn edit_field(
        &mut self,
        section_id: &str,
        field: &str,
        value: impl Into<String>,
    ) -> Result<(), KernelError> {
        self.ensure_editable()?;
        self.sync_status();
        let section = self
            .state
            .section(section_id)
            .ok_or_else(|| ModelError::SectionNotFound(section_id.to_owned()))?;
        if section.locked {
            return Err(KernelError::SectionLocked(section_id.to_owned()));
        }

        let value = value.into();
        let previous = section.field(field).cloned();
        let next = match &previous {
            Some(existing) => {
                let mut edited = existing.clone();
                edited.edit(value.clone());
                edited
            }
            None => FieldValue::manual(value.clone()),
        };

        let before = FieldPatch {
            section_id: section_id.to_owned(),
            field: field.to_owned(),
            value: previous.clone(),
        };
        let after = FieldPatch {
            value: Some(next.clone()),
            ..before.clone()
        };
        let entry = HistoryEntry::new(
            EDIT_FIELD,
            serde_json::to_value(&before).map_err(ModelError::from)?,
            serde_json::to_value(&after).map_err(ModelError::from)?,
        );
        self.history.lock().add_entry(entry)?;

        if self.state.status == FichaStatus::Draft {
            self.apply_event(FichaEvent::StartEditing, None)?;
        }
        if let Some(section) = self.state.section_mut(section_id) {
            section.content.insert(field.to_owned(), next);
        }
        self.state.touch();

        let old_value = previous.map(|v| v.value).unwrap_or_default();
        self.events
            .log_edit(&format!("{section_id}.{field}"), &old_value, &value);
        self.maybe_auto_snapshot()?;
        Ok(())
    }

    /// Undo the last edit; `false` when there is nothing to undo
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the ficha is finalized.
    pub fn undo(&mut self) -> Result<bool, KernelError> {
        self.ensure_editable()?;
        self.sync_status();
        let Some(entry) = self.history.lock().undo() else {
            return Ok(false);
        };
        self.apply_patch(&entry.previous_state)?;
        self.events.log_undo(&entry.action);
        Ok(true)
    }

    /// Redo the last undone edit; `false` when there is nothing to redo
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the ficha is finalized.
    pub fn redo(&mut self) -> Result<bool, KernelError> {
        self.ensure_editable()?;
        self.sync_status();
        let Some(entry) = self.history.lock().redo() else {
            return Ok(false);
        };
        self.apply_patch(&entry.new_state)?;
        self.events.log_redo(&entry.action);
        Ok(true)
    }

    /// Append an error record
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ForeignError`] for a record of another ficha.
    pub fn add_error(&mut self, error: FichaError) -> Result<(), KernelError> {
        let severity = match error.severity {
            ErrorSeverity::Warning => EventSeverity::Warning,
            ErrorSeverity::Error => EventSeverity::Error,
        };
        let data = serde_json::json!({
            "errorId": error.id,
            "type": error.kind,
            "field": error.field,
        });
        let message = error.message.clone();
        self.state.push_error(error)?;
        self.events.log(EventKind::Error, message, severity, Some(data));
        Ok(())
    }

    /// Mark an error record resolved
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ErrorNotFound`] for an unknown id.
    pub fn resolve_error(&mut self, error_id: &str) -> Result<(), KernelError> {
        self.state.resolve_error(error_id)?;
        Ok(())
    }

    /// Remove every error record
    pub fn clear_errors(&mut self) {
        self.state.clear_errors();
    }

    fn apply_event(
        &mut self,
        event: FichaEvent,
        metadata: Option<serde_json::Value>,
    ) -> Result<StateTransition, KernelError> {
        let record = self.machine.lock().transition(event, metadata)?;
        self.sync_status();
        self.state.touch();
        self.events.log_transition(
            record.from_state.as_str(),
            record.to_state.as_str(),
            event.as_str(),
        );
        Ok(record)
    }

    /// Apply a state machine event
    ///
    /// `FINALIZE` goes through the same checks as [`Self::finalize`].
    ///
    /// # Errors
    ///
    /// - [`TransitionError::Invalid`](crate::error::TransitionError::Invalid)
    ///   if the event is not accepted
    /// - [`KernelError::FinalizeDenied`] if the validator refuses to finalize
    pub fn transition(
        &mut self,
        event: FichaEvent,
        metadata: Option<serde_json::Value>,
    ) -> Result<StateTransition, KernelError> {
        if event == FichaEvent::Finalize {
            return self.finalize_with(metadata).map(|(record, _)| record);
        }
        self.apply_event(event, metadata)
    }

    /// Take a snapshot of the current state
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn snapshot(&mut self, trigger: SnapshotTrigger) -> Result<Snapshot, KernelError> {
        self.ensure_editable()?;
        self.sync_status();
        let snapshot = self.history.lock().create_snapshot(&self.state, trigger)?;
        self.context.snapshots().save_snapshot(snapshot.clone());
        self.events.log_snapshot(&snapshot.id, trigger);
        Ok(snapshot)
    }

    fn maybe_auto_snapshot(&mut self) -> Result<(), KernelError> {
        let due = self.history.lock().should_auto_snapshot();
        if due {
            self.snapshot(SnapshotTrigger::Auto)?;
        }
        Ok(())
    }

    /// Restore a snapshot's content; `false` for an unknown id
    ///
    /// Status stays with the state machine and the version keeps growing.
    /// The undo/redo stack is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] once the history is locked.
    pub fn restore_snapshot(&mut self, snapshot_id: &str) -> Result<bool, KernelError> {
        self.ensure_editable()?;
        self.sync_status();
        let Some(mut restored) = self.history.lock().restore_snapshot(snapshot_id)? else {
            return Ok(false);
        };
        restored.status = self.state.status;
        restored.version = self.state.version;
        restored.last_modified = self.state.last_modified;
        restored.touch();
        self.state = restored;
        self.events.log_restore(
            "snapshot restored",
            EventSeverity::Info,
            Some(serde_json::json!({ "snapshotId": snapshot_id })),
        );
        Ok(true)
    }

    /// Whether the ficha can be finalized now
    #[must_use]
    pub fn can_finalize(&self) -> FinalizeCheck {
        self.context.validator().can_finalize(&self.state)
    }

    /// Validation summary of the current state
    #[must_use]
    pub fn summary(&self) -> ValidationSummary {
        self.context.validator().summary(&self.state)
    }

    /// Finalize: transition to `finalized` and lock the history
    ///
    /// # Errors
    ///
    /// - [`KernelError::FinalizeDenied`] if the validator refuses
    /// - [`TransitionError::Invalid`](crate::error::TransitionError::Invalid)
    ///   if the machine refuses
    pub fn finalize(&mut self) -> Result<Snapshot, KernelError> {
        self.finalize_with(None).map(|(_, snapshot)| snapshot)
    }

    fn finalize_with(
        &mut self,
        metadata: Option<serde_json::Value>,
    ) -> Result<(StateTransition, Snapshot), KernelError> {
        self.sync_status();
        let check = self.can_finalize();
        if !check.allowed {
            self.events.log_validate(false, &check.reasons);
            return Err(KernelError::FinalizeDenied {
                reasons: check.reasons,
            });
        }
        let record = self.apply_event(FichaEvent::Finalize, metadata)?;
        let snapshot = self.history.lock().finalize(&self.state)?;
        self.context.snapshots().save_snapshot(snapshot.clone());
        self.events.log_finalize(self.state.version);
        Ok((record, snapshot))
    }

    /// Store the current state through validated persistence
    ///
    /// # Errors
    ///
    /// - [`KernelError::SaveRejected`] if validation refuses the state
    /// - [`KernelError::Store`] on storage failure
    pub async fn save(&self) -> Result<(), KernelError> {
        let current = self.status();
        let state = if current == self.state.status {
            Cow::Borrowed(&self.state)
        } else {
            let mut synced = self.state.clone();
            synced.status = current;
            Cow::Owned(synced)
        };
        match self
            .context
            .persist()
            .safe_save(&self.state.id, &state)
            .await?
        {
            SaveOutcome::Saved => Ok(()),
            SaveOutcome::Rejected { reasons } => Err(KernelError::SaveRejected { reasons }),
        }
    }

    /// Reset the ficha and continue from the returned state
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Finalized`] for a finalized ficha.
    pub async fn reset(&mut self, target: ResetTarget) -> Result<ResetResult, KernelError> {
        let reset = self.context.reset();
        let result = match target {
            ResetTarget::LastValid => reset.reset_to_last_valid(&self.state.id).await?,
            ResetTarget::Base => reset.reset_to_base(&self.state.id).await?,
        };
        self.state = result.state.clone();
        self.sync_status();
        Ok(result)
    }
}
