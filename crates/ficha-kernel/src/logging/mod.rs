//! Per-ficha event log
//!
//! A bounded circular buffer of domain events; the oldest event is evicted
//! when the buffer is full. Every event is also emitted through `tracing` at
//! the matching level. Exports as a JSON document or newline-delimited JSON.

use ficha_model::time::to_rfc3339;
use ficha_model::{now_millis, FichaId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum EventKind {
    Edit,
    Undo,
    Redo,
    Snapshot,
    Transition,
    Error,
    Validate,
    Finalize,
    Restore,
}

impl EventKind {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "EDIT",
            Self::Undo => "UNDO",
            Self::Redo => "REDO",
            Self::Snapshot => "SNAPSHOT",
            Self::Transition => "TRANSITION",
            Self::Error => "ERROR",
            Self::Validate => "VALIDATE",
            Self::Finalize => "FINALIZE",
            Self::Restore => "RESTORE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

impl EventSeverity {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// One logged event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Event identifier
    pub id: String,
    /// Owning ficha
    pub ficha_id: FichaId,
    /// Category
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Severity
    pub severity: EventSeverity,
    /// When it was logged (ms)
    pub timestamp: i64,
    /// Description
    pub message: String,
    /// Structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Aggregate counts over a log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    /// Total events held
    pub total: usize,
    /// Count per kind
    pub by_kind: BTreeMap<EventKind, usize>,
    /// Count per severity
    pub by_severity: BTreeMap<EventSeverity, usize>,
    /// Oldest timestamp held
    pub first_timestamp: Option<i64>,
    /// Newest timestamp held
    pub last_timestamp: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    ficha_id: &'a FichaId,
    exported_at: String,
    stats: EventStats,
    events: &'a VecDeque<DomainEvent>,
}

/// Bounded audit log for one ficha
#[derive(Debug)]
pub struct EventLog {
    ficha_id: FichaId,
    capacity: usize,
    inner: Mutex<VecDeque<DomainEvent>>,
}

impl EventLog {
    /// Create new empty log
    #[must_use]
    pub fn new(ficha_id: FichaId, capacity: usize) -> Self {
        Self {
            ficha_id,
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Owning ficha
    #[inline]
    #[must_use]
    pub fn ficha_id(&self) -> &FichaId {
        &self.ficha_id
    }

    /// Maximum events held
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest when full
    pub fn log(
        &self,
        kind: EventKind,
        message: impl Into<String>,
        severity: EventSeverity,
        data: Option<serde_json::Value>,
    ) -> DomainEvent {
        let event = DomainEvent {
            id: uuid::Uuid::new_v4().to_string(),
            ficha_id: self.ficha_id.clone(),
            kind,
            severity,
            timestamp: now_millis(),
            message: message.into(),
            data,
        };
        mirror_to_tracing(&event);

        let mut guard = self.inner.lock();
        guard.push_back(event.clone());
        while guard.len() > self.capacity {
            guard.pop_front();
        }
        event
    }

    /// Log a field edit
    pub fn log_edit(&self, field: &str, old_value: &str, new_value: &str) -> DomainEvent {
        self.log(
            EventKind::Edit,
            format!("field {field} edited"),
            EventSeverity::Info,
            Some(serde_json::json!({ "field": field, "oldValue": old_value, "newValue": new_value })),
        )
    }

    /// Log an undo
    pub fn log_undo(&self, action: &str) -> DomainEvent {
        self.log(
            EventKind::Undo,
            format!("undo {action}"),
            EventSeverity::Info,
            Some(serde_json::json!({ "action": action })),
        )
    }

    /// Log a redo
    pub fn log_redo(&self, action: &str) -> DomainEvent {
        self.log(
            EventKind::Redo,
            format!("redo {action}"),
            EventSeverity::Info,
            Some(serde_json::json!({ "action": action })),
        )
    }

    /// Log a snapshot
    pub fn log_snapshot(&self, snapshot_id: &str, trigger: impl Serialize) -> DomainEvent {
        self.log(
            EventKind::Snapshot,
            "snapshot created",
            EventSeverity::Info,
            Some(serde_json::json!({ "snapshotId": snapshot_id, "trigger": trigger })),
        )
    }

    /// Log a state transition
    pub fn log_transition(&self, from: &str, to: &str, event: &str) -> DomainEvent {
        self.log(
            EventKind::Transition,
            format!("{from} -> {to}"),
            EventSeverity::Info,
            Some(serde_json::json!({ "from": from, "to": to, "event": event })),
        )
    }

    /// Log an error
    pub fn log_error(&self, message: impl Into<String>, data: Option<serde_json::Value>) -> DomainEvent {
        self.log(EventKind::Error, message, EventSeverity::Error, data)
    }

    /// Log a validation outcome; failures are warnings
    pub fn log_validate(&self, valid: bool, errors: &[String]) -> DomainEvent {
        let (message, severity) = if valid {
            ("validation passed", EventSeverity::Info)
        } else {
            ("validation failed", EventSeverity::Warning)
        };
        self.log(
            EventKind::Validate,
            message,
            severity,
            Some(serde_json::json!({ "valid": valid, "errors": errors })),
        )
    }

    /// Log a finalize
    pub fn log_finalize(&self, version: u64) -> DomainEvent {
        self.log(
            EventKind::Finalize,
            "ficha finalized",
            EventSeverity::Info,
            Some(serde_json::json!({ "version": version })),
        )
    }

    /// Log a restore
    pub fn log_restore(
        &self,
        message: impl Into<String>,
        severity: EventSeverity,
        data: Option<serde_json::Value>,
    ) -> DomainEvent {
        self.log(EventKind::Restore, message, severity, data)
    }

    /// All events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.inner.lock().iter().cloned().collect()
    }

    /// Events of one kind
    #[must_use]
    pub fn by_kind(&self, kind: EventKind) -> Vec<DomainEvent> {
        self.filter(|e| e.kind == kind)
    }

    /// Events of one severity
    #[must_use]
    pub fn by_severity(&self, severity: EventSeverity) -> Vec<DomainEvent> {
        self.filter(|e| e.severity == severity)
    }

    /// Events with `start <= timestamp <= end`
    #[must_use]
    pub fn in_range(&self, start: i64, end: i64) -> Vec<DomainEvent> {
        self.filter(|e| (start..=end).contains(&e.timestamp))
    }

    fn filter(&self, predicate: impl Fn(&DomainEvent) -> bool) -> Vec<DomainEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// The `n` most recent events, oldest first
    #[must_use]
    pub fn last(&self, n: usize) -> Vec<DomainEvent> {
        let guard = self.inner.lock();
        let skip = guard.len().saturating_sub(n);
        guard.iter().skip(skip).cloned().collect()
    }

    /// Number of events held
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// No events held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every event
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Aggregate counts
    #[must_use]
    pub fn stats(&self) -> EventStats {
        compute_stats(&self.inner.lock())
    }

    /// Export as a pretty JSON document with stats
    ///
    /// # Errors
    ///
    /// Returns the serializer error if an event payload cannot be encoded.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        let guard = self.inner.lock();
        let document = ExportDocument {
            ficha_id: &self.ficha_id,
            exported_at: to_rfc3339(now_millis()),
            stats: compute_stats(&guard),
            events: &guard,
        };
        serde_json::to_string_pretty(&document)
    }

    /// Export as newline-delimited JSON, one event per line
    ///
    /// # Errors
    ///
    /// Returns the serializer error if an event payload cannot be encoded.
    pub fn export_ndjson(&self) -> Result<String, serde_json::Error> {
        let guard = self.inner.lock();
        let mut out = String::new();
        for event in guard.iter() {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}

fn compute_stats(events: &VecDeque<DomainEvent>) -> EventStats {
    let mut stats = EventStats {
        total: events.len(),
        first_timestamp: events.front().map(|e| e.timestamp),
        last_timestamp: events.back().map(|e| e.timestamp),
        ..EventStats::default()
    };
    for event in events {
        *stats.by_kind.entry(event.kind).or_default() += 1;
        *stats.by_severity.entry(event.severity).or_default() += 1;
    }
    stats
}

fn mirror_to_tracing(event: &DomainEvent) {
    let kind = event.kind.as_str();
    match event.severity {
        EventSeverity::Info => {
            tracing::info!(ficha_id = %event.ficha_id, kind, "{}", event.message);
        }
        EventSeverity::Warning => {
            tracing::warn!(ficha_id = %event.ficha_id, kind, "{}", event.message);
        }
        EventSeverity::Error => {
            tracing::error!(ficha_id = %event.ficha_id, kind, "{}", event.message);
        }
    }
}
