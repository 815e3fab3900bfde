//! Ficha lifecycle phases and managed resources
//!
//! A ficha moves through `mounted`, `suspended`, `resumed` and `destroyed`
//! (the initial phase). Resources registered while mounted are cleaned up on
//! destroy. Phase callbacks are async; their failures are logged and never
//! propagated to the caller.

use crate::error::LifecycleError;
use ficha_model::{now_millis, FichaId};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum LifecyclePhase {
    Mounted,
    Suspended,
    Resumed,
    Destroyed,
}

impl LifecyclePhase {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mounted => "mounted",
            Self::Suspended => "suspended",
            Self::Resumed => "resumed",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a phase callback
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Async phase callback
pub type PhaseCallback =
    Arc<dyn Fn(FichaId, LifecyclePhase) -> BoxFuture<'static, Result<(), CallbackError>> + Send + Sync>;

/// Kind of managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ResourceKind {
    Task,
    Subscription,
    Other,
}

struct ManagedResource {
    kind: ResourceKind,
    cleanup: Box<dyn FnOnce() + Send>,
}

struct LifecycleState {
    phase: LifecyclePhase,
    mounted_at: Option<i64>,
    suspended_at: Option<i64>,
    resources: HashMap<String, ManagedResource>,
    callbacks: HashMap<LifecyclePhase, Vec<PhaseCallback>>,
}

/// Diagnostic summary of a lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleInfo {
    /// Current phase
    pub phase: LifecyclePhase,
    /// Live resources
    pub resource_count: usize,
    /// Last mount time (ms)
    pub mounted_at: Option<i64>,
    /// Suspension time (ms), while suspended
    pub suspended_at: Option<i64>,
}

/// Per-ficha lifecycle manager
pub struct LifecycleManager {
    ficha_id: FichaId,
    state: Mutex<LifecycleState>,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("ficha_id", &self.ficha_id)
            .field("info", &self.info())
            .finish()
    }
}

impl LifecycleManager {
    /// Create new manager in `destroyed`
    #[must_use]
    pub fn new(ficha_id: FichaId) -> Self {
        Self {
            ficha_id,
            state: Mutex::new(LifecycleState {
                phase: LifecyclePhase::Destroyed,
                mounted_at: None,
                suspended_at: None,
                resources: HashMap::new(),
                callbacks: HashMap::new(),
            }),
        }
    }

    /// Owning ficha
    #[inline]
    #[must_use]
    pub fn ficha_id(&self) -> &FichaId {
        &self.ficha_id
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        self.state.lock().phase
    }

    /// Any phase but `destroyed`
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.phase() != LifecyclePhase::Destroyed
    }

    /// `mounted` or `resumed`
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.phase(), LifecyclePhase::Mounted | LifecyclePhase::Resumed)
    }

    /// Register a callback for a phase
    pub fn on_phase<F>(&self, phase: LifecyclePhase, callback: F)
    where
        F: Fn(FichaId, LifecyclePhase) -> BoxFuture<'static, Result<(), CallbackError>>
            + Send
            + Sync
            + 'static,
    {
        self.state
            .lock()
            .callbacks
            .entry(phase)
            .or_default()
            .push(Arc::new(callback));
    }

    /// Register a resource, returning its id
    pub fn register_resource<F>(&self, kind: ResourceKind, cleanup: F) -> String
    where
        F: FnOnce() + Send + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        self.state.lock().resources.insert(
            id.clone(),
            ManagedResource {
                kind,
                cleanup: Box::new(cleanup),
            },
        );
        id
    }

    /// Register a background task, aborted on destroy
    pub fn register_task(&self, handle: tokio::task::JoinHandle<()>) -> String {
        self.register_resource(ResourceKind::Task, move || handle.abort())
    }

    /// Run a resource's cleanup now and forget it
    pub fn unregister_resource(&self, id: &str) -> bool {
        let resource = self.state.lock().resources.remove(id);
        match resource {
            Some(resource) => {
                (resource.cleanup)();
                true
            }
            None => false,
        }
    }

    /// Live resource count
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.state.lock().resources.len()
    }

    fn enter(
        &self,
        operation: &'static str,
        allowed: impl Fn(LifecyclePhase) -> bool,
        next: LifecyclePhase,
    ) -> Result<Vec<PhaseCallback>, LifecycleError> {
        let mut state = self.state.lock();
        if !allowed(state.phase) {
            return Err(LifecycleError::InvalidPhase {
                operation,
                phase: state.phase,
            });
        }
        state.phase = next;
        let now = now_millis();
        match next {
            LifecyclePhase::Mounted => state.mounted_at = Some(now),
            LifecyclePhase::Suspended => state.suspended_at = Some(now),
            LifecyclePhase::Resumed | LifecyclePhase::Destroyed => state.suspended_at = None,
        }
        Ok(state.callbacks.get(&next).cloned().unwrap_or_default())
    }

    async fn run_callbacks(&self, phase: LifecyclePhase, callbacks: Vec<PhaseCallback>) {
        for callback in callbacks {
            let ficha_id = self.ficha_id.clone();
            let outcome = AssertUnwindSafe(async move { callback(ficha_id, phase).await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(ficha_id = %self.ficha_id, %phase, error = %err, "lifecycle callback failed");
                }
                Err(payload) => {
                    tracing::error!(
                        ficha_id = %self.ficha_id,
                        %phase,
                        panic = %panic_message(payload.as_ref()),
                        "lifecycle callback panicked"
                    );
                }
            }
        }
    }

    /// Mount; only from `destroyed`
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidPhase`] if already mounted.
    pub async fn mount(&self) -> Result<(), LifecycleError> {
        let callbacks = self.enter(
            "mount",
            |p| p == LifecyclePhase::Destroyed,
            LifecyclePhase::Mounted,
        )?;
        tracing::debug!(ficha_id = %self.ficha_id, "mounted");
        self.run_callbacks(LifecyclePhase::Mounted, callbacks).await;
        Ok(())
    }

    /// Suspend; from any phase but `destroyed`
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidPhase`] once destroyed.
    pub async fn suspend(&self) -> Result<(), LifecycleError> {
        let callbacks = self.enter(
            "suspend",
            |p| p != LifecyclePhase::Destroyed,
            LifecyclePhase::Suspended,
        )?;
        tracing::debug!(ficha_id = %self.ficha_id, "suspended");
        self.run_callbacks(LifecyclePhase::Suspended, callbacks).await;
        Ok(())
    }

    /// Resume; only from `suspended`
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidPhase`] if not suspended.
    pub async fn resume(&self) -> Result<(), LifecycleError> {
        let callbacks = self.enter(
            "resume",
            |p| p == LifecyclePhase::Suspended,
            LifecyclePhase::Resumed,
        )?;
        tracing::debug!(ficha_id = %self.ficha_id, "resumed");
        self.run_callbacks(LifecyclePhase::Resumed, callbacks).await;
        Ok(())
    }

    /// Destroy, running every resource cleanup; a no-op when already destroyed
    pub async fn destroy(&self) {
        let (resources, callbacks) = {
            let mut state = self.state.lock();
            if state.phase == LifecyclePhase::Destroyed {
                return;
            }
            state.phase = LifecyclePhase::Destroyed;
            state.suspended_at = None;
            let resources: Vec<_> = state.resources.drain().collect();
            let callbacks = state
                .callbacks
                .get(&LifecyclePhase::Destroyed)
                .cloned()
                .unwrap_or_default();
            (resources, callbacks)
        };

        let count = resources.len();
        for (id, resource) in resources {
            tracing::trace!(ficha_id = %self.ficha_id, resource = %id, kind = ?resource.kind, "cleanup");
            (resource.cleanup)();
        }
        tracing::debug!(ficha_id = %self.ficha_id, resources = count, "destroyed");
        self.run_callbacks(LifecyclePhase::Destroyed, callbacks).await;
    }

    /// Diagnostic summary
    #[must_use]
    pub fn info(&self) -> LifecycleInfo {
        let state = self.state.lock();
        LifecycleInfo {
            phase: state.phase,
            resource_count: state.resources.len(),
            mounted_at: state.mounted_at,
            suspended_at: state.suspended_at,
        }
    }
}
