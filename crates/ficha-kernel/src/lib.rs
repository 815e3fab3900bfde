//! Ficha Kernel (ficha-kernel)
//!
//! Lifecycle and recovery for technical sheets:
//! 1. **Lifecycle**: status state machine, undo/redo, snapshots, finalize lock
//! 2. **Recovery**: validated persistence, ordered recovery, render guard
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ficha_kernel::prelude::*;
//!
//! let context = FichaContext::new(KernelConfig::default())?;
//! let mut session = FichaSession::open(&context, state);
//! session.edit_field("identification", "surveyor", "J. Perez")?;
//! session.save().await?;
//!
//! let outcome = context.guard().guard_state(session.ficha_id(), session.state().clone()).await;
//! ```

// Lifecycle
pub mod history;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod state_machine;

// Recovery
pub mod guard;
pub mod persistence;
pub mod recovery;
pub mod reset;
pub mod schema;

// Wiring
pub mod config;
pub mod context;
pub mod error;
pub mod session;

// Simulator
pub mod simulator;

// Re-exports
pub use config::KernelConfig;
pub use context::FichaContext;
pub use error::*;
pub use session::FichaSession;

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::config::KernelConfig;
    pub use crate::context::FichaContext;
    pub use crate::error::{HistoryError, KernelError, StoreError, TransitionError};
    pub use crate::guard::{FallbackScreen, GuardOutcome, RejectReason, StateGuard};
    pub use crate::history::{HistoryExport, HistoryManager};
    pub use crate::logging::{DomainEvent, EventKind, EventLog, EventSeverity};
    pub use crate::persistence::{
        PersistenceLayer, SafePersist, SaveOutcome, SnapshotStore, StorageAdapter,
    };
    pub use crate::recovery::{Recovery, RecoveryManager, RecoveryResult};
    pub use crate::registry::FichaRegistry;
    pub use crate::reset::{ResetTarget, SafeReset};
    pub use crate::session::FichaSession;
    pub use crate::state_machine::{FichaEvent, FichaStateMachine, StateTransition};
    pub use ficha_model::prelude::*;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
