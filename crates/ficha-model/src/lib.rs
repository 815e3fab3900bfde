//! Ficha Model - data types for inspection technical sheets
//!
//! Defines the aggregate a ficha lifecycle revolves around:
//! - `FichaState` and its sections, field values and customizations
//! - `FichaError` records bound to a single ficha
//! - Snapshots and undo/redo history entries
//! - State status tags attached to recovered or reset states
//!
//! # Example
//!
//! ```rust
//! use ficha_model::{FichaId, FichaSection, FichaState, FieldValue, SectionKind};
//!
//! let id = FichaId::new("ficha-1");
//! let state = FichaState::base(&id).with_section(
//!     FichaSection::new("ident", SectionKind::Identification)
//!         .with_field("pozoId", FieldValue::manual("PZ-001")),
//! );
//!
//! assert_eq!(state.sections[0].order, 0);
//! assert!(state.has_data());
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod ficha_error;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod time;
pub mod types;

pub use error::ModelError;
pub use ficha_error::{ErrorKind, ErrorSeverity, FichaError};
pub use snapshot::{Snapshot, SnapshotTrigger};
pub use state::{FichaState, HistoryEntry, CURRENT_SCHEMA_VERSION};
pub use status::{RecoverySource, StateStatus, StateStatusInfo};
pub use time::now_millis;
pub use types::{
    ColorScheme, Customizations, FichaId, FichaSection, FichaStatus, FieldSource, FieldValue,
    FontScheme, SectionKind, SpacingScheme,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with ficha data
    pub use crate::{
        FichaError, FichaId, FichaSection, FichaState, FichaStatus, FieldValue, SectionKind,
        Snapshot, SnapshotTrigger,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
