//! Ficha Validate - structural and business validation
//!
//! Two layers, from least to most strict:
//! - [`structural`]: is a payload shaped well enough to render or persist?
//! - [`business`]: is a ficha complete enough to finalize or export?
//!
//! Plus [`invariants`], the full set of domain invariants used by diagnostics.
//!
//! Validators never fail: they always return a report.

#![warn(unreachable_pub)]

pub mod business;
pub mod invariants;
pub mod structural;

pub use business::{
    FinalValidator, FinalizeCheck, ValidationConfig, ValidationReport, ValidationSummary,
};
pub use invariants::{check_all_invariants, InvariantReport};
pub use structural::{
    is_persistible, is_renderable, validate_field_value_structure, validate_state_structure,
    validate_structure, StructuralIssue, StructuralReport, StructuralSeverity,
};
