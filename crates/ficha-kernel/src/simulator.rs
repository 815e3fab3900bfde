//! Seeded ficha session simulator
//!
//! Drives random operations through [`FichaSession`] and checks after each
//! one that:
//! - transitions are accepted exactly when the table allows them
//! - `status` matches the state machine
//! - foreign errors never enter a ficha
//! - a finalized ficha rejects edits, undo/redo, snapshots and transitions
//! - undo/redo and snapshot buffers stay within their bounds
//! - the domain invariants hold

use crate::context::FichaContext;
use crate::error::KernelError;
use crate::guard::GuardOutcome;
use crate::session::FichaSession;
use crate::state_machine::{target_state, FichaEvent};
use ficha_model::{
    FichaError, FichaId, FichaSection, FichaState, FieldValue, SectionKind, SnapshotTrigger,
};
use ficha_validate::check_all_invariants;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const FIELDS: [(&str, &str); 6] = [
    ("identification", "pozoId"),
    ("identification", "inspectionDate"),
    ("identification", "surveyor"),
    ("identification", "condition"),
    ("location", "address"),
    ("location", "neighborhood"),
];

/// Simulator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Fichas to simulate
    pub fichas: u64,
    /// Operations per ficha
    pub operations: u64,
    /// Stop at the first violation
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            fichas: 10,
            operations: 200,
            stop_on_first_violation: true,
        }
    }
}

/// Simulated operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SimulatedOperation {
    EditField { section: String, field: String, value: String },
    Undo,
    Redo,
    Transition(FichaEvent),
    Snapshot,
    RestoreLatestSnapshot,
    AddError { foreign: bool },
    Finalize,
    Save,
    GuardCorrupted,
}

/// Violation detected during simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Violation {
    /// Operation outcome contradicts the rules
    UnexpectedOutcome {
        ficha_id: String,
        operation: SimulatedOperation,
        detail: String,
    },
    /// `status` drifted from the state machine
    StatusDrift { ficha_id: String },
    /// Domain invariant failed after an operation
    InvariantBroken { ficha_id: String, violations: Vec<String> },
    /// A buffer grew past its bound
    UnboundedGrowth { ficha_id: String, detail: String },
}

/// Simulation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SimulatorStats {
    pub operations_attempted: u64,
    pub operations_succeeded: u64,
    pub operations_rejected: u64,
    pub transitions_applied: u64,
    pub fichas_finalized: u64,
    pub recoveries: u64,
}

/// Final simulator report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorReport {
    /// Configuration used
    pub config: SimulatorConfig,
    /// Counters
    pub stats: SimulatorStats,
    /// Violations found
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Whether no violation was found
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Plain-text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Ficha Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Fichas: {}\n", self.config.fichas));
        report.push_str(&format!("Operations Attempted: {}\n", self.stats.operations_attempted));
        report.push_str(&format!("Operations Succeeded: {}\n", self.stats.operations_succeeded));
        report.push_str(&format!("Operations Rejected: {}\n", self.stats.operations_rejected));
        report.push_str(&format!("Transitions Applied: {}\n", self.stats.transitions_applied));
        report.push_str(&format!("Fichas Finalized: {}\n", self.stats.fichas_finalized));
        report.push_str(&format!("Recoveries: {}\n", self.stats.recoveries));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

fn seed_state(id: &FichaId) -> FichaState {
    FichaState::base(id)
        .with_pozo_id(format!("PZ-{id}"))
        .with_section(
            FichaSection::new("identification", SectionKind::Identification)
                .with_field("pozoId", FieldValue::excel(format!("PZ-{id}"))),
        )
        .with_section(FichaSection::new("location", SectionKind::Location))
}

fn generate_operation(rng: &mut StdRng) -> SimulatedOperation {
    match rng.gen_range(0..20) {
        0..=6 => {
            let (section, field) = FIELDS[rng.gen_range(0..FIELDS.len())];
            SimulatedOperation::EditField {
                section: section.into(),
                field: field.into(),
                value: format!("v{}", rng.gen_range(0..1000)),
            }
        }
        7 | 8 => SimulatedOperation::Undo,
        9 => SimulatedOperation::Redo,
        10..=12 => {
            SimulatedOperation::Transition(FichaEvent::ALL[rng.gen_range(0..FichaEvent::ALL.len())])
        }
        13 => SimulatedOperation::Snapshot,
        14 => SimulatedOperation::RestoreLatestSnapshot,
        15 => SimulatedOperation::AddError {
            foreign: rng.gen_bool(0.5),
        },
        16 => SimulatedOperation::Finalize,
        17 | 18 => SimulatedOperation::Save,
        _ => SimulatedOperation::GuardCorrupted,
    }
}

/// Apply one operation; `Ok(true)` when it changed something
async fn execute_operation(
    context: &FichaContext,
    session: &mut FichaSession,
    operation: &SimulatedOperation,
    stats: &mut SimulatorStats,
) -> Result<bool, KernelError> {
    match operation {
        SimulatedOperation::EditField { section, field, value } => {
            session.edit_field(section, field, value.clone())?;
            Ok(true)
        }
        SimulatedOperation::Undo => session.undo(),
        SimulatedOperation::Redo => session.redo(),
        SimulatedOperation::Transition(event) => {
            session.transition(*event, None)?;
            stats.transitions_applied += 1;
            Ok(true)
        }
        SimulatedOperation::Snapshot => {
            session.snapshot(SnapshotTrigger::Manual)?;
            Ok(true)
        }
        SimulatedOperation::RestoreLatestSnapshot => {
            let latest = context
                .registry()
                .history(session.ficha_id())
                .lock()
                .latest_snapshot()
                .map(|s| s.id.clone());
            match latest {
                Some(id) => session.restore_snapshot(&id),
                None => Ok(false),
            }
        }
        SimulatedOperation::AddError { foreign } => {
            let owner = if *foreign {
                FichaId::new(format!("{}-other", session.ficha_id()))
            } else {
                session.ficha_id().clone()
            };
            session.add_error(FichaError::data(&owner, "simulated data issue"))?;
            Ok(true)
        }
        SimulatedOperation::Finalize => {
            session.finalize()?;
            stats.fichas_finalized += 1;
            Ok(true)
        }
        SimulatedOperation::Save => {
            session.save().await?;
            Ok(true)
        }
        SimulatedOperation::GuardCorrupted => {
            let mut corrupted = session.state().clone();
            corrupted.sections.clear();
            corrupted.version = 0;
            let outcome = context
                .guard()
                .guard_state(session.ficha_id(), corrupted)
                .await;
            stats.recoveries += 1;
            match outcome {
                GuardOutcome::Valid { .. } => Ok(false),
                GuardOutcome::Rejected { reason, message } => Err(KernelError::SaveRejected {
                    reasons: vec![format!("{}: {message}", reason.as_str())],
                }),
            }
        }
    }
}

/// Rule check on an outcome; `Some(detail)` when the outcome is wrong
fn check_outcome(
    before: &FichaState,
    operation: &SimulatedOperation,
    result: &Result<bool, KernelError>,
) -> Option<String> {
    let finalized = before.status.is_terminal();
    match (operation, result) {
        (SimulatedOperation::Transition(_), Err(KernelError::FinalizeDenied { .. })) => None,
        (SimulatedOperation::Transition(event), result) => {
            let allowed = target_state(before.status, *event).is_some();
            (allowed != result.is_ok()).then(|| {
                format!("{event} from {} gave {:?}", before.status, result.as_ref().err())
            })
        }
        (SimulatedOperation::AddError { foreign: true }, Ok(_)) => {
            Some("foreign error accepted".into())
        }
        (
            SimulatedOperation::EditField { .. }
            | SimulatedOperation::Undo
            | SimulatedOperation::Redo
            | SimulatedOperation::Snapshot
            | SimulatedOperation::Finalize,
            Ok(true),
        ) if finalized => Some("mutation accepted after finalize".into()),
        (SimulatedOperation::GuardCorrupted, Err(err)) => Some(format!("guard rejected: {err}")),
        _ => None,
    }
}

fn check_state(
    context: &FichaContext,
    session: &FichaSession,
    violations: &mut Vec<Violation>,
) {
    let ficha_id = session.ficha_id().to_string();
    let registry = context.registry();
    let machine_status = registry.machine(session.ficha_id()).lock().current();
    if machine_status != session.state().status {
        violations.push(Violation::StatusDrift {
            ficha_id: ficha_id.clone(),
        });
    }

    let report = check_all_invariants(session.state());
    if !report.valid {
        violations.push(Violation::InvariantBroken {
            ficha_id: ficha_id.clone(),
            violations: report.violations,
        });
    }

    let config = context.config().history;
    let info = registry.history(session.ficha_id()).lock().info();
    if info.undo_count + info.redo_count > config.max_undo || info.snapshot_count > config.max_snapshots {
        violations.push(Violation::UnboundedGrowth {
            ficha_id,
            detail: format!(
                "entries {} snapshots {}",
                info.undo_count + info.redo_count,
                info.snapshot_count
            ),
        });
    }
}

/// Run the simulator
pub async fn run_simulator(config: SimulatorConfig, context: &FichaContext) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    'fichas: for n in 0..config.fichas {
        let id = FichaId::new(format!("sim-{}-{n}", config.seed));
        let mut session = FichaSession::open(context, seed_state(&id));

        for _ in 0..config.operations {
            let operation = generate_operation(&mut rng);
            let before = session.state().clone();
            stats.operations_attempted += 1;

            let result = execute_operation(context, &mut session, &operation, &mut stats).await;
            if result.is_ok() {
                stats.operations_succeeded += 1;
            } else {
                stats.operations_rejected += 1;
            }

            let found = violations.len();
            if let Some(detail) = check_outcome(&before, &operation, &result) {
                violations.push(Violation::UnexpectedOutcome {
                    ficha_id: id.to_string(),
                    operation,
                    detail,
                });
            }
            check_state(context, &session, &mut violations);
            if config.stop_on_first_violation && violations.len() > found {
                break 'fichas;
            }
        }
    }

    tracing::info!(
        seed = config.seed,
        attempted = stats.operations_attempted,
        violations = violations.len(),
        "simulation finished"
    );
    SimulatorReport {
        config,
        stats,
        violations,
    }
}
