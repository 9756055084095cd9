//! Rust implementation of the carematch staff assignment engine.
//!
//! Assigns caregiving staff to clients across the AM and PM sessions of one
//! date: a greedy pass, a single-hop swap optimizer, gap diagnostics and a
//! manual channel for locks and ad hoc placements.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

mod config;
mod diagnostics;
pub mod eligibility;
pub mod engine;
mod events;
pub mod logging;
mod models;
mod roster;
mod schedule;
#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use diagnostics::{diagnose, Blocker, Finding, GapDiagnostic, MemberReport};
pub use eligibility::{Filter, Ineligible};
pub use engine::{Engine, EngineError, GreedyOutcome, OptimizerOutcome, RunSummary};
pub use events::{EngineEvent, Phase};
pub use models::{
    Assignment, AssignmentId, Channel, Gap, Origin, Ratio, Session, SessionFlags, Staff, Student,
    TrainingStatus,
};
pub use roster::{Roster, RosterWarning};
pub use schedule::{Schedule, SkipReason, Violation};

fn value_error(e: EngineError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn build_roster(
    staff: Vec<Staff>,
    students: Vec<Student>,
    config: &EngineConfig,
    temporary_team: Option<Vec<(String, String)>>,
) -> Roster {
    Roster::new(staff, students, config).with_temporary_team(temporary_team.unwrap_or_default())
}

fn describe<T: ToString>(items: &[T]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// Outcome of a full engine run.
#[pyclass]
#[derive(Clone, Debug)]
pub struct RunResult {
    /// Every assignment for the date, including records set aside as stale
    #[pyo3(get)]
    pub assignments: Vec<Assignment>,
    #[pyo3(get)]
    pub greedy_fills: usize,
    #[pyo3(get)]
    pub direct_fills: usize,
    #[pyo3(get)]
    pub swaps: usize,
    #[pyo3(get)]
    pub iterations: usize,
    #[pyo3(get)]
    pub capped: bool,
    #[pyo3(get)]
    pub unresolved: Vec<Gap>,
    #[pyo3(get)]
    pub diagnostics: Vec<String>,
    #[pyo3(get)]
    pub events: Vec<String>,
}

#[pymethods]
impl RunResult {
    #[getter]
    fn gaps_filled(&self) -> usize {
        self.greedy_fills + self.direct_fills + self.swaps
    }

    fn __repr__(&self) -> String {
        format!(
            "RunResult(filled={}, swaps={}, iterations={}, unresolved={})",
            self.gaps_filled(),
            self.swaps,
            self.iterations,
            self.unresolved.len()
        )
    }
}

/// Outcome of one manual-channel edit.
#[pyclass]
#[derive(Clone, Debug)]
pub struct EditResult {
    /// Every assignment for the date after the edit
    #[pyo3(get)]
    pub assignments: Vec<Assignment>,
    /// Assignment ids created, locked or removed by the edit
    #[pyo3(get)]
    pub affected: Vec<AssignmentId>,
    #[pyo3(get)]
    pub events: Vec<String>,
}

#[pymethods]
impl EditResult {
    fn __repr__(&self) -> String {
        format!(
            "EditResult(affected={:?}, assignments={})",
            self.affected,
            self.assignments.len()
        )
    }
}

fn finish_edit(mut engine: Engine<'_>, affected: Vec<AssignmentId>) -> EditResult {
    let events = describe(&engine.take_events());
    EditResult {
        assignments: engine.into_schedule().into_assignments(),
        affected,
        events,
    }
}

/// Run the greedy pass and swap optimizer for one date.
///
/// # Arguments
/// * `staff` - Staff roster
/// * `students` - Student roster
/// * `date` - Date being scheduled
/// * `assignments` - Existing assignments for the date (locked ones are kept)
/// * `config` - Engine configuration (defaults when omitted)
/// * `temporary_team` - Extra (student_id, staff_id) team pairs for this date only
///
/// # Returns
/// * RunResult with the full assignment list, counters and diagnostics
#[pyfunction]
#[pyo3(signature = (staff, students, date, assignments, config=None, temporary_team=None))]
fn run_engine(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
    config: Option<EngineConfig>,
    temporary_team: Option<Vec<(String, String)>>,
) -> RunResult {
    let config = config.unwrap_or_default();
    let roster = build_roster(staff, students, &config, temporary_team);
    let mut engine = Engine::new(&roster, Schedule::new(date, assignments), config);
    let summary = engine.run();

    RunResult {
        assignments: engine.into_schedule().into_assignments(),
        greedy_fills: summary.greedy_fills,
        direct_fills: summary.direct_fills,
        swaps: summary.swaps,
        iterations: summary.iterations,
        capped: summary.capped,
        diagnostics: describe(&summary.diagnostics),
        events: describe(&summary.events),
        unresolved: summary.unresolved,
    }
}

/// Check whether a staff member may take a slot.
///
/// # Returns
/// * None when eligible, otherwise the first failing rule
///
/// # Raises
/// * ValueError if the staff member or student is unknown
#[pyfunction]
#[pyo3(signature = (staff, students, date, assignments, staff_id, student_id, session, channel=Channel::Primary, team_override=false))]
#[allow(clippy::too_many_arguments)]
fn check_eligibility(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
    staff_id: &str,
    student_id: &str,
    session: Session,
    channel: Channel,
    team_override: bool,
) -> PyResult<Option<String>> {
    let config = EngineConfig::default();
    let roster = Roster::new(staff, students, &config);
    let engine = Engine::new(&roster, Schedule::new(date, assignments), config);

    match engine.check_eligibility(staff_id, student_id, session, channel, team_override) {
        Ok(()) => Ok(None),
        Err(EngineError::NotEligible { reason, .. }) => Ok(Some(reason.to_string())),
        Err(e) => Err(value_error(e)),
    }
}

/// Place a staff member on a student's primary channel.
///
/// # Raises
/// * ValueError if an id is unknown, the slot is full, or a rule fails
#[pyfunction]
#[pyo3(signature = (staff, students, date, assignments, staff_id, student_id, session, team_override=false))]
#[allow(clippy::too_many_arguments)]
fn manual_assign(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
    staff_id: &str,
    student_id: &str,
    session: Session,
    team_override: bool,
) -> PyResult<EditResult> {
    let config = EngineConfig::default();
    let roster = Roster::new(staff, students, &config);
    let mut engine = Engine::new(&roster, Schedule::new(date, assignments), config);
    let created = engine
        .manual_assign(staff_id, student_id, session, team_override)
        .map_err(value_error)?;
    Ok(finish_edit(engine, created))
}

/// Place a staff member on a student's trainee channel.
///
/// # Raises
/// * ValueError if an id is unknown or a rule fails
#[pyfunction]
#[pyo3(signature = (staff, students, date, assignments, staff_id, student_id, session))]
#[allow(clippy::too_many_arguments)]
fn trainee_assign(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
    staff_id: &str,
    student_id: &str,
    session: Session,
) -> PyResult<EditResult> {
    let config = EngineConfig::default();
    let roster = Roster::new(staff, students, &config);
    let mut engine = Engine::new(&roster, Schedule::new(date, assignments), config);
    let created = engine
        .trainee_assign(staff_id, student_id, session)
        .map_err(value_error)?;
    Ok(finish_edit(engine, created))
}

/// Lock an assignment (and its pair mirror) against the optimizer.
#[pyfunction]
fn lock_assignment(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
    assignment_id: AssignmentId,
) -> PyResult<EditResult> {
    let config = EngineConfig::default();
    let roster = Roster::new(staff, students, &config);
    let mut engine = Engine::new(&roster, Schedule::new(date, assignments), config);
    let locked = engine.lock(assignment_id).map_err(value_error)?;
    Ok(finish_edit(engine, locked))
}

/// Unlock, which removes, an assignment and its pair mirror.
#[pyfunction]
fn unlock_assignment(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
    assignment_id: AssignmentId,
) -> PyResult<EditResult> {
    let config = EngineConfig::default();
    let roster = Roster::new(staff, students, &config);
    let mut engine = Engine::new(&roster, Schedule::new(date, assignments), config);
    let removed = engine.unlock(assignment_id).map_err(value_error)?;
    let ids = removed.iter().map(|a| a.id).collect();
    Ok(finish_edit(engine, ids))
}

/// Report hard-constraint violations in an assignment list.
#[pyfunction]
fn validate_schedule(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
) -> Vec<String> {
    let roster = Roster::new(staff, students, &EngineConfig::default());
    let mut schedule = Schedule::new(date, assignments);
    schedule.set_aside_stale(&roster);
    describe(&schedule.violations(&roster))
}

/// Explain every open slot in an assignment list without changing it.
#[pyfunction]
#[pyo3(signature = (staff, students, date, assignments, temporary_team=None))]
fn diagnose_gaps(
    staff: Vec<Staff>,
    students: Vec<Student>,
    date: NaiveDate,
    assignments: Vec<Assignment>,
    temporary_team: Option<Vec<(String, String)>>,
) -> Vec<String> {
    let config = EngineConfig::default();
    let roster = build_roster(staff, students, &config, temporary_team);
    let engine = Engine::new(&roster, Schedule::new(date, assignments), config);
    describe(&engine.diagnose(&engine.gaps()))
}

/// The carematch.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<Session>()?;
    m.add_class::<Ratio>()?;
    m.add_class::<TrainingStatus>()?;
    m.add_class::<Channel>()?;
    m.add_class::<Origin>()?;
    m.add_class::<SessionFlags>()?;
    m.add_class::<Staff>()?;
    m.add_class::<Student>()?;
    m.add_class::<Assignment>()?;
    m.add_class::<Gap>()?;
    m.add_class::<RunResult>()?;
    m.add_class::<EditResult>()?;

    // Config types
    m.add_class::<EngineConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(run_engine, m)?)?;
    m.add_function(wrap_pyfunction!(check_eligibility, m)?)?;
    m.add_function(wrap_pyfunction!(manual_assign, m)?)?;
    m.add_function(wrap_pyfunction!(trainee_assign, m)?)?;
    m.add_function(wrap_pyfunction!(lock_assignment, m)?)?;
    m.add_function(wrap_pyfunction!(unlock_assignment, m)?)?;
    m.add_function(wrap_pyfunction!(validate_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(diagnose_gaps, m)?)?;

    Ok(())
}
