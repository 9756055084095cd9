//! Hard-constraint filter deciding whether a staff member may take a slot.
//!
//! Rules are evaluated fail-fast in a fixed order so the first failure is the
//! reported reason:
//! 1. staff active
//! 2. staff supports the program
//! 3. staff present for the session
//! 4. student attends the date and the session
//! 5. staff not already booked in the session+program
//! 6. staff has not worked with the student today
//! 7. staff on the student's team (unless overridden)
//! 8. staff not training-only with the student (primary channel only)

use thiserror::Error;

use crate::models::{AssignmentId, Channel, Session, Staff, Student};
use crate::roster::Roster;
use crate::schedule::Schedule;

/// Reason a staff member cannot take a slot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ineligible {
    #[error("staff member is inactive")]
    StaffInactive,
    #[error("staff member does not serve this program")]
    ProgramNotSupported,
    #[error("staff member is absent or out of session")]
    StaffUnavailable,
    #[error("student is not scheduled to attend today")]
    StudentNotScheduled,
    #[error("student is absent for this session")]
    StudentUnavailable,
    #[error("staff member is already assigned in this session")]
    AlreadyBooked,
    #[error("staff member already worked with this student today")]
    AlreadyWorkedToday,
    #[error("staff member is not on the student's team")]
    NotOnTeam,
    #[error("staff member is training-only with this student")]
    TrainingOnly,
}

/// Options narrowing or relaxing one eligibility check.
#[derive(Clone, Copy, Debug)]
pub struct Filter<'a> {
    /// Trainee channel omits the training-status rule.
    pub channel: Channel,
    /// Skip the team-membership rule for an ad hoc placement.
    pub team_override: bool,
    /// Paired partner whose shared placement does not count as a booking.
    pub partner: Option<&'a str>,
    /// Assignments to treat as already removed.
    pub ignore: &'a [AssignmentId],
}

impl Filter<'static> {
    pub const PRIMARY: Filter<'static> = Filter {
        channel: Channel::Primary,
        team_override: false,
        partner: None,
        ignore: &[],
    };

    pub const TRAINEE: Filter<'static> = Filter {
        channel: Channel::Trainee,
        team_override: false,
        partner: None,
        ignore: &[],
    };
}

impl<'a> Filter<'a> {
    pub fn ignoring(self, ignore: &'a [AssignmentId]) -> Filter<'a> {
        Filter { ignore, ..self }
    }

    pub fn with_override(self, team_override: bool) -> Filter<'a> {
        Filter {
            team_override,
            ..self
        }
    }
}

/// Evaluate the hard constraints for one staff/student/session/program slot.
pub fn check(
    roster: &Roster,
    schedule: &Schedule,
    staff: &Staff,
    student: &Student,
    session: Session,
    program: &str,
    filter: &Filter<'_>,
) -> Result<(), Ineligible> {
    if !staff.active {
        return Err(Ineligible::StaffInactive);
    }
    if !staff.supports(program) {
        return Err(Ineligible::ProgramNotSupported);
    }
    if !staff.available(session) {
        return Err(Ineligible::StaffUnavailable);
    }
    if !student.attends_on(schedule.date()) {
        return Err(Ineligible::StudentNotScheduled);
    }
    if !student.available(session) {
        return Err(Ineligible::StudentUnavailable);
    }

    let booked = schedule
        .held_by(&staff.id, session, program)
        .filter(|a| !filter.ignore.contains(&a.id))
        .any(|a| filter.partner != Some(a.student_id.as_str()));
    if booked {
        return Err(Ineligible::AlreadyBooked);
    }

    let worked_today = schedule
        .between(&staff.id, &student.id)
        .any(|a| !filter.ignore.contains(&a.id));
    if worked_today {
        return Err(Ineligible::AlreadyWorkedToday);
    }

    if !filter.team_override && !roster.on_team(student, &staff.id) {
        return Err(Ineligible::NotOnTeam);
    }

    if filter.channel == Channel::Primary && student.training_status(&staff.id).is_trainee() {
        return Err(Ineligible::TrainingOnly);
    }

    Ok(())
}

/// Boolean form of [`check`].
pub fn is_eligible(
    roster: &Roster,
    schedule: &Schedule,
    staff: &Staff,
    student: &Student,
    session: Session,
    program: &str,
    filter: &Filter<'_>,
) -> bool {
    check(roster, schedule, staff, student, session, program, filter).is_ok()
}

/// Check a placement unit: one student, or both students of an active pair.
///
/// Each member is checked against its own program, with the other member as
/// the partner.
pub fn check_unit(
    roster: &Roster,
    schedule: &Schedule,
    staff: &Staff,
    unit: &[&Student],
    session: Session,
    filter: &Filter<'_>,
) -> Result<(), Ineligible> {
    for (idx, student) in unit.iter().enumerate() {
        let partner = unit
            .iter()
            .enumerate()
            .find(|(other, _)| *other != idx)
            .map(|(_, s)| s.id.as_str());
        let member_filter = Filter {
            partner: partner.or(filter.partner),
            ..*filter
        };
        check(
            roster,
            schedule,
            staff,
            student,
            session,
            &student.program,
            &member_filter,
        )?;
    }
    Ok(())
}
