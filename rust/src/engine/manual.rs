//! Manual channel: lock, unlock, manual assign and trainee assign.
//!
//! Every operation propagates to an active 1:2 partner so paired students
//! keep identical assignments.

use crate::eligibility::{check_unit, Filter};
use crate::events::{EngineEvent, Phase};
use crate::models::{Assignment, AssignmentId, Channel, Origin, Session, Staff, Student};
use crate::log_changes;

use super::run::{Engine, EngineError};

impl<'r> Engine<'r> {
    /// Evaluate the filter for one placement without changing anything.
    pub fn check_eligibility(
        &self,
        staff_id: &str,
        student_id: &str,
        session: Session,
        channel: Channel,
        team_override: bool,
    ) -> Result<(), EngineError> {
        let (staff, student) = self.lookup(staff_id, student_id)?;
        let unit = self.roster.unit(student, session, self.schedule.date());
        let filter = match channel {
            Channel::Primary => Filter::PRIMARY,
            Channel::Trainee => Filter::TRAINEE,
        }
        .with_override(team_override);
        check_unit(self.roster, &self.schedule, staff, &unit, session, &filter).map_err(|reason| {
            EngineError::NotEligible {
                staff_id: staff_id.to_string(),
                student_id: student_id.to_string(),
                reason,
            }
        })
    }

    /// Place a staff member on a student's primary channel.
    ///
    /// `team_override` admits a staff member outside the student's team for
    /// this placement only. Returns the ids created (two for a pair).
    pub fn manual_assign(
        &mut self,
        staff_id: &str,
        student_id: &str,
        session: Session,
        team_override: bool,
    ) -> Result<Vec<AssignmentId>, EngineError> {
        let (staff, student) = self.lookup(staff_id, student_id)?;
        if self.missing(student, session) == 0 {
            return Err(EngineError::SlotFilled {
                student_id: student_id.to_string(),
                session,
            });
        }
        self.check_eligibility(staff_id, student_id, session, Channel::Primary, team_override)?;

        let unit = self.roster.unit(student, session, self.schedule.date());
        Ok(self.place_unit(
            &staff.id,
            &unit,
            session,
            Channel::Primary,
            Origin::Manual,
            Phase::Manual,
        ))
    }

    /// Place a staff member on the trainee channel.
    ///
    /// Uses the looser filter that omits the training-status rule. The
    /// optimizer never moves these.
    pub fn trainee_assign(
        &mut self,
        staff_id: &str,
        student_id: &str,
        session: Session,
    ) -> Result<Vec<AssignmentId>, EngineError> {
        let (staff, student) = self.lookup(staff_id, student_id)?;
        self.check_eligibility(staff_id, student_id, session, Channel::Trainee, false)?;

        let unit = self.roster.unit(student, session, self.schedule.date());
        Ok(self.place_unit(
            &staff.id,
            &unit,
            session,
            Channel::Trainee,
            Origin::Manual,
            Phase::Trainee,
        ))
    }

    /// Mark an assignment, and its pair mirror, immutable to the optimizer.
    pub fn lock(&mut self, assignment_id: AssignmentId) -> Result<Vec<AssignmentId>, EngineError> {
        let targets = self.with_mirrors(assignment_id)?;
        for id in &targets {
            self.schedule.set_locked(*id, true);
            log_changes!(self.config.verbosity, "Locked assignment {}", id);
            self.events.push(EngineEvent::Locked { assignment_id: *id });
        }
        Ok(targets)
    }

    /// Remove an assignment and its pair mirror.
    ///
    /// Unlocking and removing are the same operation.
    pub fn unlock(&mut self, assignment_id: AssignmentId) -> Result<Vec<Assignment>, EngineError> {
        let targets = self.with_mirrors(assignment_id)?;
        let mut removed = Vec::with_capacity(targets.len());
        for id in targets {
            if let Some(assignment) = self.schedule.remove(id) {
                log_changes!(
                    self.config.verbosity,
                    "Removed {} from {} {}",
                    assignment.staff_id,
                    assignment.student_id,
                    assignment.session
                );
                self.events.push(EngineEvent::Removed {
                    assignment_id: assignment.id,
                    staff_id: assignment.staff_id.clone(),
                    student_id: assignment.student_id.clone(),
                    session: assignment.session,
                });
                removed.push(assignment);
            }
        }
        Ok(removed)
    }

    fn lookup(
        &self,
        staff_id: &str,
        student_id: &str,
    ) -> Result<(&'r Staff, &'r Student), EngineError> {
        let staff = self
            .roster
            .staff(staff_id)
            .ok_or_else(|| EngineError::UnknownStaff(staff_id.to_string()))?;
        let student = self
            .roster
            .student(student_id)
            .ok_or_else(|| EngineError::UnknownStudent(student_id.to_string()))?;
        Ok((staff, student))
    }

    /// The assignment plus its identical placement on an active partner.
    fn with_mirrors(&self, assignment_id: AssignmentId) -> Result<Vec<AssignmentId>, EngineError> {
        let assignment = self
            .schedule
            .get(assignment_id)
            .ok_or(EngineError::UnknownAssignment(assignment_id))?;

        let mut ids = vec![assignment_id];
        let partner = self
            .roster
            .student(&assignment.student_id)
            .and_then(|s| {
                self.roster
                    .active_partner(s, assignment.session, self.schedule.date())
            });
        if let Some(partner) = partner {
            ids.extend(
                self.schedule
                    .for_student(&partner.id, assignment.session, assignment.channel)
                    .filter(|a| a.mirrors(assignment))
                    .map(|a| a.id),
            );
        }
        Ok(ids)
    }
}
