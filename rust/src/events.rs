//! Structured record of what an engine run did.
//!
//! Callers display or log these; the engine itself never writes them out.

use std::fmt;

use crate::eligibility::Ineligible;
use crate::models::{AssignmentId, Session};
use crate::roster::RosterWarning;
use crate::schedule::SkipReason;

/// Which operation produced a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Greedy,
    DirectFill,
    Swap,
    Backfill,
    Manual,
    Trainee,
    PairSync,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Greedy => "greedy",
            Phase::DirectFill => "direct fill",
            Phase::Swap => "swap",
            Phase::Backfill => "backfill",
            Phase::Manual => "manual",
            Phase::Trainee => "trainee",
            Phase::PairSync => "pair sync",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Data-integrity warning from roster loading.
    Roster(RosterWarning),
    /// Input assignment set aside and ignored.
    Skipped {
        assignment_id: AssignmentId,
        reason: SkipReason,
    },
    Placed {
        assignment_id: AssignmentId,
        staff_id: String,
        student_id: String,
        session: Session,
        phase: Phase,
    },
    Removed {
        assignment_id: AssignmentId,
        staff_id: String,
        student_id: String,
        session: Session,
    },
    Locked {
        assignment_id: AssignmentId,
    },
    /// Staff moved from one student to a gap, with a backfill on the first.
    Swapped {
        staff_id: String,
        from_student: String,
        to_student: String,
        backfill_id: String,
        session: Session,
        iteration: usize,
    },
    /// A candidate failed the filter (only with eligibility tracing on).
    Rejected {
        staff_id: String,
        student_id: String,
        session: Session,
        reason: Ineligible,
    },
    IterationCapReached {
        cap: usize,
    },
    /// A paired student's assignment could not be copied onto its partner.
    /// Unlocked sources are removed; locked ones are kept.
    MirrorRejected {
        assignment_id: AssignmentId,
        partner_id: String,
        reason: Ineligible,
        kept: bool,
    },
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Roster(warning) => write!(f, "roster: {}", warning),
            Self::Skipped {
                assignment_id,
                reason,
            } => write!(f, "skipped assignment {}: {}", assignment_id, reason),
            Self::Placed {
                assignment_id,
                staff_id,
                student_id,
                session,
                phase,
            } => write!(
                f,
                "{}: placed {} on {} {} (assignment {})",
                phase, staff_id, student_id, session, assignment_id
            ),
            Self::Removed {
                assignment_id,
                staff_id,
                student_id,
                session,
            } => write!(
                f,
                "removed {} from {} {} (assignment {})",
                staff_id, student_id, session, assignment_id
            ),
            Self::Locked { assignment_id } => write!(f, "locked assignment {}", assignment_id),
            Self::Swapped {
                staff_id,
                from_student,
                to_student,
                backfill_id,
                session,
                iteration,
            } => write!(
                f,
                "iteration {}: moved {} from {} to {} in {}, {} backfills {}",
                iteration, staff_id, from_student, to_student, session, backfill_id, from_student
            ),
            Self::Rejected {
                staff_id,
                student_id,
                session,
                reason,
            } => write!(
                f,
                "rejected {} for {} {}: {}",
                staff_id, student_id, session, reason
            ),
            Self::IterationCapReached { cap } => {
                write!(f, "swap optimizer stopped at iteration cap {}", cap)
            }
            Self::MirrorRejected {
                assignment_id,
                partner_id,
                reason,
                kept,
            } => {
                write!(
                    f,
                    "assignment {} cannot be mirrored onto {}: {}",
                    assignment_id, partner_id, reason
                )?;
                if *kept {
                    write!(f, " (locked, kept)")
                } else {
                    write!(f, " (removed)")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_message() {
        let event = EngineEvent::Swapped {
            staff_id: "a".to_string(),
            from_student: "y".to_string(),
            to_student: "g".to_string(),
            backfill_id: "d".to_string(),
            session: Session::Am,
            iteration: 1,
        };
        assert_eq!(
            event.to_string(),
            "iteration 1: moved a from y to g in AM, d backfills y"
        );
    }

    #[test]
    fn test_rejection_uses_reason_text() {
        let event = EngineEvent::Rejected {
            staff_id: "t".to_string(),
            student_id: "s".to_string(),
            session: Session::Pm,
            reason: Ineligible::TrainingOnly,
        };
        assert_eq!(
            event.to_string(),
            "rejected t for s PM: staff member is training-only with this student"
        );
    }
}
