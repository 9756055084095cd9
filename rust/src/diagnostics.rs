//! Read-only explanations for gaps the optimizer could not fill.

use std::fmt;

use crate::eligibility::{check_unit, Filter, Ineligible};
use crate::models::{AssignmentId, Channel, Gap, Student};
use crate::roster::Roster;
use crate::schedule::Schedule;

/// Why a replacement candidate could not take over a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blocker {
    TrainingOnly,
    WorkedTogetherToday,
    Unavailable,
    AssignedElsewhere,
    Other(Ineligible),
}

impl From<Ineligible> for Blocker {
    fn from(reason: Ineligible) -> Self {
        match reason {
            Ineligible::TrainingOnly => Blocker::TrainingOnly,
            Ineligible::AlreadyWorkedToday => Blocker::WorkedTogetherToday,
            Ineligible::StaffUnavailable | Ineligible::StaffInactive => Blocker::Unavailable,
            Ineligible::AlreadyBooked => Blocker::AssignedElsewhere,
            other => Blocker::Other(other),
        }
    }
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocker::TrainingOnly => write!(f, "training-only"),
            Blocker::WorkedTogetherToday => write!(f, "already worked together today"),
            Blocker::Unavailable => write!(f, "absent or out of session"),
            Blocker::AssignedElsewhere => write!(f, "assigned elsewhere"),
            Blocker::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// What stands between one team member and the gap.
#[derive(Clone, Debug, PartialEq)]
pub enum Finding {
    /// Team lists an id missing from the staff roster.
    NotOnRoster,
    /// Already placed on the gap's student in this session.
    AlreadyServing { assignment_id: AssignmentId },
    /// Free and eligible; the gap is fillable directly.
    Available,
    /// Not assigned in the session, but cannot take the gap.
    Free { reason: Ineligible },
    /// Assigned on a locked placement.
    Locked {
        assignment_id: AssignmentId,
        student_id: String,
    },
    /// Shadowing on the trainee channel, which the optimizer never moves.
    TraineeChannel {
        assignment_id: AssignmentId,
        student_id: String,
    },
    /// Movable, but would not qualify for the gap even if freed.
    CannotServe {
        assignment_id: AssignmentId,
        student_id: String,
        reason: Ineligible,
    },
    /// Movable and a backfill exists (only when the optimizer hit its cap).
    Replaceable {
        assignment_id: AssignmentId,
        student_id: String,
        candidates: Vec<String>,
    },
    /// Movable, but every other member of that student's team is blocked.
    NoReplacement {
        assignment_id: AssignmentId,
        student_id: String,
        blockers: Vec<(String, Blocker)>,
    },
    /// Movable, but that student's team has nobody else.
    NoTeamOverlap {
        assignment_id: AssignmentId,
        student_id: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberReport {
    pub staff_id: String,
    pub finding: Finding,
}

/// Explanation for one unresolved gap.
#[derive(Clone, Debug, PartialEq)]
pub struct GapDiagnostic {
    pub gap: Gap,
    pub members: Vec<MemberReport>,
}

impl fmt::Display for GapDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unfilled {}", self.gap)?;
        if self.members.is_empty() {
            write!(f, "\n  no team members")?;
        }
        for member in &self.members {
            write!(f, "\n  {}: ", member.staff_id)?;
            match &member.finding {
                Finding::NotOnRoster => write!(f, "not on staff roster")?,
                Finding::AlreadyServing { assignment_id } => {
                    write!(f, "already serving this slot (assignment {})", assignment_id)?
                }
                Finding::Available => write!(f, "available")?,
                Finding::Free { reason } => write!(f, "unassigned, {}", reason)?,
                Finding::Locked {
                    assignment_id,
                    student_id,
                } => write!(f, "locked on {} (assignment {})", student_id, assignment_id)?,
                Finding::TraineeChannel {
                    assignment_id,
                    student_id,
                } => write!(
                    f,
                    "training with {} (assignment {})",
                    student_id, assignment_id
                )?,
                Finding::CannotServe {
                    student_id, reason, ..
                } => write!(f, "on {}, cannot move: {}", student_id, reason)?,
                Finding::Replaceable {
                    student_id,
                    candidates,
                    ..
                } => write!(
                    f,
                    "on {}, replaceable by {}",
                    student_id,
                    candidates.join(", ")
                )?,
                Finding::NoReplacement {
                    student_id,
                    blockers,
                    ..
                } => {
                    let reasons: Vec<String> = blockers
                        .iter()
                        .map(|(id, blocker)| format!("{} {}", id, blocker))
                        .collect();
                    write!(
                        f,
                        "on {}, no replacement ({})",
                        student_id,
                        reasons.join("; ")
                    )?
                }
                Finding::NoTeamOverlap { student_id, .. } => {
                    write!(f, "on {}, no other staff on that team", student_id)?
                }
            }
        }
        Ok(())
    }
}

/// Explain each gap by examining every member of the gap student's team.
pub fn diagnose(roster: &Roster, schedule: &Schedule, gaps: &[Gap]) -> Vec<GapDiagnostic> {
    gaps.iter()
        .filter_map(|gap| {
            let student = roster.student(&gap.student_id)?;
            Some(GapDiagnostic {
                gap: gap.clone(),
                members: roster
                    .team_by_priority(student)
                    .into_iter()
                    .map(|staff_id| {
                        let finding = examine_member(roster, schedule, gap, student, &staff_id);
                        MemberReport { staff_id, finding }
                    })
                    .collect(),
            })
        })
        .collect()
}

fn examine_member(
    roster: &Roster,
    schedule: &Schedule,
    gap: &Gap,
    student: &Student,
    staff_id: &str,
) -> Finding {
    let Some(staff) = roster.staff(staff_id) else {
        return Finding::NotOnRoster;
    };
    let date = schedule.date();
    let unit = roster.unit(student, gap.session, date);

    let (serving, elsewhere): (Vec<_>, Vec<_>) = schedule
        .held_by(staff_id, gap.session, &gap.program)
        .partition(|a| unit.iter().any(|s| s.id == a.student_id));
    if let Some(serving) = serving.first() {
        return Finding::AlreadyServing {
            assignment_id: serving.id,
        };
    }
    let Some(current) = elsewhere.first() else {
        return match check_unit(roster, schedule, staff, &unit, gap.session, &Filter::PRIMARY) {
            Err(reason) => Finding::Free { reason },
            Ok(()) => Finding::Available,
        };
    };

    let assignment_id = current.id;
    let student_id = current.student_id.clone();
    if current.channel == Channel::Trainee {
        return Finding::TraineeChannel {
            assignment_id,
            student_id,
        };
    }
    if current.locked {
        return Finding::Locked {
            assignment_id,
            student_id,
        };
    }

    let Some(other) = roster.student(&student_id) else {
        return Finding::NotOnRoster;
    };
    let other_unit = roster.unit(other, gap.session, date);
    let moving: Vec<AssignmentId> = schedule
        .held_by(staff_id, gap.session, &gap.program)
        .filter(|a| other_unit.iter().any(|s| s.id == a.student_id))
        .map(|a| a.id)
        .collect();
    let freed = Filter::PRIMARY.ignoring(&moving);

    if let Err(reason) = check_unit(roster, schedule, staff, &unit, gap.session, &freed) {
        return Finding::CannotServe {
            assignment_id,
            student_id,
            reason,
        };
    }

    let others: Vec<String> = roster
        .team_by_priority(other)
        .into_iter()
        .filter(|id| id != staff_id)
        .collect();
    if others.is_empty() {
        return Finding::NoTeamOverlap {
            assignment_id,
            student_id,
        };
    }

    let mut candidates = Vec::new();
    let mut blockers = Vec::new();
    for candidate_id in others {
        let Some(candidate) = roster.staff(&candidate_id) else {
            continue;
        };
        match check_unit(roster, schedule, candidate, &other_unit, gap.session, &freed) {
            Ok(()) => candidates.push(candidate_id),
            Err(reason) => blockers.push((candidate_id, Blocker::from(reason))),
        }
    }

    if candidates.is_empty() {
        Finding::NoReplacement {
            assignment_id,
            student_id,
            blockers,
        }
    } else {
        Finding::Replaceable {
            assignment_id,
            student_id,
            candidates,
        }
    }
}
