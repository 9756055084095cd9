//! The assignment set for one calendar date.
//!
//! All mutation goes through `place`, `remove` and `set_locked` so the
//! invariants can be checked at every observable boundary.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

use crate::models::{Assignment, AssignmentId, Channel, Origin, Session};
use crate::roster::Roster;

/// Why an input assignment was set aside instead of used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    UnknownStaff,
    UnknownStudent,
    DuplicateId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStaff => write!(f, "staff not on roster"),
            Self::UnknownStudent => write!(f, "student not on roster"),
            Self::DuplicateId => write!(f, "duplicate assignment id"),
        }
    }
}

/// A breach of a schedule invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Staff holds more than one placement in a session+program.
    DoubleBooked {
        staff_id: String,
        session: Session,
        program: String,
    },
    /// Staff placed on the same student more than once today.
    RepeatedPairing { staff_id: String, student_id: String },
    /// Overlap-status staff on a primary assignment.
    TraineeOnPrimary {
        assignment_id: AssignmentId,
        staff_id: String,
        student_id: String,
    },
    /// Paired students whose assignments differ for a session.
    PairMismatch {
        student_id: String,
        partner_id: String,
        session: Session,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoubleBooked {
                staff_id,
                session,
                program,
            } => write!(f, "{} double-booked in {} {}", staff_id, session, program),
            Self::RepeatedPairing {
                staff_id,
                student_id,
            } => write!(f, "{} placed on {} more than once", staff_id, student_id),
            Self::TraineeOnPrimary {
                assignment_id,
                staff_id,
                student_id,
            } => write!(
                f,
                "assignment {}: {} is training-only with {}",
                assignment_id, staff_id, student_id
            ),
            Self::PairMismatch {
                student_id,
                partner_id,
                session,
            } => write!(
                f,
                "{} and {} differ in {}",
                student_id, partner_id, session
            ),
        }
    }
}

/// Assignments for one date.
#[derive(Clone, Debug)]
pub struct Schedule {
    date: NaiveDate,
    /// Live assignments, the only ones queries see
    assignments: Vec<Assignment>,
    /// Stale input records, carried through untouched
    set_aside: Vec<Assignment>,
    next_id: AssignmentId,
}

impl Schedule {
    /// Create a schedule from existing assignments.
    pub fn new(date: NaiveDate, assignments: Vec<Assignment>) -> Self {
        let mut schedule = Self {
            date,
            assignments,
            set_aside: Vec::new(),
            next_id: 1,
        };
        schedule.next_id = match schedule.assignments.iter().map(|a| a.id).max() {
            None => 1,
            Some(max) => max
                .checked_add(1)
                .unwrap_or_else(|| schedule.lowest_free_id()),
        };
        schedule
    }

    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Live assignments.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Records set aside as stale.
    pub fn set_aside(&self) -> &[Assignment] {
        &self.set_aside
    }

    /// Consume into the full record list, stale records last.
    pub fn into_assignments(self) -> Vec<Assignment> {
        let mut all = self.assignments;
        all.extend(self.set_aside);
        all
    }

    pub fn get(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    /// Ids of all locked live assignments, ascending.
    pub fn locked_ids(&self) -> Vec<AssignmentId> {
        let mut ids: Vec<AssignmentId> = self
            .assignments
            .iter()
            .filter(|a| a.locked)
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Move records referencing unknown ids, or reusing an id, out of the
    /// live set.
    pub fn set_aside_stale(&mut self, roster: &Roster) -> Vec<(AssignmentId, SkipReason)> {
        let mut seen: FxHashSet<AssignmentId> = FxHashSet::default();
        let mut skipped = Vec::new();
        let mut kept = Vec::with_capacity(self.assignments.len());

        for assignment in std::mem::take(&mut self.assignments) {
            let reason = if !seen.insert(assignment.id) {
                Some(SkipReason::DuplicateId)
            } else if roster.staff(&assignment.staff_id).is_none() {
                Some(SkipReason::UnknownStaff)
            } else if roster.student(&assignment.student_id).is_none() {
                Some(SkipReason::UnknownStudent)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    skipped.push((assignment.id, reason));
                    self.set_aside.push(assignment);
                }
                None => kept.push(assignment),
            }
        }

        self.assignments = kept;
        skipped
    }

    /// Add a new assignment and return its id.
    pub(crate) fn place(
        &mut self,
        staff_id: &str,
        student_id: &str,
        session: Session,
        program: &str,
        channel: Channel,
        origin: Origin,
    ) -> AssignmentId {
        let id = self.next_id;
        self.assignments.push(Assignment {
            id,
            staff_id: staff_id.to_string(),
            student_id: student_id.to_string(),
            session,
            program: program.to_string(),
            locked: false,
            origin,
            channel,
        });
        self.next_id = id
            .checked_add(1)
            .filter(|next| !self.id_in_use(*next))
            .unwrap_or_else(|| self.lowest_free_id());
        id
    }

    fn id_in_use(&self, id: AssignmentId) -> bool {
        self.assignments
            .iter()
            .chain(&self.set_aside)
            .any(|a| a.id == id)
    }

    /// Smallest id not held by any record, live or set aside.
    fn lowest_free_id(&self) -> AssignmentId {
        let used: FxHashSet<AssignmentId> = self
            .assignments
            .iter()
            .chain(&self.set_aside)
            .map(|a| a.id)
            .collect();
        (1..=AssignmentId::MAX)
            .find(|id| !used.contains(id))
            .unwrap_or_default()
    }

    pub(crate) fn remove(&mut self, id: AssignmentId) -> Option<Assignment> {
        let idx = self.assignments.iter().position(|a| a.id == id)?;
        Some(self.assignments.remove(idx))
    }

    /// Set the lock flag. Returns false if the id is not live.
    pub(crate) fn set_locked(&mut self, id: AssignmentId, locked: bool) -> bool {
        match self.assignments.iter_mut().find(|a| a.id == id) {
            Some(a) => {
                a.locked = locked;
                true
            }
            None => false,
        }
    }

    /// Assignments held by `staff_id` in `session` for `program`, any channel.
    pub fn held_by<'a>(
        &'a self,
        staff_id: &'a str,
        session: Session,
        program: &'a str,
    ) -> impl Iterator<Item = &'a Assignment> + 'a {
        self.assignments.iter().filter(move |a| {
            a.staff_id == staff_id && a.session == session && a.program == program
        })
    }

    /// Assignments pairing `staff_id` with `student_id` today, any session or channel.
    pub fn between<'a>(
        &'a self,
        staff_id: &'a str,
        student_id: &'a str,
    ) -> impl Iterator<Item = &'a Assignment> + 'a {
        self.assignments
            .iter()
            .filter(move |a| a.staff_id == staff_id && a.student_id == student_id)
    }

    /// Assignments for a student in a session on the given channel.
    pub fn for_student<'a>(
        &'a self,
        student_id: &'a str,
        session: Session,
        channel: Channel,
    ) -> impl Iterator<Item = &'a Assignment> + 'a {
        self.assignments.iter().filter(move |a| {
            a.student_id == student_id && a.session == session && a.channel == channel
        })
    }

    /// Report double bookings, same-day repeats, trainees on the primary
    /// channel and asymmetric pair placements.
    pub fn violations(&self, roster: &Roster) -> Vec<Violation> {
        let mut violations = Vec::new();

        // Double booking: one staff member, one session+program, more than one
        // student unless the students are an active pair.
        let mut slots: FxHashMap<(&str, Session, &str), Vec<&str>> = FxHashMap::default();
        for a in &self.assignments {
            slots
                .entry((a.staff_id.as_str(), a.session, a.program.as_str()))
                .or_default()
                .push(a.student_id.as_str());
        }
        let mut slot_keys: Vec<_> = slots.keys().copied().collect();
        slot_keys.sort();
        for key in slot_keys {
            let students = &slots[&key];
            let (staff_id, session, program) = key;
            let allowed = match students.as_slice() {
                [_] => true,
                [a, b] => self.are_paired(roster, a, b, session),
                _ => false,
            };
            if !allowed {
                violations.push(Violation::DoubleBooked {
                    staff_id: staff_id.to_string(),
                    session,
                    program: program.to_string(),
                });
            }
        }

        let mut pairings: FxHashMap<(&str, &str), usize> = FxHashMap::default();
        for a in &self.assignments {
            *pairings
                .entry((a.staff_id.as_str(), a.student_id.as_str()))
                .or_default() += 1;
        }
        let mut repeated: Vec<_> = pairings
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key)
            .collect();
        repeated.sort();
        for (staff_id, student_id) in repeated {
            violations.push(Violation::RepeatedPairing {
                staff_id: staff_id.to_string(),
                student_id: student_id.to_string(),
            });
        }

        for a in self.assignments.iter().filter(|a| a.is_primary()) {
            let trainee = roster
                .student(&a.student_id)
                .is_some_and(|s| s.training_status(&a.staff_id).is_trainee());
            if trainee {
                violations.push(Violation::TraineeOnPrimary {
                    assignment_id: a.id,
                    staff_id: a.staff_id.clone(),
                    student_id: a.student_id.clone(),
                });
            }
        }

        for student in roster.students_by_id() {
            for session in Session::ALL {
                let Some(partner) = roster.active_partner(student, session, self.date) else {
                    continue;
                };
                if student.id > partner.id {
                    continue;
                }
                if self.placement_set(&student.id, session) != self.placement_set(&partner.id, session)
                {
                    violations.push(Violation::PairMismatch {
                        student_id: student.id.clone(),
                        partner_id: partner.id.clone(),
                        session,
                    });
                }
            }
        }

        violations
    }

    fn are_paired(&self, roster: &Roster, a: &str, b: &str, session: Session) -> bool {
        let Some(student) = roster.student(a) else {
            return false;
        };
        roster
            .active_partner(student, session, self.date)
            .is_some_and(|p| p.id == b)
    }

    /// Sorted (staff, channel) placements for a student in a session.
    fn placement_set(&self, student_id: &str, session: Session) -> Vec<(String, bool)> {
        let mut set: Vec<(String, bool)> = self
            .assignments
            .iter()
            .filter(|a| a.student_id == student_id && a.session == session)
            .map(|a| (a.staff_id.clone(), a.is_primary()))
            .collect();
        set.sort();
        set
    }
}
