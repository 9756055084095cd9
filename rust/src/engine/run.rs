//! Engine state, construction and the full run.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::diagnostics::{diagnose, GapDiagnostic};
use crate::eligibility::{check, check_unit, Filter, Ineligible};
use crate::events::{EngineEvent, Phase};
use crate::models::{Assignment, AssignmentId, Channel, Gap, Origin, Session, Staff, Student};
use crate::roster::Roster;
use crate::schedule::Schedule;
use crate::{log_changes, log_checks};

/// Errors from the manual channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Staff not found: {0}")]
    UnknownStaff(String),
    #[error("Student not found: {0}")]
    UnknownStudent(String),
    #[error("Assignment not found: {0}")]
    UnknownAssignment(AssignmentId),
    #[error("Staff {staff_id} cannot be placed on {student_id}: {reason}")]
    NotEligible {
        staff_id: String,
        student_id: String,
        reason: Ineligible,
    },
    #[error("Slot already filled: {student_id} {session}")]
    SlotFilled { student_id: String, session: Session },
}

/// Outcome of a full run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// Placements made by the greedy pass
    pub greedy_fills: usize,
    /// Placements made directly by the optimizer
    pub direct_fills: usize,
    /// Single-hop swaps committed
    pub swaps: usize,
    /// Optimizer iterations run
    pub iterations: usize,
    /// Whether the optimizer stopped at its cap while still progressing
    pub capped: bool,
    pub unresolved: Vec<Gap>,
    pub diagnostics: Vec<GapDiagnostic>,
    pub events: Vec<EngineEvent>,
}

impl RunSummary {
    /// Gap positions filled by this run; each swap fills one.
    pub fn gaps_filled(&self) -> usize {
        self.greedy_fills + self.direct_fills + self.swaps
    }
}

/// Engine holding exclusive access to one date's schedule.
pub struct Engine<'r> {
    pub(super) roster: &'r Roster,
    pub(super) schedule: Schedule,
    pub(super) config: EngineConfig,
    pub(super) events: Vec<EngineEvent>,
}

impl<'r> Engine<'r> {
    /// Take ownership of a schedule, setting aside stale records and
    /// restoring pair symmetry.
    pub fn new(roster: &'r Roster, mut schedule: Schedule, config: EngineConfig) -> Self {
        let mut events: Vec<EngineEvent> = roster
            .warnings()
            .iter()
            .cloned()
            .map(EngineEvent::Roster)
            .collect();

        for (assignment_id, reason) in schedule.set_aside_stale(roster) {
            log_changes!(
                config.verbosity,
                "Skipping assignment {}: {}",
                assignment_id,
                reason
            );
            events.push(EngineEvent::Skipped {
                assignment_id,
                reason,
            });
        }

        let mut engine = Self {
            roster,
            schedule,
            config,
            events,
        };
        engine.resync_pairs();
        engine
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn into_schedule(self) -> Schedule {
        self.schedule
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Drain events recorded so far.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Greedy pass, swap optimizer, then diagnostics for what is left.
    pub fn run(&mut self) -> RunSummary {
        let greedy = self.greedy_pass();
        let optimized = self.optimize();
        let diagnostics = self.diagnose(&optimized.unresolved);

        RunSummary {
            greedy_fills: greedy.fills,
            direct_fills: optimized.direct_fills,
            swaps: optimized.swaps,
            iterations: optimized.iterations,
            capped: optimized.capped,
            unresolved: optimized.unresolved,
            diagnostics,
            events: self.take_events(),
        }
    }

    /// Explain gaps against the current schedule.
    pub fn diagnose(&self, gaps: &[Gap]) -> Vec<GapDiagnostic> {
        diagnose(self.roster, &self.schedule, gaps)
    }

    /// Open primary slots, in student id then session order.
    ///
    /// A pair reports one gap, under the member with the smaller id.
    pub fn gaps(&self) -> Vec<Gap> {
        let date = self.schedule.date();
        let mut gaps = Vec::new();

        for student in self.roster.students_by_id() {
            if !student.attends_on(date) {
                continue;
            }
            for session in Session::ALL {
                if !student.available(session) {
                    continue;
                }
                let partner = self.roster.active_partner(student, session, date);
                if partner.is_some_and(|p| p.id < student.id) {
                    continue;
                }
                let missing = self.missing(student, session);
                if missing > 0 {
                    gaps.push(Gap {
                        student_id: student.id.clone(),
                        session,
                        program: student.program.clone(),
                        missing,
                        partner_id: partner.map(|p| p.id.clone()),
                    });
                }
            }
        }

        gaps
    }

    /// Primary placements a student still needs in a session.
    pub(super) fn missing(&self, student: &Student, session: Session) -> usize {
        let have = self
            .schedule
            .for_student(&student.id, session, Channel::Primary)
            .count();
        student.ratio(session).staff_needed().saturating_sub(have)
    }

    /// Students placed together for a gap.
    pub(super) fn gap_unit(&self, gap: &Gap) -> Option<Vec<&'r Student>> {
        let student = self.roster.student(&gap.student_id)?;
        Some(self.roster.unit(student, gap.session, self.schedule.date()))
    }

    /// First staff member, in priority order, eligible for the whole unit.
    pub(super) fn first_eligible(
        &mut self,
        unit: &[&'r Student],
        session: Session,
        filter: &Filter<'_>,
        exclude: Option<&str>,
    ) -> Option<&'r Staff> {
        let roster = self.roster;
        for staff in roster.staff_by_priority() {
            if exclude == Some(staff.id.as_str()) {
                continue;
            }
            match check_unit(roster, &self.schedule, staff, unit, session, filter) {
                Ok(()) => return Some(staff),
                Err(reason) => self.reject(staff, unit[0], session, reason),
            }
        }
        None
    }

    /// Place one staff member on every student of a unit.
    pub(super) fn place_unit(
        &mut self,
        staff_id: &str,
        unit: &[&Student],
        session: Session,
        channel: Channel,
        origin: Origin,
        phase: Phase,
    ) -> Vec<AssignmentId> {
        let mut ids = Vec::with_capacity(unit.len());
        for student in unit {
            let id = self.schedule.place(
                staff_id,
                &student.id,
                session,
                &student.program,
                channel,
                origin,
            );
            log_changes!(
                self.config.verbosity,
                "  {}: placed {} on {} {}",
                phase,
                staff_id,
                student.id,
                session
            );
            self.events.push(EngineEvent::Placed {
                assignment_id: id,
                staff_id: staff_id.to_string(),
                student_id: student.id.clone(),
                session,
                phase,
            });
            ids.push(id);
        }
        ids
    }

    pub(super) fn reject(
        &mut self,
        staff: &Staff,
        student: &Student,
        session: Session,
        reason: Ineligible,
    ) {
        if !self.config.trace_eligibility {
            return;
        }
        log_checks!(
            self.config.verbosity,
            "    Rejected {} for {} {}: {}",
            staff.id,
            student.id,
            session,
            reason
        );
        self.events.push(EngineEvent::Rejected {
            staff_id: staff.id.clone(),
            student_id: student.id.clone(),
            session,
            reason,
        });
    }

    /// Copy any assignment one pair member has and the other lacks.
    ///
    /// A mirror must pass the filter for the partner. When it does not, an
    /// unlocked source is removed so the pair stays symmetric; a locked one
    /// is kept and reported.
    fn resync_pairs(&mut self) {
        let roster = self.roster;
        let date = self.schedule.date();

        for student in roster.students_by_id() {
            for session in Session::ALL {
                let Some(partner) = roster.active_partner(student, session, date) else {
                    continue;
                };
                if student.id > partner.id {
                    continue;
                }
                for (from, to) in [(student, partner), (partner, student)] {
                    let sources: Vec<_> = self
                        .schedule
                        .assignments()
                        .iter()
                        .filter(|a| a.student_id == from.id && a.session == session)
                        .cloned()
                        .collect();
                    for source in sources {
                        let mirrored = self
                            .schedule
                            .assignments()
                            .iter()
                            .any(|a| a.student_id == to.id && a.mirrors(&source));
                        if mirrored {
                            continue;
                        }
                        let Some(staff) = roster.staff(&source.staff_id) else {
                            continue;
                        };

                        let ignore = [source.id];
                        let filter = Filter {
                            channel: source.channel,
                            team_override: true,
                            partner: Some(from.id.as_str()),
                            ignore: &ignore,
                        };
                        let verdict =
                            check(roster, &self.schedule, staff, to, session, &to.program, &filter);
                        if let Err(reason) = verdict {
                            self.drop_unmirrorable(&source, &to.id, reason);
                            continue;
                        }

                        let ids = self.place_unit(
                            &source.staff_id,
                            &[to],
                            session,
                            source.channel,
                            source.origin,
                            Phase::PairSync,
                        );
                        if source.locked {
                            for id in ids {
                                self.schedule.set_locked(id, true);
                            }
                        }
                    }
                }
            }
        }
    }

    fn drop_unmirrorable(&mut self, source: &Assignment, partner_id: &str, reason: Ineligible) {
        log_changes!(
            self.config.verbosity,
            "Assignment {} cannot be mirrored onto {}: {}",
            source.id,
            partner_id,
            reason
        );
        self.events.push(EngineEvent::MirrorRejected {
            assignment_id: source.id,
            partner_id: partner_id.to_string(),
            reason,
            kept: source.locked,
        });
        if source.locked {
            return;
        }
        if let Some(removed) = self.schedule.remove(source.id) {
            self.events.push(EngineEvent::Removed {
                assignment_id: removed.id,
                staff_id: removed.staff_id,
                student_id: removed.student_id,
                session: removed.session,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Finding;
    use crate::models::{Ratio, TrainingStatus};
    use crate::schedule::{SkipReason, Violation};
    use crate::testing::{
        absent, am_student, monday, pair, rbt, roster, staff, student, with_training, PROGRAM,
    };

    fn assignment(id: AssignmentId, staff: &str, student: &str, locked: bool) -> Assignment {
        Assignment {
            id,
            staff_id: staff.to_string(),
            student_id: student.to_string(),
            session: Session::Am,
            program: PROGRAM.to_string(),
            locked,
            origin: Origin::Manual,
            channel: Channel::Primary,
        }
    }

    #[test]
    fn test_gaps_follow_ratio_and_attendance() {
        let mut two = am_student("s2", &["a", "b"]);
        two.ratio_am = Ratio::TwoToOne;
        let mut away = student("s3", &["a"]);
        away.attendance = [false; 7];
        let r = roster(vec![rbt("a"), rbt("b")], vec![am_student("s1", &["a"]), two, away]);
        let schedule = Schedule::new(monday(), vec![assignment(1, "a", "s2", false)]);
        let engine = Engine::new(&r, schedule, EngineConfig::default());

        let gaps = engine.gaps();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].student_id, "s1");
        assert_eq!(gaps[0].missing, 1);
        assert_eq!(gaps[1].student_id, "s2");
        assert_eq!(gaps[1].missing, 1);
    }

    #[test]
    fn test_pair_reports_one_gap_under_lead() {
        let (s1, s2) = pair(am_student("s1", &["a"]), am_student("s2", &["a"]));
        let r = roster(vec![rbt("a")], vec![s2, s1]);
        let engine = Engine::new(&r, Schedule::new(monday(), vec![]), EngineConfig::default());

        let gaps = engine.gaps();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].student_id, "s1");
        assert_eq!(gaps[0].partner_id.as_deref(), Some("s2"));
    }

    #[test]
    fn test_stale_records_reported_and_carried_through() {
        let r = roster(vec![rbt("a")], vec![am_student("s1", &["a"])]);
        let schedule = Schedule::new(
            monday(),
            vec![
                assignment(1, "a", "s1", true),
                assignment(2, "gone", "s1", false),
            ],
        );
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());

        assert!(engine.events().contains(&EngineEvent::Skipped {
            assignment_id: 2,
            reason: SkipReason::UnknownStaff,
        }));
        let summary = engine.run();
        assert!(summary.unresolved.is_empty());
        let all = engine.into_schedule().into_assignments();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|a| a.id == 2));
    }

    #[test]
    fn test_asymmetric_pair_input_is_resynced() {
        let (s1, s2) = pair(am_student("s1", &["a"]), am_student("s2", &["a"]));
        let r = roster(vec![rbt("a")], vec![s1, s2]);
        let schedule = Schedule::new(monday(), vec![assignment(1, "a", "s1", true)]);
        let engine = Engine::new(&r, schedule, EngineConfig::default());

        let mirror: Vec<_> = engine
            .schedule()
            .for_student("s2", Session::Am, Channel::Primary)
            .collect();
        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror[0].staff_id, "a");
        assert!(mirror[0].locked);
        assert!(engine.schedule().violations(&r).is_empty());
        assert!(engine.gaps().is_empty());
    }

    #[test]
    fn test_resync_drops_source_when_partner_is_trainee() {
        let (s1, s2) = pair(am_student("s1", &["a"]), am_student("s2", &["a"]));
        let s2 = with_training(s2, "a", TrainingStatus::OverlapStaff);
        let r = roster(vec![rbt("a")], vec![s1, s2]);
        let schedule = Schedule::new(monday(), vec![assignment(1, "a", "s1", false)]);
        let engine = Engine::new(&r, schedule, EngineConfig::default());

        assert!(engine.schedule().assignments().is_empty());
        assert!(engine.schedule().violations(&r).is_empty());
        assert!(engine.events().contains(&EngineEvent::MirrorRejected {
            assignment_id: 1,
            partner_id: "s2".to_string(),
            reason: Ineligible::TrainingOnly,
            kept: false,
        }));
    }

    #[test]
    fn test_resync_keeps_locked_source_it_cannot_mirror() {
        let (s1, s2) = pair(am_student("s1", &["a"]), am_student("s2", &["a"]));
        let s2 = with_training(s2, "a", TrainingStatus::OverlapBcba);
        let r = roster(vec![rbt("a")], vec![s1, s2]);
        let schedule = Schedule::new(monday(), vec![assignment(1, "a", "s1", true)]);
        let engine = Engine::new(&r, schedule, EngineConfig::default());

        assert_eq!(engine.schedule().assignments().len(), 1);
        assert_eq!(
            engine.schedule().violations(&r),
            vec![Violation::PairMismatch {
                student_id: "s1".to_string(),
                partner_id: "s2".to_string(),
                session: Session::Am,
            }]
        );
        assert!(engine.events().iter().any(|e| matches!(
            e,
            EngineEvent::MirrorRejected { kept: true, .. }
        )));
    }

    #[test]
    fn test_resync_avoids_same_day_repeat() {
        // Paired in AM only; a already works s2 in PM
        let (mut s1, mut s2) = pair(student("s1", &["a"]), student("s2", &["a"]));
        s1.ratio_pm = Ratio::OneToOne;
        s2.ratio_pm = Ratio::OneToOne;
        let r = roster(vec![rbt("a")], vec![s1, s2]);
        let mut afternoon = assignment(2, "a", "s2", false);
        afternoon.session = Session::Pm;
        let schedule = Schedule::new(monday(), vec![assignment(1, "a", "s1", false), afternoon]);
        let engine = Engine::new(&r, schedule, EngineConfig::default());

        assert!(engine.schedule().get(1).is_none());
        assert!(engine.schedule().get(2).is_some());
        assert!(engine.schedule().violations(&r).is_empty());
        assert!(engine.events().iter().any(|e| matches!(
            e,
            EngineEvent::MirrorRejected {
                reason: Ineligible::AlreadyWorkedToday,
                ..
            }
        )));
    }

    #[test]
    fn test_run_after_maximum_input_id() {
        let r = roster(
            vec![rbt("a"), rbt("b")],
            vec![am_student("s1", &["a"]), am_student("s2", &["b"])],
        );
        let schedule = Schedule::new(
            monday(),
            vec![assignment(AssignmentId::MAX, "a", "s1", false)],
        );
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let summary = engine.run();

        assert_eq!(summary.greedy_fills, 1);
        let ids: Vec<AssignmentId> = engine.schedule().assignments().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![AssignmentId::MAX, 1]);
    }

    #[test]
    fn test_roster_warnings_become_events() {
        let mut s1 = am_student("s1", &[]);
        s1.paired_with = Some("missing".to_string());
        let r = roster(vec![], vec![s1]);
        let engine = Engine::new(&r, Schedule::new(monday(), vec![]), EngineConfig::default());
        assert!(matches!(engine.events()[0], EngineEvent::Roster(_)));
    }

    /// G is short a team member; A works Y, whose team also has free D.
    fn swap_scenario(locked: bool) -> (Roster, Schedule) {
        let r = roster(
            vec![rbt("a"), absent(rbt("b")), absent(rbt("c")), rbt("d")],
            vec![am_student("g", &["a", "b", "c"]), am_student("y", &["a", "d"])],
        );
        let schedule = Schedule::new(monday(), vec![assignment(1, "a", "y", locked)]);
        (r, schedule)
    }

    /// Several students competing for overlapping teams, with a pair, a 2:1
    /// student and a trainee.
    fn busy_roster() -> Roster {
        let (p1, p2) = pair(student("p1", &["b", "c", "d"]), student("p2", &["c", "d"]));
        let mut two = student("t1", &["a", "c", "d", "e"]);
        two.ratio_am = Ratio::TwoToOne;
        let shadowed = with_training(student("s2", &["a", "m"]), "m", TrainingStatus::OverlapStaff);
        roster(
            vec![
                rbt("a"),
                rbt("b"),
                rbt("c"),
                rbt("d"),
                staff("e", "BCBA"),
                rbt("m"),
            ],
            vec![student("s1", &["a", "b", "c"]), shadowed, p1, p2, two],
        )
    }

    #[test]
    fn test_run_swaps_unlocked_team_member() {
        let (r, schedule) = swap_scenario(false);
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let summary = engine.run();

        assert_eq!(summary.greedy_fills, 0);
        assert_eq!(summary.swaps, 1);
        assert_eq!(summary.gaps_filled(), 1);
        assert!(summary.unresolved.is_empty());
        assert!(summary.diagnostics.is_empty());
        assert!(summary.events.iter().any(|e| matches!(
            e,
            EngineEvent::Swapped { staff_id, backfill_id, .. } if staff_id == "a" && backfill_id == "d"
        )));

        let g: Vec<_> = engine.schedule().for_student("g", Session::Am, Channel::Primary).collect();
        let y: Vec<_> = engine.schedule().for_student("y", Session::Am, Channel::Primary).collect();
        assert_eq!(g[0].staff_id, "a");
        assert_eq!(y[0].staff_id, "d");
    }

    #[test]
    fn test_run_reports_lock_as_blocker() {
        let (r, schedule) = swap_scenario(true);
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let summary = engine.run();

        assert_eq!(summary.swaps, 0);
        assert_eq!(summary.unresolved.len(), 1);
        assert_eq!(summary.diagnostics.len(), 1);

        let report = &summary.diagnostics[0];
        assert_eq!(report.gap.student_id, "g");
        assert_eq!(
            report.members[0].finding,
            Finding::Locked {
                assignment_id: 1,
                student_id: "y".to_string(),
            }
        );
        assert_eq!(
            report.members[1].finding,
            Finding::Free {
                reason: Ineligible::StaffUnavailable,
            }
        );
        assert!(report.to_string().contains("a: locked on y"));
        assert_eq!(engine.schedule().get(1).map(|a| a.locked), Some(true));
    }

    #[test]
    fn test_training_only_staff_never_placed() {
        let s1 = with_training(student("s1", &["m"]), "m", TrainingStatus::OverlapStaff);
        let s2 = with_training(student("s2", &["m"]), "m", TrainingStatus::OverlapBcba);
        let r = roster(vec![rbt("m")], vec![s1, s2]);
        let mut engine = Engine::new(&r, Schedule::new(monday(), vec![]), EngineConfig::default());

        assert!(matches!(
            engine.check_eligibility("m", "s1", Session::Pm, Channel::Primary, true),
            Err(EngineError::NotEligible {
                reason: Ineligible::TrainingOnly,
                ..
            })
        ));
        let summary = engine.run();
        assert_eq!(summary.gaps_filled(), 0);
        assert_eq!(summary.unresolved.len(), 4);
        assert!(engine.schedule().assignments().is_empty());
    }

    #[test]
    fn test_pair_members_share_placement_after_run() {
        let (s1, s2) = pair(am_student("s1", &["a"]), am_student("s2", &["a"]));
        let r = roster(vec![rbt("a")], vec![s1, s2]);
        let mut engine = Engine::new(&r, Schedule::new(monday(), vec![]), EngineConfig::default());
        engine.run();

        let first: Vec<_> = engine.schedule().for_student("s1", Session::Am, Channel::Primary).collect();
        let second: Vec<_> = engine.schedule().for_student("s2", Session::Am, Channel::Primary).collect();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(first[0].mirrors(second[0]));
    }

    #[test]
    fn test_run_keeps_hard_constraints() {
        let r = busy_roster();
        let mut engine = Engine::new(&r, Schedule::new(monday(), vec![]), EngineConfig::default());
        let summary = engine.run();

        assert!(summary.gaps_filled() > 0);
        assert!(summary.iterations <= EngineConfig::default().max_iterations);
        assert!(engine.schedule().violations(&r).is_empty());
        assert!(engine.schedule().assignments().iter().all(|a| a.staff_id != "m"));
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let r = busy_roster();
        let mut first = Engine::new(&r, Schedule::new(monday(), vec![]), EngineConfig::default());
        first.run();
        let after_first = first.into_schedule().into_assignments();

        let mut second = Engine::new(
            &r,
            Schedule::new(monday(), after_first.clone()),
            EngineConfig::default(),
        );
        let summary = second.run();
        assert_eq!(summary.gaps_filled(), 0);
        assert_eq!(summary.swaps, 0);
        assert_eq!(second.into_schedule().into_assignments(), after_first);
    }

    #[test]
    fn test_locked_assignments_survive_run() {
        let r = busy_roster();
        let locked = vec![
            assignment(1, "a", "s1", true),
            assignment(2, "c", "t1", true),
        ];
        let mut engine = Engine::new(
            &r,
            Schedule::new(monday(), locked.clone()),
            EngineConfig::default(),
        );
        engine.run();

        for before in &locked {
            assert_eq!(engine.schedule().get(before.id), Some(before));
        }
        assert!(engine.schedule().violations(&r).is_empty());
    }
}
