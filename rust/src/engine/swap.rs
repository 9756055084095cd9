//! Swap optimizer: iterative repair of remaining gaps.

use crate::eligibility::{check_unit, Filter};
use crate::events::{EngineEvent, Phase};
use crate::models::{AssignmentId, Channel, Gap, Origin, Student};
use crate::{log_changes, log_checks, log_debug};

use super::run::Engine;

/// Result of the optimizer loop.
#[derive(Clone, Debug, Default)]
pub struct OptimizerOutcome {
    pub iterations: usize,
    pub direct_fills: usize,
    pub swaps: usize,
    /// Stopped at the iteration cap while still making progress
    pub capped: bool,
    pub unresolved: Vec<Gap>,
}

/// A single-hop swap found by the search, not yet committed.
struct SwapPlan<'r> {
    /// Staff member moving onto the gap
    mover: String,
    /// Student (and partner) the mover leaves
    donor_unit: Vec<&'r Student>,
    /// Mover's placements on the donor unit
    vacated: Vec<AssignmentId>,
    /// Previously unassigned staff member taking the donor slot
    backfill: String,
}

impl<'r> Engine<'r> {
    /// Iterate direct fills and single-hop swaps until an iteration makes no
    /// progress or the configured cap is reached.
    ///
    /// Locked and trainee-channel assignments are never moved.
    pub fn optimize(&mut self) -> OptimizerOutcome {
        let verbosity = self.config.verbosity;
        let cap = self.config.max_iterations;
        let mut outcome = OptimizerOutcome::default();

        while outcome.iterations < cap {
            outcome.iterations += 1;
            let iteration = outcome.iterations;
            let gaps = self.gaps();
            log_debug!(
                verbosity,
                "Optimizer iteration {}: {} gaps",
                iteration,
                gaps.len()
            );
            if gaps.is_empty() {
                break;
            }

            let mut progress = false;
            for gap in &gaps {
                let Some(unit) = self.gap_unit(gap) else {
                    continue;
                };
                log_checks!(verbosity, "  Considering {}", gap);

                while self.missing(unit[0], gap.session) > 0 {
                    if self.direct_fill(gap, &unit) {
                        outcome.direct_fills += 1;
                    } else if self.single_hop_swap(gap, &unit, iteration) {
                        outcome.swaps += 1;
                    } else {
                        break;
                    }
                    progress = true;
                }
            }

            if !progress {
                break;
            }
            if outcome.iterations == cap && !self.gaps().is_empty() {
                outcome.capped = true;
                log_changes!(verbosity, "Optimizer reached iteration cap {}", cap);
                self.events.push(EngineEvent::IterationCapReached { cap });
            }
        }

        outcome.unresolved = self.gaps();
        outcome
    }

    /// Place any free eligible staff member directly on the gap.
    fn direct_fill(&mut self, gap: &Gap, unit: &[&'r Student]) -> bool {
        match self.first_eligible(unit, gap.session, &Filter::PRIMARY, None) {
            Some(staff) => {
                self.place_unit(
                    &staff.id,
                    unit,
                    gap.session,
                    Channel::Primary,
                    Origin::Automatic,
                    Phase::DirectFill,
                );
                true
            }
            None => false,
        }
    }

    /// Move a team member off another student onto the gap, backfilling the
    /// other student with a free staff member.
    fn single_hop_swap(&mut self, gap: &Gap, unit: &[&'r Student], iteration: usize) -> bool {
        let Some(plan) = self.find_swap(gap, unit) else {
            return false;
        };

        // Re-validate the lock state just before committing.
        let still_movable = plan.vacated.iter().all(|id| {
            self.schedule
                .get(*id)
                .is_some_and(|a| !a.locked && a.channel == Channel::Primary)
        });
        if !still_movable {
            log_checks!(
                self.config.verbosity,
                "    Swap of {} abandoned: placement no longer movable",
                plan.mover
            );
            return false;
        }

        for id in &plan.vacated {
            if let Some(removed) = self.schedule.remove(*id) {
                self.events.push(EngineEvent::Removed {
                    assignment_id: removed.id,
                    staff_id: removed.staff_id,
                    student_id: removed.student_id,
                    session: removed.session,
                });
            }
        }
        self.place_unit(
            &plan.mover,
            unit,
            gap.session,
            Channel::Primary,
            Origin::Automatic,
            Phase::Swap,
        );
        self.place_unit(
            &plan.backfill,
            &plan.donor_unit,
            gap.session,
            Channel::Primary,
            Origin::Automatic,
            Phase::Backfill,
        );

        let from_student = plan.donor_unit[0].id.clone();
        log_changes!(
            self.config.verbosity,
            "  Swap: {} moved from {} to {}, {} backfills",
            plan.mover,
            from_student,
            gap.student_id,
            plan.backfill
        );
        self.events.push(EngineEvent::Swapped {
            staff_id: plan.mover,
            from_student,
            to_student: gap.student_id.clone(),
            backfill_id: plan.backfill,
            session: gap.session,
            iteration,
        });
        true
    }

    /// Search the gap student's team for a movable member with a backfill.
    fn find_swap(&mut self, gap: &Gap, unit: &[&'r Student]) -> Option<SwapPlan<'r>> {
        let roster = self.roster;
        let date = self.schedule.date();

        for mover_id in roster.team_by_priority(unit[0]) {
            let Some(mover) = roster.staff(&mover_id) else {
                continue;
            };

            let held: Vec<_> = self
                .schedule
                .held_by(&mover_id, gap.session, &gap.program)
                .cloned()
                .collect();
            let Some(current) = held.first() else {
                continue;
            };
            if unit.iter().any(|s| s.id == current.student_id) {
                continue;
            }
            let Some(donor) = roster.student(&current.student_id) else {
                continue;
            };
            let donor_unit = roster.unit(donor, gap.session, date);

            // Moving must free the mover completely: every placement held in
            // this session+program belongs to the donor unit.
            if !held
                .iter()
                .all(|a| donor_unit.iter().any(|s| s.id == a.student_id))
            {
                continue;
            }
            if held.iter().any(|a| a.locked || a.channel != Channel::Primary) {
                log_checks!(
                    self.config.verbosity,
                    "    {} is locked on {}",
                    mover_id,
                    donor.id
                );
                continue;
            }

            let vacated: Vec<AssignmentId> = held.iter().map(|a| a.id).collect();
            let freed = Filter::PRIMARY.ignoring(&vacated);
            if let Err(reason) =
                check_unit(roster, &self.schedule, mover, unit, gap.session, &freed)
            {
                self.reject(mover, unit[0], gap.session, reason);
                continue;
            }

            let backfill =
                self.first_eligible(&donor_unit, gap.session, &freed, Some(mover_id.as_str()));
            if let Some(backfill) = backfill {
                return Some(SwapPlan {
                    mover: mover_id,
                    donor_unit,
                    vacated,
                    backfill: backfill.id.clone(),
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{Assignment, Ratio, Session, TrainingStatus};
    use crate::schedule::Schedule;
    use crate::testing::{absent, am_student, monday, pair, rbt, roster, with_training, PROGRAM};

    fn am(id: u64, staff: &str, student: &str, locked: bool) -> Assignment {
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

    fn staff_on(engine: &Engine<'_>, student_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = engine
            .schedule()
            .for_student(student_id, Session::Am, Channel::Primary)
            .map(|a| a.staff_id.clone())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_swap_moves_team_member_and_backfills() {
        let r = roster(
            vec![rbt("a"), absent(rbt("b")), rbt("d")],
            vec![am_student("g", &["a", "b"]), am_student("y", &["a", "d"])],
        );
        let schedule = Schedule::new(monday(), vec![am(1, "a", "y", false)]);
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let outcome = engine.optimize();

        assert_eq!(outcome.swaps, 1);
        assert_eq!(outcome.direct_fills, 0);
        assert!(outcome.unresolved.is_empty());
        assert_eq!(staff_on(&engine, "g"), vec!["a"]);
        assert_eq!(staff_on(&engine, "y"), vec!["d"]);
        assert!(engine.schedule().get(1).is_none());
    }

    #[test]
    fn test_locked_donor_is_never_moved() {
        let r = roster(
            vec![rbt("a"), rbt("d")],
            vec![am_student("g", &["a"]), am_student("y", &["a", "d"])],
        );
        let schedule = Schedule::new(monday(), vec![am(1, "a", "y", true)]);
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let outcome = engine.optimize();

        assert_eq!(outcome.swaps, 0);
        assert_eq!(outcome.unresolved.len(), 1);
        assert_eq!(engine.schedule().get(1).map(|a| a.student_id.as_str()), Some("y"));
    }

    #[test]
    fn test_mover_in_training_for_gap_is_rejected() {
        let g = with_training(am_student("g", &["a"]), "a", TrainingStatus::OverlapBcba);
        let r = roster(
            vec![rbt("a"), rbt("d")],
            vec![g, am_student("y", &["a", "d"])],
        );
        let schedule = Schedule::new(monday(), vec![am(1, "a", "y", false)]);
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let outcome = engine.optimize();

        assert_eq!(outcome.swaps, 0);
        assert_eq!(staff_on(&engine, "y"), vec!["a"]);
    }

    #[test]
    fn test_backfill_in_training_for_donor_is_rejected() {
        let y = with_training(am_student("y", &["a", "d"]), "d", TrainingStatus::OverlapStaff);
        let r = roster(vec![rbt("a"), rbt("d")], vec![am_student("g", &["a"]), y]);
        let schedule = Schedule::new(monday(), vec![am(1, "a", "y", false)]);
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let outcome = engine.optimize();

        assert_eq!(outcome.swaps, 0);
        assert_eq!(outcome.unresolved.len(), 1);
    }

    #[test]
    fn test_swap_moves_pair_placement_as_unit() {
        // a serves the pair y1/y2; moving a to g vacates both, d backfills both
        let (y1, y2) = pair(am_student("y1", &["a", "d"]), am_student("y2", &["a", "d"]));
        let r = roster(
            vec![rbt("a"), rbt("d")],
            vec![am_student("g", &["a"]), y1, y2],
        );
        let schedule = Schedule::new(
            monday(),
            vec![am(1, "a", "y1", false), am(2, "a", "y2", false)],
        );
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let outcome = engine.optimize();

        assert_eq!(outcome.swaps, 1);
        assert_eq!(staff_on(&engine, "g"), vec!["a"]);
        assert_eq!(staff_on(&engine, "y1"), vec!["d"]);
        assert_eq!(staff_on(&engine, "y2"), vec!["d"]);
        assert!(engine.schedule().violations(&r).is_empty());
    }

    #[test]
    fn test_two_to_one_gap_filled_by_swap() {
        let mut g = am_student("g", &["a", "b"]);
        g.ratio_am = Ratio::TwoToOne;
        let r = roster(
            vec![rbt("a"), rbt("b"), rbt("d")],
            vec![g, am_student("y", &["b", "d"])],
        );
        let schedule = Schedule::new(
            monday(),
            vec![am(1, "a", "g", false), am(2, "b", "y", false)],
        );
        let mut engine = Engine::new(&r, schedule, EngineConfig::default());
        let outcome = engine.optimize();

        assert_eq!(outcome.swaps, 1);
        assert_eq!(staff_on(&engine, "g"), vec!["a", "b"]);
        assert_eq!(staff_on(&engine, "y"), vec!["d"]);
    }

    #[test]
    fn test_cap_stops_optimizer() {
        // z has no team, so a gap is still open after the swap
        let r = roster(
            vec![rbt("a"), absent(rbt("b")), rbt("d")],
            vec![
                am_student("g", &["a", "b"]),
                am_student("y", &["a", "d"]),
                am_student("z", &[]),
            ],
        );
        let schedule = Schedule::new(monday(), vec![am(1, "a", "y", false)]);
        let config = EngineConfig {
            max_iterations: 1,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(&r, schedule, config);
        let outcome = engine.optimize();

        assert_eq!(outcome.iterations, 1);
        assert!(outcome.capped);
        assert!(engine
            .events()
            .contains(&EngineEvent::IterationCapReached { cap: 1 }));
    }

    #[test]
    fn test_cap_not_reported_when_last_iteration_closes_every_gap() {
        let r = roster(
            vec![rbt("a"), absent(rbt("b")), rbt("d")],
            vec![am_student("g", &["a", "b"]), am_student("y", &["a", "d"])],
        );
        let schedule = Schedule::new(monday(), vec![am(1, "a", "y", false)]);
        let config = EngineConfig {
            max_iterations: 1,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(&r, schedule, config);
        let outcome = engine.optimize();

        assert_eq!(outcome.swaps, 1);
        assert!(outcome.unresolved.is_empty());
        assert!(!outcome.capped);
        assert!(!engine
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::IterationCapReached { .. })));
    }

    #[test]
    fn test_zero_cap_runs_nothing() {
        let r = roster(vec![rbt("a")], vec![am_student("g", &["a"])]);
        let config = EngineConfig {
            max_iterations: 0,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(&r, Schedule::new(monday(), vec![]), config);
        let outcome = engine.optimize();

        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.direct_fills, 0);
        assert_eq!(outcome.unresolved.len(), 1);
    }
}
