//! Greedy initial assignment pass.

use crate::eligibility::Filter;
use crate::events::Phase;
use crate::models::{Channel, Gap, Origin, Ratio};
use crate::roster::Roster;
use crate::{log_changes, log_checks};

use super::run::Engine;

/// Result of one greedy pass.
#[derive(Clone, Debug, Default)]
pub struct GreedyOutcome {
    /// Placements made (a pair placement counts once)
    pub fills: usize,
    /// Slots left open for the optimizer
    pub gaps: Vec<Gap>,
}

/// Processing group: pairs first, then 2:1, then everything else.
fn group_rank(roster: &Roster, gap: &Gap) -> u8 {
    if gap.partner_id.is_some() {
        return 0;
    }
    match roster.student(&gap.student_id).map(|s| s.ratio(gap.session)) {
        Some(Ratio::TwoToOne) => 1,
        _ => 2,
    }
}

impl<'r> Engine<'r> {
    /// Fill open slots in one forward pass without touching existing
    /// assignments.
    ///
    /// Order is group, then student id, then AM before PM. Each position goes
    /// to the first eligible staff member in priority order.
    pub fn greedy_pass(&mut self) -> GreedyOutcome {
        let verbosity = self.config.verbosity;
        let roster = self.roster;

        let mut slots = self.gaps();
        slots.sort_by(|a, b| {
            group_rank(roster, a)
                .cmp(&group_rank(roster, b))
                .then_with(|| a.student_id.cmp(&b.student_id))
                .then_with(|| a.session.cmp(&b.session))
        });

        log_changes!(verbosity, "Greedy pass: {} open slots", slots.len());

        let mut fills = 0;
        for slot in &slots {
            let Some(unit) = self.gap_unit(slot) else {
                continue;
            };
            log_checks!(verbosity, "  Considering {}", slot);

            for _ in 0..slot.missing {
                match self.first_eligible(&unit, slot.session, &Filter::PRIMARY, None) {
                    Some(staff) => {
                        self.place_unit(
                            &staff.id,
                            &unit,
                            slot.session,
                            Channel::Primary,
                            Origin::Automatic,
                            Phase::Greedy,
                        );
                        fills += 1;
                    }
                    None => {
                        log_checks!(verbosity, "    No eligible staff for {}", slot);
                        break;
                    }
                }
            }
        }

        GreedyOutcome {
            fills,
            gaps: self.gaps(),
        }
    }
}
