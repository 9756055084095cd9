//! Indexed staff and student rosters for one engine run.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

use crate::config::EngineConfig;
use crate::models::{Ratio, Session, Staff, Student};

/// Data-integrity problems found while loading a roster.
///
/// None of these abort loading; the offending record is ignored or
/// treated conservatively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RosterWarning {
    /// A second staff record with an id already seen (first wins).
    DuplicateStaff(String),
    /// A second student record with an id already seen (first wins).
    DuplicateStudent(String),
    /// Pairing reference to a student that is not on the roster.
    UnknownPartner { student_id: String, partner_id: String },
    /// Pairing that is not reciprocated; treated as unpaired.
    AsymmetricPairing { student_id: String, partner_id: String },
    /// A student paired with itself.
    SelfPairing(String),
    /// 1:2 ratio declared without a valid partner; staffed as 1:1.
    SharedRatioWithoutPartner(String),
}

impl fmt::Display for RosterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateStaff(id) => write!(f, "Duplicate staff id {} ignored", id),
            Self::DuplicateStudent(id) => write!(f, "Duplicate student id {} ignored", id),
            Self::UnknownPartner {
                student_id,
                partner_id,
            } => write!(
                f,
                "Student {} is paired with unknown student {}",
                student_id, partner_id
            ),
            Self::AsymmetricPairing {
                student_id,
                partner_id,
            } => write!(
                f,
                "Student {} names {} as partner but the pairing is not mutual",
                student_id, partner_id
            ),
            Self::SelfPairing(id) => write!(f, "Student {} is paired with itself", id),
            Self::SharedRatioWithoutPartner(id) => {
                write!(f, "Student {} has a 1:2 ratio but no valid partner", id)
            }
        }
    }
}

/// Staff and student rosters with the lookups the engine needs.
#[derive(Clone, Debug)]
pub struct Roster {
    staff: FxHashMap<String, Staff>,
    students: FxHashMap<String, Student>,
    /// Staff ids in candidate priority order: role rank, then id
    staff_order: Vec<String>,
    /// Student ids in ascending order
    student_order: Vec<String>,
    /// Validated mutual pairings, both directions present
    partners: FxHashMap<String, String>,
    /// Team extensions valid for this run only: student_id -> staff ids
    temporary_team: FxHashMap<String, FxHashSet<String>>,
    warnings: Vec<RosterWarning>,
}

impl Roster {
    /// Index rosters and validate pairings.
    pub fn new(staff: Vec<Staff>, students: Vec<Student>, config: &EngineConfig) -> Self {
        let mut warnings = Vec::new();

        let mut staff_map: FxHashMap<String, Staff> = FxHashMap::default();
        for member in staff {
            if staff_map.contains_key(&member.id) {
                warnings.push(RosterWarning::DuplicateStaff(member.id.clone()));
                continue;
            }
            staff_map.insert(member.id.clone(), member);
        }

        let mut student_map: FxHashMap<String, Student> = FxHashMap::default();
        for student in students {
            if student_map.contains_key(&student.id) {
                warnings.push(RosterWarning::DuplicateStudent(student.id.clone()));
                continue;
            }
            student_map.insert(student.id.clone(), student);
        }

        let mut staff_order: Vec<String> = staff_map.keys().cloned().collect();
        staff_order.sort_by(|a, b| {
            let rank_a = config.role_rank(&staff_map[a].role);
            let rank_b = config.role_rank(&staff_map[b].role);
            rank_a.cmp(&rank_b).then_with(|| a.cmp(b))
        });

        let mut student_order: Vec<String> = student_map.keys().cloned().collect();
        student_order.sort();

        let partners = validate_pairings(&student_map, &student_order, &mut warnings);

        Self {
            staff: staff_map,
            students: student_map,
            staff_order,
            student_order,
            partners,
            temporary_team: FxHashMap::default(),
            warnings,
        }
    }

    /// Extend team membership for this run only.
    ///
    /// Each item is `(student_id, staff_id)`.
    pub fn with_temporary_team<I>(mut self, additions: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (student_id, staff_id) in additions {
            self.temporary_team
                .entry(student_id)
                .or_default()
                .insert(staff_id);
        }
        self
    }

    #[inline]
    pub fn staff(&self, id: &str) -> Option<&Staff> {
        self.staff.get(id)
    }

    #[inline]
    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.get(id)
    }

    /// All staff in candidate priority order.
    pub fn staff_by_priority(&self) -> impl Iterator<Item = &Staff> {
        self.staff_order.iter().map(move |id| &self.staff[id])
    }

    /// All students in id order.
    pub fn students_by_id(&self) -> impl Iterator<Item = &Student> {
        self.student_order.iter().map(move |id| &self.students[id])
    }

    pub fn warnings(&self) -> &[RosterWarning] {
        &self.warnings
    }

    /// Whether `staff_id` is on the student's team, including temporary additions.
    pub fn on_team(&self, student: &Student, staff_id: &str) -> bool {
        student.team.contains(staff_id)
            || self
                .temporary_team
                .get(&student.id)
                .is_some_and(|extra| extra.contains(staff_id))
    }

    /// Team member ids in candidate priority order.
    ///
    /// Members missing from the staff roster come last, sorted by id.
    pub fn team_by_priority(&self, student: &Student) -> Vec<String> {
        let mut ordered: Vec<String> = self
            .staff_order
            .iter()
            .filter(|id| self.on_team(student, id))
            .cloned()
            .collect();

        let mut unknown: Vec<String> = student
            .team
            .iter()
            .chain(self.temporary_team.get(&student.id).into_iter().flatten())
            .filter(|id| !self.staff.contains_key(id.as_str()))
            .cloned()
            .collect();
        unknown.sort();
        unknown.dedup();
        ordered.extend(unknown);
        ordered
    }

    /// Validated mutual partner, regardless of session.
    pub fn partner_of(&self, student: &Student) -> Option<&Student> {
        self.partners
            .get(&student.id)
            .and_then(|id| self.students.get(id))
    }

    /// Partner sharing staff with `student` in `session` on `date`.
    ///
    /// A pairing is active only when both students run 1:2 for the session
    /// and both attend it.
    pub fn active_partner(
        &self,
        student: &Student,
        session: Session,
        date: NaiveDate,
    ) -> Option<&Student> {
        let partner = self.partner_of(student)?;
        let both_shared =
            student.ratio(session) == Ratio::OneToTwo && partner.ratio(session) == Ratio::OneToTwo;
        let both_present = [student, partner]
            .iter()
            .all(|s| s.attends_on(date) && s.available(session));
        (both_shared && both_present).then_some(partner)
    }

    /// Students placed together in `session`: the student, then its active
    /// partner if any.
    pub fn unit<'a>(
        &'a self,
        student: &'a Student,
        session: Session,
        date: NaiveDate,
    ) -> Vec<&'a Student> {
        let mut unit = vec![student];
        unit.extend(self.active_partner(student, session, date));
        unit
    }
}

/// Keep only mutual pairings, warning about everything else.
fn validate_pairings(
    students: &FxHashMap<String, Student>,
    order: &[String],
    warnings: &mut Vec<RosterWarning>,
) -> FxHashMap<String, String> {
    let mut partners = FxHashMap::default();

    for id in order {
        let student = &students[id];
        let Some(partner_id) = &student.paired_with else {
            if uses_shared_ratio(student) {
                warnings.push(RosterWarning::SharedRatioWithoutPartner(id.clone()));
            }
            continue;
        };

        if partner_id == id {
            warnings.push(RosterWarning::SelfPairing(id.clone()));
        } else if let Some(partner) = students.get(partner_id) {
            if partner.paired_with.as_deref() == Some(id.as_str()) {
                partners.insert(id.clone(), partner_id.clone());
                continue;
            }
            warnings.push(RosterWarning::AsymmetricPairing {
                student_id: id.clone(),
                partner_id: partner_id.clone(),
            });
        } else {
            warnings.push(RosterWarning::UnknownPartner {
                student_id: id.clone(),
                partner_id: partner_id.clone(),
            });
        }

        if uses_shared_ratio(student) {
            warnings.push(RosterWarning::SharedRatioWithoutPartner(id.clone()));
        }
    }

    partners
}

fn uses_shared_ratio(student: &Student) -> bool {
    Session::ALL
        .iter()
        .any(|s| student.ratio(*s) == Ratio::OneToTwo)
}
