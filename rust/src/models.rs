//! Core data types for the assignment engine.

use chrono::{Datelike, NaiveDate};
use pyo3::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;

// Note: We use std collections here for PyO3 interface compatibility

/// Assignment identifier, unique within one schedule.
pub type AssignmentId = u64;

/// One of the two daily time blocks.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Session {
    Am,
    Pm,
}

impl Session {
    /// Both sessions in processing order.
    pub const ALL: [Session; 2] = [Session::Am, Session::Pm];
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Am => write!(f, "AM"),
            Session::Pm => write!(f, "PM"),
        }
    }
}

/// Staffing density for one student in one session.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ratio {
    /// One staff member for one student.
    OneToOne,
    /// Two distinct staff members for one student.
    TwoToOne,
    /// One staff member shared by two paired students.
    OneToTwo,
}

impl Ratio {
    /// Number of primary placements a student needs under this ratio.
    pub fn staff_needed(self) -> usize {
        match self {
            Ratio::OneToOne | Ratio::OneToTwo => 1,
            Ratio::TwoToOne => 2,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::OneToOne => write!(f, "1:1"),
            Ratio::TwoToOne => write!(f, "2:1"),
            Ratio::OneToTwo => write!(f, "1:2"),
        }
    }
}

/// Training status of a staff member with respect to one student.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrainingStatus {
    Solo,
    Trainer,
    OverlapStaff,
    OverlapBcba,
}

impl TrainingStatus {
    /// Overlap statuses may only be placed on the trainee channel.
    pub fn is_trainee(self) -> bool {
        matches!(self, TrainingStatus::OverlapStaff | TrainingStatus::OverlapBcba)
    }
}

/// Which track an assignment belongs to.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Primary,
    Trainee,
}

/// How an assignment came to exist.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    Automatic,
    Manual,
}

/// Per-session unavailability flags.
///
/// Full-day is derived (both sessions set), so there is no separate flag that
/// could disagree with the per-session ones.
#[pyclass]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionFlags {
    #[pyo3(get, set)]
    pub am: bool,
    #[pyo3(get, set)]
    pub pm: bool,
}

impl SessionFlags {
    pub const NONE: SessionFlags = SessionFlags { am: false, pm: false };
    pub const FULL_DAY: SessionFlags = SessionFlags { am: true, pm: true };

    /// Flag for a single session only.
    pub fn only(session: Session) -> Self {
        match session {
            Session::Am => Self { am: true, pm: false },
            Session::Pm => Self { am: false, pm: true },
        }
    }

    #[inline]
    pub fn covers(&self, session: Session) -> bool {
        match session {
            Session::Am => self.am,
            Session::Pm => self.pm,
        }
    }
}

#[pymethods]
impl SessionFlags {
    #[new]
    #[pyo3(signature = (am=false, pm=false))]
    fn new(am: bool, pm: bool) -> Self {
        Self { am, pm }
    }

    /// Flags covering both sessions.
    #[staticmethod]
    fn full_day() -> Self {
        Self::FULL_DAY
    }

    #[getter]
    pub fn is_full_day(&self) -> bool {
        self.am && self.pm
    }

    fn __repr__(&self) -> String {
        format!("SessionFlags(am={}, pm={})", self.am, self.pm)
    }
}

/// A staff member who can be placed on students.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Staff {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub role: String,
    #[pyo3(get, set)]
    pub active: bool,
    /// Programs this staff member may serve
    #[pyo3(get, set)]
    pub programs: HashSet<String>,
    #[pyo3(get, set)]
    pub absence: SessionFlags,
    #[pyo3(get, set)]
    pub out_of_session: SessionFlags,
}

impl Staff {
    #[inline]
    pub fn supports(&self, program: &str) -> bool {
        self.programs.contains(program)
    }

    /// Whether the staff member is present for `session`.
    #[inline]
    pub fn available(&self, session: Session) -> bool {
        !self.absence.covers(session) && !self.out_of_session.covers(session)
    }
}

#[pymethods]
impl Staff {
    #[new]
    #[pyo3(signature = (
        id,
        name,
        role,
        programs,
        active=true,
        absence=None,
        out_of_session=None
    ))]
    fn new(
        id: String,
        name: String,
        role: String,
        programs: HashSet<String>,
        active: bool,
        absence: Option<SessionFlags>,
        out_of_session: Option<SessionFlags>,
    ) -> Self {
        Self {
            id,
            name,
            role,
            active,
            programs,
            absence: absence.unwrap_or_default(),
            out_of_session: out_of_session.unwrap_or_default(),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Staff(id={:?}, role={:?}, active={}, programs={})",
            self.id,
            self.role,
            self.active,
            self.programs.len()
        )
    }
}

/// A client receiving staff placements.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Student {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub program: String,
    #[pyo3(get, set)]
    pub ratio_am: Ratio,
    #[pyo3(get, set)]
    pub ratio_pm: Ratio,
    #[pyo3(get, set)]
    pub active: bool,
    /// Attendance pattern indexed Monday=0 .. Sunday=6
    #[pyo3(get, set)]
    pub attendance: [bool; 7],
    #[pyo3(get, set)]
    pub absence: SessionFlags,
    /// Staff ids eligible to serve this student
    #[pyo3(get, set)]
    pub team: HashSet<String>,
    /// Training status per staff id; team members without an entry are solo
    #[pyo3(get, set)]
    pub training: HashMap<String, TrainingStatus>,
    #[pyo3(get, set)]
    pub paired_with: Option<String>,
}

impl Student {
    pub fn ratio(&self, session: Session) -> Ratio {
        match session {
            Session::Am => self.ratio_am,
            Session::Pm => self.ratio_pm,
        }
    }

    /// Whether the day-of-week pattern includes `date`.
    pub fn attends_on(&self, date: NaiveDate) -> bool {
        self.active && self.attendance[date.weekday().num_days_from_monday() as usize]
    }

    #[inline]
    pub fn available(&self, session: Session) -> bool {
        !self.absence.covers(session)
    }

    pub fn training_status(&self, staff_id: &str) -> TrainingStatus {
        self.training
            .get(staff_id)
            .copied()
            .unwrap_or(TrainingStatus::Solo)
    }
}

#[pymethods]
impl Student {
    #[new]
    #[pyo3(signature = (
        id,
        name,
        program,
        team,
        ratio_am=Ratio::OneToOne,
        ratio_pm=Ratio::OneToOne,
        active=true,
        attendance=[true, true, true, true, true, false, false],
        absence=None,
        training=None,
        paired_with=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: String,
        name: String,
        program: String,
        team: HashSet<String>,
        ratio_am: Ratio,
        ratio_pm: Ratio,
        active: bool,
        attendance: [bool; 7],
        absence: Option<SessionFlags>,
        training: Option<HashMap<String, TrainingStatus>>,
        paired_with: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            program,
            ratio_am,
            ratio_pm,
            active,
            attendance,
            absence: absence.unwrap_or_default(),
            team,
            training: training.unwrap_or_default(),
            paired_with,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Student(id={:?}, program={:?}, ratio=({}, {}), team={})",
            self.id,
            self.program,
            self.ratio_am,
            self.ratio_pm,
            self.team.len()
        )
    }
}

/// A placement of one staff member on one student for one session.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    #[pyo3(get, set)]
    pub id: AssignmentId,
    #[pyo3(get, set)]
    pub staff_id: String,
    #[pyo3(get, set)]
    pub student_id: String,
    #[pyo3(get, set)]
    pub session: Session,
    #[pyo3(get, set)]
    pub program: String,
    #[pyo3(get, set)]
    pub locked: bool,
    #[pyo3(get, set)]
    pub origin: Origin,
    #[pyo3(get, set)]
    pub channel: Channel,
}

impl Assignment {
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.channel == Channel::Primary
    }

    /// Whether this is the same placement of the same staff member, ignoring id.
    pub fn mirrors(&self, other: &Assignment) -> bool {
        self.staff_id == other.staff_id
            && self.session == other.session
            && self.channel == other.channel
    }
}

#[pymethods]
impl Assignment {
    #[new]
    #[pyo3(signature = (
        id,
        staff_id,
        student_id,
        session,
        program,
        locked=false,
        origin=Origin::Manual,
        channel=Channel::Primary
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: AssignmentId,
        staff_id: String,
        student_id: String,
        session: Session,
        program: String,
        locked: bool,
        origin: Origin,
        channel: Channel,
    ) -> Self {
        Self {
            id,
            staff_id,
            student_id,
            session,
            program,
            locked,
            origin,
            channel,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Assignment(id={}, staff={:?}, student={:?}, session={}, locked={})",
            self.id, self.staff_id, self.student_id, self.session, self.locked
        )
    }
}

/// An open student/session/program slot.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gap {
    #[pyo3(get)]
    pub student_id: String,
    #[pyo3(get)]
    pub session: Session,
    #[pyo3(get)]
    pub program: String,
    /// Primary placements still missing for the ratio
    #[pyo3(get)]
    pub missing: usize,
    /// Partner sharing this slot under an active 1:2 pairing
    #[pyo3(get)]
    pub partner_id: Option<String>,
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.student_id, self.session, self.program)?;
        if let Some(partner) = &self.partner_id {
            write!(f, " paired with {}", partner)?;
        }
        if self.missing > 1 {
            write!(f, " missing {}", self.missing)?;
        }
        Ok(())
    }
}

#[pymethods]
impl Gap {
    fn __repr__(&self) -> String {
        format!(
            "Gap(student={:?}, session={}, program={:?}, missing={})",
            self.student_id, self.session, self.program, self.missing
        )
    }
}
