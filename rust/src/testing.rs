//! Shared fixtures for unit tests.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::models::{Ratio, SessionFlags, Staff, Student, TrainingStatus};
use crate::roster::Roster;

pub const PROGRAM: &str = "Primary";

/// A Monday, so the default attendance pattern applies.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

pub fn staff(id: &str, role: &str) -> Staff {
    Staff {
        id: id.to_string(),
        name: id.to_uppercase(),
        role: role.to_string(),
        active: true,
        programs: HashSet::from([PROGRAM.to_string()]),
        absence: SessionFlags::NONE,
        out_of_session: SessionFlags::NONE,
    }
}

pub fn rbt(id: &str) -> Staff {
    staff(id, "RBT")
}

pub fn absent(mut member: Staff) -> Staff {
    member.absence = SessionFlags::FULL_DAY;
    member
}

pub fn student(id: &str, team: &[&str]) -> Student {
    Student {
        id: id.to_string(),
        name: id.to_uppercase(),
        program: PROGRAM.to_string(),
        ratio_am: Ratio::OneToOne,
        ratio_pm: Ratio::OneToOne,
        active: true,
        attendance: [true; 7],
        absence: SessionFlags::NONE,
        team: team.iter().map(|s| s.to_string()).collect(),
        training: HashMap::new(),
        paired_with: None,
    }
}

/// Student that only needs the AM session staffed.
pub fn am_student(id: &str, team: &[&str]) -> Student {
    let mut s = student(id, team);
    s.absence = SessionFlags::only(crate::models::Session::Pm);
    s
}

pub fn with_training(mut s: Student, staff_id: &str, status: TrainingStatus) -> Student {
    s.training.insert(staff_id.to_string(), status);
    s
}

/// Two students paired 1:2 in both sessions.
pub fn pair(a: Student, b: Student) -> (Student, Student) {
    let (mut a, mut b) = (a, b);
    for s in [&mut a, &mut b] {
        s.ratio_am = Ratio::OneToTwo;
        s.ratio_pm = Ratio::OneToTwo;
    }
    a.paired_with = Some(b.id.clone());
    b.paired_with = Some(a.id.clone());
    (a, b)
}

pub fn roster(staff: Vec<Staff>, students: Vec<Student>) -> Roster {
    Roster::new(staff, students, &EngineConfig::default())
}
