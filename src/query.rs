//! Roster list filters for `students.list` and `classes.list`.

use crate::model::{Class, GradeLevel, Student, StudentStatus};
use std::cmp::Ordering;

/// Criteria for `students.list`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFilter {
    pub search: Option<String>,
    pub status: Option<StudentStatus>,
    pub grade: Option<GradeLevel>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassFilter {
    pub search: Option<String>,
    pub subject: Option<String>,
}

/// Lowercased search term, or `None` when the term is blank.
pub fn search_term(raw: &str) -> Option<String> {
    let t = raw.trim().to_lowercase();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

/// `"all"` and blank values mean no filter.
pub fn is_unfiltered(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty() || t.eq_ignore_ascii_case("all")
}

/// Status filter values. Only known statuses are accepted.
pub fn parse_status_filter(raw: &str) -> Option<StudentStatus> {
    match StudentStatus::parse(raw) {
        StudentStatus::Unknown => None,
        s => Some(s),
    }
}

fn contains(haystack: &str, term: &str) -> bool {
    haystack.to_lowercase().contains(term)
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        if let Some(term) = &self.search {
            let name = format!("{} {}", student.first_name, student.last_name);
            if !contains(&name, term) && !contains(&student.email, term) {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != student.status) {
            return false;
        }
        if self.grade.is_some() && self.grade != student.grade {
            return false;
        }
        true
    }
}

impl ClassFilter {
    pub fn matches(&self, class: &Class) -> bool {
        if let Some(term) = &self.search {
            if !contains(&class.name, term)
                && !contains(&class.subject, term)
                && !contains(&class.teacher, term)
            {
                return false;
            }
        }
        match &self.subject {
            Some(subject) => class.subject.trim().to_lowercase() == *subject,
            None => true,
        }
    }
}

fn by_display_name(a: &Student, b: &Student) -> Ordering {
    a.display_name()
        .to_lowercase()
        .cmp(&b.display_name().to_lowercase())
        .then_with(|| a.id.cmp(&b.id))
}

/// Matching students, ordered by full name.
pub fn filter_students(students: Vec<Student>, filter: &StudentFilter) -> Vec<Student> {
    let mut out: Vec<Student> = students.into_iter().filter(|s| filter.matches(s)).collect();
    out.sort_by(by_display_name);
    out
}

/// Matching classes in store order.
pub fn filter_classes(classes: Vec<Class>, filter: &ClassFilter) -> Vec<Class> {
    classes.into_iter().filter(|c| filter.matches(c)).collect()
}
