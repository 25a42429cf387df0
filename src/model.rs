use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

pub type EntityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Class,
    Grade,
    Attendance,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Class => "classes",
            Self::Grade => "grades",
            Self::Attendance => "attendance",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Class => "class",
            Self::Grade => "grade",
            Self::Attendance => "attendance record",
        }
    }

    /// Grades and attendance rows carry student/class references the store indexes.
    pub fn has_relations(self) -> bool {
        matches!(self, Self::Grade | Self::Attendance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeLevel {
    #[serde(rename = "9th")]
    Ninth,
    #[serde(rename = "10th")]
    Tenth,
    #[serde(rename = "11th")]
    Eleventh,
    #[serde(rename = "12th")]
    Twelfth,
}

impl GradeLevel {
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim().to_ascii_lowercase();
        let digits = t.trim_end_matches("th").trim_start_matches("grade").trim();
        match digits {
            "9" => Some(Self::Ninth),
            "10" => Some(Self::Tenth),
            "11" => Some(Self::Eleventh),
            "12" => Some(Self::Twelfth),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
    Unknown,
}

impl StudentStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            "graduated" => Self::Graduated,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeCategory {
    Homework,
    Quiz,
    Exam,
    Project,
    Assignment,
}

impl GradeCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "homework" => Some(Self::Homework),
            "quiz" | "quizzes" => Some(Self::Quiz),
            "exam" | "exams" => Some(Self::Exam),
            "project" | "projects" => Some(Self::Project),
            "assignment" => Some(Self::Assignment),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homework => "Homework",
            Self::Quiz => "Quiz",
            Self::Exam => "Exam",
            Self::Project => "Project",
            Self::Assignment => "Assignment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Tardy,
    Excused,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "tardy" | "late" => Some(Self::Tardy),
            "excused" => Some(Self::Excused),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
            Self::Tardy => "Tardy",
            Self::Excused => "Excused",
        }
    }
}

/// A numeric field as it arrived from the store.
///
/// `Malformed` keeps the offending text so the aggregation pass can report it.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericField {
    Missing,
    Value(f64),
    Malformed(String),
}

impl Serialize for NumericField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Missing => serializer.serialize_none(),
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Malformed(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParentContact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub grade: Option<GradeLevel>,
    pub status: StudentStatus,
    pub enrollment_date: Option<DateTime<Utc>>,
    pub parent_contact: ParentContact,
}

impl Student {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            "Unknown".to_string()
        } else {
            name.to_string()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub days: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    pub room: String,
}

/// Category weights as entered on the class form. Not required to sum to 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradeWeights {
    pub homework: f64,
    pub quizzes: f64,
    pub exams: f64,
    pub projects: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: Option<EntityId>,
    pub name: String,
    pub subject: String,
    pub teacher: String,
    pub schedule: Schedule,
    pub grade_weights: GradeWeights,
    pub students: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: Option<EntityId>,
    pub student_id: Option<EntityId>,
    pub class_id: Option<EntityId>,
    pub assignment: String,
    pub score: NumericField,
    pub max_score: NumericField,
    pub category: GradeCategory,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Option<EntityId>,
    pub student_id: Option<EntityId>,
    pub class_id: Option<EntityId>,
    pub date: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub notes: String,
}

/// Matching helper: an absent id never matches anything, including another absent id.
pub fn same_id(a: Option<EntityId>, b: Option<EntityId>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}
