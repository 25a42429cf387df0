//! Raw store records to canonical entities.
//!
//! Records come back from the store with whatever field naming the writer
//! used: canonical camelCase, the backend's `*_c` custom-field names, or plain
//! snake_case. Each logical field is an alias group; lookups take the first
//! alias present with a non-null value. Nothing in here fails: missing
//! optional fields become empty/zero and a missing identity becomes `None`.

use crate::model::{
    AttendanceRecord, AttendanceStatus, Class, EntityId, EntityKind, Grade, GradeCategory,
    GradeLevel, GradeWeights, NumericField, ParentContact, Schedule, Student, StudentStatus,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

type Aliases = &'static [&'static str];

const ID: Aliases = &["Id", "id"];

const FIRST_NAME: Aliases = &["firstName", "first_name_c", "first_name"];
const LAST_NAME: Aliases = &["lastName", "last_name_c", "last_name"];
const EMAIL: Aliases = &["email", "email_c"];
const PHONE: Aliases = &["phone", "phone_c"];
const GRADE_LEVEL: Aliases = &["grade", "grade_c", "grade_level_c"];
const STATUS: Aliases = &["status", "status_c"];
const ENROLLMENT_DATE: Aliases = &["enrollmentDate", "enrollment_date_c", "enrollment_date"];
const PARENT_CONTACT: Aliases = &["parentContact", "parent_contact_c", "parent_contact"];
const PARENT_NAME: Aliases = &["parentName", "parent_name_c"];
const PARENT_PHONE: Aliases = &["parentPhone", "parent_phone_c"];
const PARENT_EMAIL: Aliases = &["parentEmail", "parent_email_c"];

const NAME: Aliases = &["name", "Name", "name_c"];
const SUBJECT: Aliases = &["subject", "subject_c"];
const TEACHER: Aliases = &["teacher", "teacher_c"];
const SCHEDULE: Aliases = &["schedule", "schedule_c"];
const SCHEDULE_DAYS: Aliases = &["scheduleDays", "schedule_days_c"];
const SCHEDULE_START: Aliases = &["startTime", "schedule_start_time_c", "start_time_c"];
const SCHEDULE_END: Aliases = &["endTime", "schedule_end_time_c", "end_time_c"];
const SCHEDULE_ROOM: Aliases = &["room", "schedule_room_c", "room_c"];
const GRADE_WEIGHTS: Aliases = &["gradeWeights", "grade_weights_c", "grade_weights"];
const WEIGHT_HOMEWORK: Aliases = &["homework", "homework_weight_c"];
const WEIGHT_QUIZZES: Aliases = &["quizzes", "quizzes_weight_c"];
const WEIGHT_EXAMS: Aliases = &["exams", "exams_weight_c"];
const WEIGHT_PROJECTS: Aliases = &["projects", "projects_weight_c"];
const ROSTER: Aliases = &["students", "students_c"];

pub const STUDENT_REF: Aliases = &["studentId", "student_id_c", "student_id"];
pub const CLASS_REF: Aliases = &["classId", "class_id_c", "class_id"];
const ASSIGNMENT: Aliases = &["assignment", "assignment_c"];
const SCORE: Aliases = &["score", "score_c"];
const MAX_SCORE: Aliases = &["maxScore", "max_score_c", "max_score"];
const CATEGORY: Aliases = &["category", "category_c"];
const DATE: Aliases = &["date", "date_c"];
const NOTES: Aliases = &["notes", "notes_c"];

const STUDENT_FIELDS: &[Aliases] = &[
    FIRST_NAME,
    LAST_NAME,
    EMAIL,
    PHONE,
    GRADE_LEVEL,
    STATUS,
    ENROLLMENT_DATE,
    PARENT_CONTACT,
    PARENT_NAME,
    PARENT_PHONE,
    PARENT_EMAIL,
];
const CLASS_FIELDS: &[Aliases] = &[
    NAME,
    SUBJECT,
    TEACHER,
    SCHEDULE,
    SCHEDULE_DAYS,
    SCHEDULE_START,
    SCHEDULE_END,
    SCHEDULE_ROOM,
    GRADE_WEIGHTS,
    WEIGHT_HOMEWORK,
    WEIGHT_QUIZZES,
    WEIGHT_EXAMS,
    WEIGHT_PROJECTS,
    ROSTER,
];
const GRADE_FIELDS: &[Aliases] = &[
    STUDENT_REF,
    CLASS_REF,
    ASSIGNMENT,
    SCORE,
    MAX_SCORE,
    CATEGORY,
    DATE,
];
const ATTENDANCE_FIELDS: &[Aliases] = &[STUDENT_REF, CLASS_REF, DATE, STATUS, NOTES];

fn field_groups(kind: EntityKind) -> &'static [Aliases] {
    match kind {
        EntityKind::Student => STUDENT_FIELDS,
        EntityKind::Class => CLASS_FIELDS,
        EntityKind::Grade => GRADE_FIELDS,
        EntityKind::Attendance => ATTENDANCE_FIELDS,
    }
}

/// Alias group for `key`, if the key names a known field of `kind`.
pub fn aliases_of(kind: EntityKind, key: &str) -> Option<Aliases> {
    field_groups(kind)
        .iter()
        .copied()
        .find(|group| group.contains(&key))
}

fn field<'a>(raw: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let obj = raw.as_object()?;
    names
        .iter()
        .filter_map(|n| obj.get(*n))
        .find(|v| !v.is_null())
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Lookup fields arrive as { Id, Name } objects.
        Value::Object(o) => o
            .get("Name")
            .or_else(|| o.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        _ => String::new(),
    }
}

fn text(raw: &Value, names: &[&str]) -> String {
    field(raw, names).map(text_of).unwrap_or_default()
}

fn number(raw: &Value, names: &[&str]) -> f64 {
    match numeric(raw, names) {
        NumericField::Value(v) => v,
        _ => 0.0,
    }
}

/// Unwraps a reference that may be a bare id, a numeric string, or an
/// embedded `{ "Id": .. }` object.
pub fn reference_id(v: &Value) -> Option<EntityId> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<EntityId>().ok(),
        Value::Object(o) => o.get("Id").or_else(|| o.get("id")).and_then(|inner| {
            // One level only; nested objects are not references.
            if inner.is_object() {
                None
            } else {
                reference_id(inner)
            }
        }),
        _ => None,
    }
}

pub fn reference_field(raw: &Value, names: &[&str]) -> Option<EntityId> {
    field(raw, names).and_then(reference_id)
}

pub fn record_id(raw: &Value) -> Option<EntityId> {
    field(raw, ID).and_then(|v| if v.is_object() { None } else { reference_id(v) })
}

pub fn numeric_value(v: &Value) -> NumericField {
    match v {
        Value::Null => NumericField::Missing,
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => NumericField::Value(f),
            _ => NumericField::Malformed(n.to_string()),
        },
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return NumericField::Missing;
            }
            match t.parse::<f64>() {
                Ok(f) if f.is_finite() => NumericField::Value(f),
                _ => NumericField::Malformed(t.to_string()),
            }
        }
        other => NumericField::Malformed(other.to_string()),
    }
}

fn numeric(raw: &Value, names: &[&str]) -> NumericField {
    field(raw, names)
        .map(numeric_value)
        .unwrap_or(NumericField::Missing)
}

/// Accepts RFC 3339, naive date-times (taken as UTC) and bare `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Like [`parse_date`], but a bare `YYYY-MM-DD` means the last instant of that day.
pub fn parse_date_end(s: &str) -> Option<DateTime<Utc>> {
    match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        Ok(d) => d
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .map(|naive| naive.and_utc()),
        Err(_) => parse_date(s),
    }
}

fn date(raw: &Value, names: &[&str]) -> Option<DateTime<Utc>> {
    field(raw, names).and_then(|v| v.as_str()).and_then(parse_date)
}

/// Embedded objects sometimes arrive JSON-encoded in a text field.
fn embedded_object(raw: &Value, names: &[&str]) -> Option<Value> {
    match field(raw, names)? {
        Value::Object(o) => Some(Value::Object(o.clone())),
        Value::String(s) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|v| v.is_object()),
        _ => None,
    }
}

fn string_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn id_list(v: &Value) -> Vec<EntityId> {
    match v {
        Value::Array(items) => items.iter().filter_map(reference_id).collect(),
        Value::String(s) => s
            .split(',')
            .filter_map(|p| p.trim().parse::<EntityId>().ok())
            .collect(),
        other => reference_id(other).into_iter().collect(),
    }
}

pub fn normalize_student(raw: &Value) -> Student {
    let contact = embedded_object(raw, PARENT_CONTACT);
    let contact_src = contact.as_ref().unwrap_or(raw);
    let parent_contact = if contact.is_some() {
        ParentContact {
            name: text(contact_src, &["name"]),
            phone: text(contact_src, &["phone"]),
            email: text(contact_src, &["email"]),
        }
    } else {
        ParentContact {
            name: text(raw, PARENT_NAME),
            phone: text(raw, PARENT_PHONE),
            email: text(raw, PARENT_EMAIL),
        }
    };

    let status = match field(raw, STATUS).map(text_of) {
        None => StudentStatus::Active,
        Some(s) if s.is_empty() => StudentStatus::Active,
        Some(s) => StudentStatus::parse(&s),
    };

    Student {
        id: record_id(raw),
        first_name: text(raw, FIRST_NAME),
        last_name: text(raw, LAST_NAME),
        email: text(raw, EMAIL),
        phone: text(raw, PHONE),
        grade: field(raw, GRADE_LEVEL)
            .map(text_of)
            .and_then(|s| GradeLevel::parse(&s)),
        status,
        enrollment_date: date(raw, ENROLLMENT_DATE),
        parent_contact,
    }
}

pub fn normalize_class(raw: &Value) -> Class {
    let schedule = match embedded_object(raw, SCHEDULE) {
        Some(obj) => Schedule {
            days: field(&obj, &["days"]).map(string_list).unwrap_or_default(),
            start_time: text(&obj, &["startTime", "start_time"]),
            end_time: text(&obj, &["endTime", "end_time"]),
            room: text(&obj, &["room"]),
        },
        None => Schedule {
            days: field(raw, SCHEDULE_DAYS)
                .map(string_list)
                .unwrap_or_default(),
            start_time: text(raw, SCHEDULE_START),
            end_time: text(raw, SCHEDULE_END),
            room: text(raw, SCHEDULE_ROOM),
        },
    };

    let weights_obj = embedded_object(raw, GRADE_WEIGHTS);
    let weights_src = weights_obj.as_ref().unwrap_or(raw);
    let grade_weights = GradeWeights {
        homework: number(weights_src, WEIGHT_HOMEWORK),
        quizzes: number(weights_src, WEIGHT_QUIZZES),
        exams: number(weights_src, WEIGHT_EXAMS),
        projects: number(weights_src, WEIGHT_PROJECTS),
    };

    Class {
        id: record_id(raw),
        name: text(raw, NAME),
        subject: text(raw, SUBJECT),
        teacher: text(raw, TEACHER),
        schedule,
        grade_weights,
        students: field(raw, ROSTER).map(id_list).unwrap_or_default(),
    }
}

pub fn normalize_grade(raw: &Value) -> Grade {
    Grade {
        id: record_id(raw),
        student_id: reference_field(raw, STUDENT_REF),
        class_id: reference_field(raw, CLASS_REF),
        assignment: text(raw, ASSIGNMENT),
        score: numeric(raw, SCORE),
        max_score: numeric(raw, MAX_SCORE),
        category: field(raw, CATEGORY)
            .map(text_of)
            .and_then(|s| GradeCategory::parse(&s))
            .unwrap_or(GradeCategory::Assignment),
        date: date(raw, DATE),
    }
}

pub fn normalize_attendance(raw: &Value) -> AttendanceRecord {
    AttendanceRecord {
        id: record_id(raw),
        student_id: reference_field(raw, STUDENT_REF),
        class_id: reference_field(raw, CLASS_REF),
        date: date(raw, DATE),
        status: field(raw, STATUS)
            .map(text_of)
            .and_then(|s| AttendanceStatus::parse(&s))
            .unwrap_or(AttendanceStatus::Present),
        notes: text(raw, NOTES),
    }
}

/// Normalizes and re-serializes, for handlers that return canonical JSON.
pub fn normalize_to_json(kind: EntityKind, raw: &Value) -> Value {
    let out = match kind {
        EntityKind::Student => serde_json::to_value(normalize_student(raw)),
        EntityKind::Class => serde_json::to_value(normalize_class(raw)),
        EntityKind::Grade => serde_json::to_value(normalize_grade(raw)),
        EntityKind::Attendance => serde_json::to_value(normalize_attendance(raw)),
    };
    out.unwrap_or(Value::Null)
}

/// True if any alias of the field group is set on the record.
pub fn has_field(raw: &Map<String, Value>, names: &[&str]) -> bool {
    names
        .iter()
        .any(|n| raw.get(*n).map(|v| !v.is_null()).unwrap_or(false))
}

/// Shallow merge of `patch` into `existing`. Setting a field drops every other
/// spelling of it so the patched value is the one normalization sees. The
/// identity field is never patched.
pub fn merge_patch(kind: EntityKind, existing: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (k, v) in patch {
        if ID.contains(&k.as_str()) {
            continue;
        }
        if let Some(group) = aliases_of(kind, k) {
            for alias in group {
                existing.remove(*alias);
            }
        }
        existing.insert(k.clone(), v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Canonical entity back to a store record (`id` becomes the store's `Id`).
    fn denormalize<T: serde::Serialize>(entity: &T) -> Value {
        let mut value = serde_json::to_value(entity).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            if let Some(id) = obj.remove("id") {
                if !id.is_null() {
                    obj.insert("Id".to_string(), id);
                }
            }
        }
        value
    }

    #[test]
    fn references_unwrap_every_shape() {
        assert_eq!(reference_id(&json!(7)), Some(7));
        assert_eq!(reference_id(&json!(7.0)), Some(7));
        assert_eq!(reference_id(&json!(" 12 ")), Some(12));
        assert_eq!(reference_id(&json!({ "Id": 4, "Name": "Ada" })), Some(4));
        assert_eq!(reference_id(&json!({ "id": "5" })), Some(5));
        assert_eq!(reference_id(&json!({ "Id": { "Id": 1 } })), None);
        assert_eq!(reference_id(&json!(7.5)), None);
        assert_eq!(reference_id(&json!("abc")), None);
        assert_eq!(reference_id(&json!(null)), None);
    }

    #[test]
    fn backend_student_fields_normalize() {
        let raw = json!({
            "Id": 3,
            "first_name_c": "Ada",
            "last_name_c": "Lovelace",
            "email_c": "ada@example.org",
            "grade_c": "11th",
            "status_c": "Active",
            "enrollment_date_c": "2024-09-03",
            "parent_contact_c": "{\"name\":\"Byron\",\"phone\":\"555\",\"email\":\"b@example.org\"}"
        });
        let s = normalize_student(&raw);
        assert_eq!(s.id, Some(3));
        assert_eq!(s.first_name, "Ada");
        assert_eq!(s.last_name, "Lovelace");
        assert_eq!(s.grade, Some(GradeLevel::Eleventh));
        assert_eq!(s.status, StudentStatus::Active);
        assert_eq!(s.parent_contact.name, "Byron");
        assert_eq!(
            s.enrollment_date.map(|d| d.date_naive().to_string()),
            Some("2024-09-03".to_string())
        );
        assert_eq!(s.phone, "");
    }

    #[test]
    fn missing_identity_is_none_and_optional_fields_default() {
        let s = normalize_student(&json!({ "firstName": "No", "lastName": "Id" }));
        assert_eq!(s.id, None);
        assert_eq!(s.email, "");
        assert_eq!(s.status, StudentStatus::Active);
        assert_eq!(s.parent_contact, ParentContact::default());

        let odd = normalize_student(&json!({ "Id": 1, "status": "Suspended" }));
        assert_eq!(odd.status, StudentStatus::Unknown);
    }

    #[test]
    fn grade_numeric_states() {
        let g = normalize_grade(&json!({
            "Id": 1,
            "student_id_c": { "Id": 2, "Name": "Ada Lovelace" },
            "class_id_c": "10",
            "score_c": "abc",
            "max_score_c": "50"
        }));
        assert_eq!(g.student_id, Some(2));
        assert_eq!(g.class_id, Some(10));
        assert_eq!(g.score, NumericField::Malformed("abc".into()));
        assert_eq!(g.max_score, NumericField::Value(50.0));
        assert_eq!(g.category, GradeCategory::Assignment);

        let empty = normalize_grade(&json!({ "Id": 2, "score": "" }));
        assert_eq!(empty.score, NumericField::Missing);
        assert_eq!(empty.max_score, NumericField::Missing);
    }

    #[test]
    fn class_schedule_and_roster_from_flat_fields() {
        let c = normalize_class(&json!({
            "Id": 10,
            "Name": "Algebra I",
            "subject_c": "Math",
            "schedule_days_c": "Monday,Wednesday, Friday",
            "schedule_room_c": "B12",
            "homework_weight_c": 30,
            "quizzes_weight_c": "20",
            "students_c": "1,2, x,3"
        }));
        assert_eq!(c.name, "Algebra I");
        assert_eq!(c.schedule.days, vec!["Monday", "Wednesday", "Friday"]);
        assert_eq!(c.schedule.room, "B12");
        assert_eq!(c.grade_weights.homework, 30.0);
        assert_eq!(c.grade_weights.quizzes, 20.0);
        assert_eq!(c.grade_weights.exams, 0.0);
        assert_eq!(c.students, vec![1, 2, 3]);
    }

    #[test]
    fn attendance_status_defaults_to_present() {
        let a = normalize_attendance(&json!({
            "Id": 4,
            "studentId": 1,
            "date": "2025-03-10T08:30:00.000Z",
            "status": "???"
        }));
        assert_eq!(a.status, AttendanceStatus::Present);
        assert!(a.date.is_some());
    }

    #[test]
    fn round_trip_preserves_identity_and_display_fields() {
        let raw = json!({
            "Id": 9,
            "first_name_c": "Grace",
            "last_name_c": "Hopper",
            "status_c": "Graduated"
        });
        let first = normalize_student(&raw);
        let again = normalize_student(&denormalize(&first));
        assert_eq!(again.id, Some(9));
        assert_eq!(again.display_name(), "Grace Hopper");
        assert_eq!(again.status, StudentStatus::Graduated);
        assert_eq!(again, first);
    }

    #[test]
    fn merge_patch_replaces_other_spellings() {
        let mut existing = json!({ "Id": 1, "first_name_c": "Old", "email": "x@y" })
            .as_object()
            .cloned()
            .unwrap_or_default();
        let patch = json!({ "firstName": "New", "Id": 99 })
            .as_object()
            .cloned()
            .unwrap_or_default();
        merge_patch(EntityKind::Student, &mut existing, &patch);
        let merged = Value::Object(existing);
        assert_eq!(merged["Id"], json!(1));
        assert!(merged.get("first_name_c").is_none());
        assert_eq!(normalize_student(&merged).first_name, "New");
        assert_eq!(merged["email"], json!("x@y"));
    }

    #[test]
    fn dates_accept_several_shapes() {
        assert!(parse_date("2025-01-06").is_some());
        assert!(parse_date("2025-01-06T09:15:00Z").is_some());
        assert!(parse_date("2025-01-06T09:15:00.123").is_some());
        assert!(parse_date("01/06/2025").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn date_end_stretches_bare_days_only() {
        let end = parse_date_end("2025-03-06").expect("bare day");
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 6).expect("day"));
        assert!(end > parse_date("2025-03-06T23:59:59Z").expect("timestamp"));
        assert!(end < parse_date("2025-03-07").expect("next day"));
        assert_eq!(
            parse_date_end("2025-03-06T12:00:00Z"),
            parse_date("2025-03-06T12:00:00Z")
        );
        assert!(parse_date_end("not a date").is_none());
    }
}
