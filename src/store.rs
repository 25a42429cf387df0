//! Record store: raw JSON records per entity kind, persisted in the workspace database.
//!
//! Records are stored as the JSON the caller wrote, with whatever field
//! spelling it used. Grades and attendance also keep their student/class
//! references (and attendance its calendar day) in indexed columns so the
//! by-relation lookups don't scan every record.

use crate::error::CoreError;
use crate::model::{
    same_id, AttendanceRecord, AttendanceStatus, Class, EntityId, EntityKind, Grade,
    GradeCategory, NumericField, Student,
};
use crate::normalize::{self, CLASS_REF, STUDENT_REF};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Map, Value};

pub trait RecordStore {
    fn get_all(&self, kind: EntityKind) -> anyhow::Result<Vec<Value>>;
    fn get_by_id(&self, kind: EntityKind, id: EntityId) -> anyhow::Result<Option<Value>>;
    /// Empty for kinds that carry no student reference.
    fn get_by_student_id(&self, kind: EntityKind, student_id: EntityId)
        -> anyhow::Result<Vec<Value>>;
    fn get_by_class_id(&self, kind: EntityKind, class_id: EntityId) -> anyhow::Result<Vec<Value>>;
    /// Attendance records dated on `day`.
    fn get_by_date(&self, day: NaiveDate) -> anyhow::Result<Vec<Value>>;
    fn create(&self, kind: EntityKind, fields: &Map<String, Value>)
        -> anyhow::Result<Option<Value>>;
    fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: &Map<String, Value>,
    ) -> anyhow::Result<Option<Value>>;
    fn delete(&self, kind: EntityKind, id: EntityId) -> anyhow::Result<bool>;
}

/// Values filled in on create when the caller leaves the field out.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDefaults {
    pub max_score: f64,
    pub grade_category: GradeCategory,
    pub attendance_status: AttendanceStatus,
}

impl Default for CreateDefaults {
    fn default() -> Self {
        Self {
            max_score: 100.0,
            grade_category: GradeCategory::Assignment,
            attendance_status: AttendanceStatus::Present,
        }
    }
}

fn set_default(kind: EntityKind, record: &mut Map<String, Value>, key: &str, value: Value) {
    let present = normalize::aliases_of(kind, key)
        .map(|group| normalize::has_field(record, group))
        .unwrap_or_else(|| record.contains_key(key));
    if !present {
        record.insert(key.to_string(), value);
    }
}

pub fn apply_create_defaults(
    kind: EntityKind,
    record: &mut Map<String, Value>,
    now: DateTime<Utc>,
    defaults: &CreateDefaults,
) {
    let stamp = Value::String(now.to_rfc3339());
    match kind {
        EntityKind::Student => {
            set_default(kind, record, "enrollmentDate", stamp);
            set_default(
                kind,
                record,
                "parentContact",
                json!({ "name": "", "phone": "", "email": "" }),
            );
        }
        EntityKind::Class => {}
        EntityKind::Grade => {
            set_default(kind, record, "date", stamp);
            set_default(
                kind,
                record,
                "category",
                Value::String(defaults.grade_category.as_str().to_string()),
            );
            // A zero maxScore is treated as not given.
            let zero_max = normalize::normalize_grade(&Value::Object(record.clone())).max_score
                == NumericField::Value(0.0);
            if zero_max {
                if let Some(group) = normalize::aliases_of(kind, "maxScore") {
                    for alias in group {
                        record.remove(*alias);
                    }
                }
            }
            set_default(kind, record, "maxScore", json!(defaults.max_score));
        }
        EntityKind::Attendance => {
            set_default(kind, record, "date", stamp);
            set_default(
                kind,
                record,
                "status",
                Value::String(defaults.attendance_status.as_str().to_string()),
            );
            set_default(kind, record, "notes", Value::String(String::new()));
        }
    }
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
    defaults: CreateDefaults,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            defaults: CreateDefaults::default(),
        }
    }

    pub fn with_defaults(conn: &'a Connection, defaults: CreateDefaults) -> Self {
        Self { conn, defaults }
    }

    fn query_records(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> anyhow::Result<Vec<Value>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, |r| {
            let id: i64 = r.get(0)?;
            let record: String = r.get(1)?;
            Ok((id, record))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, record) = row?;
            out.push(parse_record(id, &record)?);
        }
        Ok(out)
    }
}

fn parse_record(id: EntityId, record: &str) -> anyhow::Result<Value> {
    serde_json::from_str(record).with_context(|| format!("record {id} is not valid JSON"))
}

/// Student id, class id and calendar day as the store indexes them.
fn relation_columns(record: &Map<String, Value>) -> (Option<EntityId>, Option<EntityId>, Option<String>) {
    let value = Value::Object(record.clone());
    let day = normalize::normalize_attendance(&value)
        .date
        .map(|d| d.date_naive().to_string());
    (
        normalize::reference_field(&value, STUDENT_REF),
        normalize::reference_field(&value, CLASS_REF),
        day,
    )
}

fn write_record(
    conn: &Connection,
    kind: EntityKind,
    id: EntityId,
    record: &Map<String, Value>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(record)?;
    let now = Utc::now().to_rfc3339();
    let (student_id, class_id, day) = relation_columns(record);
    match kind {
        EntityKind::Student | EntityKind::Class => {
            conn.execute(
                &format!(
                    "UPDATE {} SET record = ?, updated_at = ? WHERE id = ?",
                    kind.table()
                ),
                params![json, now, id],
            )?;
        }
        EntityKind::Grade => {
            conn.execute(
                "UPDATE grades SET record = ?, updated_at = ?, student_id = ?, class_id = ?
                 WHERE id = ?",
                params![json, now, student_id, class_id, id],
            )?;
        }
        EntityKind::Attendance => {
            conn.execute(
                "UPDATE attendance SET record = ?, updated_at = ?, student_id = ?, class_id = ?, day = ?
                 WHERE id = ?",
                params![json, now, student_id, class_id, day, id],
            )?;
        }
    }
    Ok(())
}

impl RecordStore for SqliteStore<'_> {
    fn get_all(&self, kind: EntityKind) -> anyhow::Result<Vec<Value>> {
        self.query_records(
            &format!("SELECT id, record FROM {} ORDER BY id", kind.table()),
            &[],
        )
        .with_context(|| format!("list {}", kind.table()))
    }

    fn get_by_id(&self, kind: EntityKind, id: EntityId) -> anyhow::Result<Option<Value>> {
        let record: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT record FROM {} WHERE id = ?", kind.table()),
                [id],
                |r| r.get(0),
            )
            .optional()?;
        record.map(|r| parse_record(id, &r)).transpose()
    }

    fn get_by_student_id(
        &self,
        kind: EntityKind,
        student_id: EntityId,
    ) -> anyhow::Result<Vec<Value>> {
        if !kind.has_relations() {
            return Ok(Vec::new());
        }
        self.query_records(
            &format!(
                "SELECT id, record FROM {} WHERE student_id = ? ORDER BY id",
                kind.table()
            ),
            &[&student_id],
        )
    }

    fn get_by_class_id(&self, kind: EntityKind, class_id: EntityId) -> anyhow::Result<Vec<Value>> {
        if !kind.has_relations() {
            return Ok(Vec::new());
        }
        self.query_records(
            &format!(
                "SELECT id, record FROM {} WHERE class_id = ? ORDER BY id",
                kind.table()
            ),
            &[&class_id],
        )
    }

    fn get_by_date(&self, day: NaiveDate) -> anyhow::Result<Vec<Value>> {
        let day = day.to_string();
        self.query_records(
            "SELECT id, record FROM attendance WHERE day = ? ORDER BY id",
            &[&day],
        )
    }

    fn create(
        &self,
        kind: EntityKind,
        fields: &Map<String, Value>,
    ) -> anyhow::Result<Option<Value>> {
        let mut record = fields.clone();
        record.remove("Id");
        record.remove("id");
        apply_create_defaults(kind, &mut record, Utc::now(), &self.defaults);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!("INSERT INTO {}(record) VALUES('{{}}')", kind.table()),
            [],
        )?;
        let id = tx.last_insert_rowid();
        record.insert("Id".to_string(), json!(id));
        write_record(&tx, kind, id, &record)?;
        tx.commit()?;

        Ok(Some(Value::Object(record)))
    }

    fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: &Map<String, Value>,
    ) -> anyhow::Result<Option<Value>> {
        let Some(existing) = self.get_by_id(kind, id)? else {
            return Ok(None);
        };
        let mut record = match existing {
            Value::Object(o) => o,
            _ => Map::new(),
        };
        normalize::merge_patch(kind, &mut record, patch);
        record.remove("id");
        record.insert("Id".to_string(), json!(id));
        write_record(self.conn, kind, id, &record)?;
        Ok(Some(Value::Object(record)))
    }

    fn delete(&self, kind: EntityKind, id: EntityId) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?", kind.table()),
            [id],
        )?;
        Ok(n > 0)
    }
}

/// Every collection, normalized, loaded in one pass for report assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub classes: Vec<Class>,
    pub grades: Vec<Grade>,
    pub attendance: Vec<AttendanceRecord>,
}

impl Snapshot {
    pub fn load(store: &dyn RecordStore) -> Result<Self, CoreError> {
        let fetch = |kind| store.get_all(kind).map_err(CoreError::collaborator);
        Ok(Self {
            students: fetch(EntityKind::Student)?
                .iter()
                .map(normalize::normalize_student)
                .collect(),
            classes: fetch(EntityKind::Class)?
                .iter()
                .map(normalize::normalize_class)
                .collect(),
            grades: fetch(EntityKind::Grade)?
                .iter()
                .map(normalize::normalize_grade)
                .collect(),
            attendance: fetch(EntityKind::Attendance)?
                .iter()
                .map(normalize::normalize_attendance)
                .collect(),
        })
    }

    pub fn student(&self, id: EntityId) -> Option<&Student> {
        self.students.iter().find(|s| s.id == Some(id))
    }

    pub fn class(&self, id: EntityId) -> Option<&Class> {
        self.classes.iter().find(|c| c.id == Some(id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub record: Option<Value>,
    pub created: bool,
}

/// Grid edit for one grade cell: updates the first grade with the same student
/// and assignment, otherwise creates one.
pub fn upsert_grade(
    store: &dyn RecordStore,
    fields: &Map<String, Value>,
) -> anyhow::Result<UpsertOutcome> {
    let incoming = normalize::normalize_grade(&Value::Object(fields.clone()));
    let candidates = match incoming.student_id {
        Some(sid) => store.get_by_student_id(EntityKind::Grade, sid)?,
        None => Vec::new(),
    };
    let existing = candidates.iter().find_map(|raw| {
        let g = normalize::normalize_grade(raw);
        (same_id(g.student_id, incoming.student_id) && g.assignment == incoming.assignment)
            .then_some(g.id)
            .flatten()
    });
    match existing {
        Some(id) => Ok(UpsertOutcome {
            record: store.update(EntityKind::Grade, id, fields)?,
            created: false,
        }),
        None => Ok(UpsertOutcome {
            record: store.create(EntityKind::Grade, fields)?,
            created: true,
        }),
    }
}

/// Grid edit for one attendance cell: updates the first record for the same
/// student on the same calendar day (and class, when one is given), otherwise
/// creates one.
pub fn mark_attendance(
    store: &dyn RecordStore,
    fields: &Map<String, Value>,
) -> anyhow::Result<UpsertOutcome> {
    let incoming = normalize::normalize_attendance(&Value::Object(fields.clone()));
    let day = incoming.date.unwrap_or_else(Utc::now).date_naive();
    let existing = store.get_by_date(day)?.iter().find_map(|raw| {
        let a = normalize::normalize_attendance(raw);
        let class_ok = incoming.class_id.is_none() || same_id(a.class_id, incoming.class_id);
        (same_id(a.student_id, incoming.student_id) && class_ok)
            .then_some(a.id)
            .flatten()
    });
    match existing {
        Some(id) => Ok(UpsertOutcome {
            record: store.update(EntityKind::Attendance, id, fields)?,
            created: false,
        }),
        None => Ok(UpsertOutcome {
            record: store.create(EntityKind::Attendance, fields)?,
            created: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(o) => o,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn create_assigns_id_and_student_defaults() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        let created = store
            .create(
                EntityKind::Student,
                &obj(json!({ "Id": 99, "first_name_c": "Ada", "last_name_c": "Lovelace" })),
            )
            .expect("create")
            .expect("record");
        assert_eq!(created["Id"], json!(1));
        let s = normalize::normalize_student(&created);
        assert_eq!(s.id, Some(1));
        assert!(s.enrollment_date.is_some());
        assert_eq!(created["parentContact"]["name"], json!(""));

        let fetched = store
            .get_by_id(EntityKind::Student, 1)
            .expect("get")
            .expect("present");
        assert_eq!(fetched, created);
        assert_eq!(store.get_by_id(EntityKind::Student, 2).expect("get"), None);
    }

    #[test]
    fn grade_create_fills_defaults_and_replaces_zero_max() {
        let conn = mem_conn();
        let store = SqliteStore::with_defaults(
            &conn,
            CreateDefaults {
                max_score: 50.0,
                ..CreateDefaults::default()
            },
        );
        let g = store
            .create(
                EntityKind::Grade,
                &obj(json!({ "studentId": 1, "classId": 10, "assignment": "Quiz 1", "score": 40, "max_score_c": 0 })),
            )
            .expect("create")
            .expect("record");
        let grade = normalize::normalize_grade(&g);
        assert_eq!(grade.max_score, NumericField::Value(50.0));
        assert_eq!(grade.category, GradeCategory::Assignment);
        assert!(grade.date.is_some());
        assert!(g.get("max_score_c").is_none());

        let kept = store
            .create(
                EntityKind::Grade,
                &obj(json!({ "studentId": 1, "classId": 10, "maxScore": 20, "category": "Exam" })),
            )
            .expect("create")
            .expect("record");
        let kept = normalize::normalize_grade(&kept);
        assert_eq!(kept.max_score, NumericField::Value(20.0));
        assert_eq!(kept.category, GradeCategory::Exam);
    }

    #[test]
    fn update_merges_and_reindexes_relations() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        store
            .create(
                EntityKind::Grade,
                &obj(json!({ "student_id_c": { "Id": 1, "Name": "Ada" }, "class_id_c": 10, "score_c": 7 })),
            )
            .expect("create");
        assert_eq!(store.get_by_class_id(EntityKind::Grade, 10).expect("by class").len(), 1);

        let updated = store
            .update(EntityKind::Grade, 1, &obj(json!({ "classId": 11, "Id": 500 })))
            .expect("update")
            .expect("record");
        assert_eq!(updated["Id"], json!(1));
        assert!(updated.get("class_id_c").is_none());
        assert_eq!(updated["score_c"], json!(7));
        assert!(store.get_by_class_id(EntityKind::Grade, 10).expect("by class").is_empty());
        assert_eq!(store.get_by_class_id(EntityKind::Grade, 11).expect("by class").len(), 1);
        assert_eq!(store.get_by_student_id(EntityKind::Grade, 1).expect("by student").len(), 1);

        assert_eq!(
            store
                .update(EntityKind::Grade, 42, &obj(json!({ "score": 1 })))
                .expect("update"),
            None
        );
    }

    #[test]
    fn delete_reports_whether_a_row_went_away() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        store
            .create(EntityKind::Class, &obj(json!({ "name": "Algebra" })))
            .expect("create");
        assert!(store.delete(EntityKind::Class, 1).expect("delete"));
        assert!(!store.delete(EntityKind::Class, 1).expect("delete again"));
        assert!(store.get_all(EntityKind::Class).expect("list").is_empty());
    }

    #[test]
    fn attendance_by_date_uses_calendar_day() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        for (sid, date) in [(1, "2025-03-03T08:00:00Z"), (2, "2025-03-03T15:30:00Z"), (1, "2025-03-04")] {
            store
                .create(
                    EntityKind::Attendance,
                    &obj(json!({ "studentId": sid, "classId": 10, "date": date })),
                )
                .expect("create");
        }
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).expect("date");
        let found = store.get_by_date(day).expect("by date");
        assert_eq!(found.len(), 2);
        let first = normalize::normalize_attendance(&found[0]);
        assert_eq!(first.status, AttendanceStatus::Present);
        assert_eq!(first.notes, "");
    }

    #[test]
    fn snapshot_normalizes_each_collection_in_id_order() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        store
            .create(EntityKind::Student, &obj(json!({ "firstName": "Ada", "status": "Active" })))
            .expect("create");
        store
            .create(EntityKind::Student, &obj(json!({ "first_name_c": "Bo", "status_c": "Inactive" })))
            .expect("create");
        store
            .create(EntityKind::Class, &obj(json!({ "name": "Algebra" })))
            .expect("create");
        let snap = Snapshot::load(&store).expect("snapshot");
        assert_eq!(snap.students.len(), 2);
        assert_eq!(snap.students[0].first_name, "Ada");
        assert_eq!(snap.students[1].first_name, "Bo");
        assert_eq!(snap.class(1).map(|c| c.name.as_str()), Some("Algebra"));
        assert!(snap.student(3).is_none());
    }

    #[test]
    fn upsert_grade_matches_student_and_assignment() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        let first = upsert_grade(
            &store,
            &obj(json!({ "studentId": 1, "classId": 10, "assignment": "Quiz 1", "score": 6 })),
        )
        .expect("upsert");
        assert!(first.created);
        let second = upsert_grade(
            &store,
            &obj(json!({ "studentId": 1, "classId": 10, "assignment": "Quiz 1", "score": 9 })),
        )
        .expect("upsert");
        assert!(!second.created);
        let other = upsert_grade(
            &store,
            &obj(json!({ "studentId": 2, "classId": 10, "assignment": "Quiz 1", "score": 3 })),
        )
        .expect("upsert");
        assert!(other.created);

        let all = store.get_all(EntityKind::Grade).expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(normalize::normalize_grade(&all[0]).score, NumericField::Value(9.0));
    }

    #[test]
    fn mark_attendance_updates_same_day_record() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        let marked = mark_attendance(
            &store,
            &obj(json!({ "studentId": 1, "classId": 10, "date": "2025-03-03", "status": "Absent" })),
        )
        .expect("mark");
        assert!(marked.created);
        let again = mark_attendance(
            &store,
            &obj(json!({ "studentId": 1, "classId": 10, "date": "2025-03-03T10:00:00Z", "status": "Tardy" })),
        )
        .expect("mark");
        assert!(!again.created);
        let other_class = mark_attendance(
            &store,
            &obj(json!({ "studentId": 1, "classId": 11, "date": "2025-03-03", "status": "Present" })),
        )
        .expect("mark");
        assert!(other_class.created);

        let all = store.get_all(EntityKind::Attendance).expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(
            normalize::normalize_attendance(&all[0]).status,
            AttendanceStatus::Tardy
        );
    }
}
