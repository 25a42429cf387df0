use crate::calc;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::handlers::records;
use crate::ipc::helpers::{db_conn, object, opt_day, opt_id, required_id, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, EntityId, EntityKind, Student};
use crate::normalize;
use crate::store::{self, RecordStore, SqliteStore};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::json;

fn handle_attendance_list_by(
    state: &mut AppState,
    req: &Request,
    key: &str,
) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_id(req, key) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = SqliteStore::new(conn);
    let raw = if key == "studentId" {
        store.get_by_student_id(EntityKind::Attendance, id)
    } else {
        store.get_by_class_id(EntityKind::Attendance, id)
    };
    records::list_response(req, EntityKind::Attendance, raw)
}

fn handle_attendance_list_by_date(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let day = match opt_day(req, "date") {
        Ok(Some(d)) => d,
        Ok(None) => return err(&req.id, "bad_params", "missing params.date", None),
        Err(resp) => return resp,
    };
    records::list_response(
        req,
        EntityKind::Attendance,
        SqliteStore::new(conn).get_by_date(day),
    )
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let fields = match object(req, "fields") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let incoming = normalize::normalize_attendance(&serde_json::Value::Object(fields.clone()));
    if incoming.student_id.is_none() {
        return err(&req.id, "bad_params", "fields must name a student", None);
    }
    let writer = records::store_for(conn);
    match store::mark_attendance(&writer, fields) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "created": outcome.created,
                "attendance": outcome
                    .record
                    .map(|r| normalize::normalize_to_json(EntityKind::Attendance, &r)),
            }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

struct WeekParams {
    week_of: NaiveDate,
    class_id: Option<EntityId>,
}

fn week_params(req: &Request) -> HandlerResult<WeekParams> {
    Ok(WeekParams {
        week_of: opt_day(req, "weekOf")?.unwrap_or_else(|| Utc::now().date_naive()),
        class_id: opt_id(req, "classId")?,
    })
}

fn load_attendance(
    conn: &Connection,
    class_id: Option<EntityId>,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let store = SqliteStore::new(conn);
    let raw = match class_id {
        Some(id) => store.get_by_class_id(EntityKind::Attendance, id)?,
        None => store.get_all(EntityKind::Attendance)?,
    };
    Ok(raw.iter().map(normalize::normalize_attendance).collect())
}

fn load_students(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    let raw = SqliteStore::new(conn).get_all(EntityKind::Student)?;
    Ok(raw.iter().map(normalize::normalize_student).collect())
}

fn handle_attendance_week_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let params = match week_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let students = match load_students(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let records = match load_attendance(conn, params.class_id) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let summary =
        calc::weekly_attendance_summary(&students, &records, params.week_of, params.class_id);
    ok(&req.id, json!({ "summary": summary }))
}

fn handle_attendance_weekly_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let params = match week_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match load_attendance(conn, params.class_id) {
        Ok(records) => ok(
            &req.id,
            json!({ "stats": calc::weekly_attendance_stats(&records, params.week_of) }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

/// All-time standing of every active student, optionally for one class.
fn handle_attendance_student_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_id = match opt_id(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let students = match load_students(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    match load_attendance(conn, class_id) {
        Ok(records) => ok(
            &req.id,
            json!({
                "classId": class_id,
                "summary": calc::attendance_overview(&students, &records, &calc::DateWindow::default()),
            }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.listByStudent" => Some(handle_attendance_list_by(state, req, "studentId")),
        "attendance.listByClass" => Some(handle_attendance_list_by(state, req, "classId")),
        "attendance.listByDate" => Some(handle_attendance_list_by_date(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.weekSummary" => Some(handle_attendance_week_summary(state, req)),
        "attendance.weeklyStats" => Some(handle_attendance_weekly_stats(state, req)),
        "attendance.studentSummary" => Some(handle_attendance_student_summary(state, req)),
        _ => records::try_handle_crud(state, req, "attendance", EntityKind::Attendance),
    }
}
