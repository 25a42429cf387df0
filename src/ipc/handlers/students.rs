use crate::ipc::error::{err, ok, store_err};
use crate::ipc::handlers::records;
use crate::ipc::helpers::{db_conn, opt_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{EntityKind, GradeLevel};
use crate::normalize;
use crate::query::{self, StudentFilter};
use crate::store::{RecordStore, SqliteStore};
use serde_json::{json, Value};

fn student_filter(req: &Request) -> HandlerResult<StudentFilter> {
    let mut filter = StudentFilter {
        search: opt_str(req, "search")?.and_then(query::search_term),
        ..Default::default()
    };
    if let Some(raw) = opt_str(req, "status")?.filter(|s| !query::is_unfiltered(s)) {
        filter.status = Some(query::parse_status_filter(raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "params.status must be active, inactive or graduated",
                None,
            )
        })?);
    }
    if let Some(raw) = opt_str(req, "grade")?.filter(|s| !query::is_unfiltered(s)) {
        filter.grade = Some(GradeLevel::parse(raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "params.grade must be 9th through 12th",
                None,
            )
        })?);
    }
    Ok(filter)
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let filter = match student_filter(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let raw = match SqliteStore::new(conn).get_all(EntityKind::Student) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let students = raw.iter().map(normalize::normalize_student).collect();
    ok(
        &req.id,
        json!({ "students": query::filter_students(students, &filter) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        _ => records::try_handle_crud(state, req, "students", EntityKind::Student),
    }
}
