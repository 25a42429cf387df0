use crate::ipc::error::{err, ok, store_err};
use crate::ipc::handlers::records;
use crate::ipc::helpers::{db_conn, object, required_id};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::normalize;
use crate::store::{self, RecordStore, SqliteStore};
use serde_json::json;

fn handle_grades_list_by(state: &mut AppState, req: &Request, key: &str) -> serde_json::Value {
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
        store.get_by_student_id(EntityKind::Grade, id)
    } else {
        store.get_by_class_id(EntityKind::Grade, id)
    };
    records::list_response(req, EntityKind::Grade, raw)
}

fn handle_grades_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let fields = match object(req, "fields") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let incoming = normalize::normalize_grade(&serde_json::Value::Object(fields.clone()));
    if incoming.student_id.is_none() || incoming.assignment.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "fields must name a student and an assignment",
            None,
        );
    }
    let writer = records::store_for(conn);
    match store::upsert_grade(&writer, fields) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "created": outcome.created,
                "grade": outcome
                    .record
                    .map(|r| normalize::normalize_to_json(EntityKind::Grade, &r)),
            }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.listByStudent" => Some(handle_grades_list_by(state, req, "studentId")),
        "grades.listByClass" => Some(handle_grades_list_by(state, req, "classId")),
        "grades.upsert" => Some(handle_grades_upsert(state, req)),
        _ => records::try_handle_crud(state, req, "grades", EntityKind::Grade),
    }
}
