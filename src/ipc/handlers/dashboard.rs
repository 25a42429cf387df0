use crate::calc;
use crate::ipc::error::{core_err, ok};
use crate::ipc::handlers::records;
use crate::ipc::helpers::{as_of, db_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::Snapshot;
use serde_json::json;

fn handle_dashboard_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let now = match as_of(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let snapshot = match Snapshot::load(&records::store_for(conn)) {
        Ok(s) => s,
        Err(e) => return core_err(&req.id, &e),
    };
    let overview = calc::dashboard_overview(
        &snapshot.students,
        &snapshot.classes,
        &snapshot.attendance,
        now,
    );
    ok(&req.id, json!({ "overview": overview }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.overview" => Some(handle_dashboard_overview(state, req)),
        _ => None,
    }
}
