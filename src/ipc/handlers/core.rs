use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

const COLLECTIONS: [EntityKind; 4] = [
    EntityKind::Student,
    EntityKind::Class,
    EntityKind::Grade,
    EntityKind::Attendance,
];

fn record_counts(conn: &Connection) -> anyhow::Result<Value> {
    let mut counts = Map::new();
    for kind in COLLECTIONS {
        counts.insert(
            kind.table().to_string(),
            json!(db::count_records(conn, kind.table())?),
        );
    }
    Ok(Value::Object(counts))
}

fn handle_health(state: &mut AppState, req: &Request) -> Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "database": state.workspace.as_ref().map(|p| p.join(db::DB_FILE_NAME).to_string_lossy().to_string()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Value {
    let Some(path) = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:#}"), None),
    };
    let counts = match record_counts(&conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:#}"), None),
    };
    tracing::info!(workspace = %path.display(), %counts, "workspace opened");

    // Replacing the connection drops the previous workspace's handle.
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "database": path.join(db::DB_FILE_NAME).to_string_lossy(),
            "counts": counts,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
