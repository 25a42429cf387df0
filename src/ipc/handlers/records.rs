//! CRUD plumbing shared by the per-entity handler families.

use crate::error::CoreError;
use crate::ipc::error::{core_err, ok, store_err};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, object, required_id};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::normalize;
use crate::store::{RecordStore, SqliteStore};
use rusqlite::Connection;
use serde_json::{json, Value};

pub fn store_for(conn: &Connection) -> SqliteStore<'_> {
    SqliteStore::with_defaults(conn, setup::create_defaults(conn))
}

/// Result key for a single record of `kind`.
pub fn record_key(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Student => "student",
        EntityKind::Class => "class",
        EntityKind::Grade => "grade",
        EntityKind::Attendance => "attendance",
    }
}

pub fn normalize_all(kind: EntityKind, raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .map(|r| normalize::normalize_to_json(kind, r))
        .collect()
}

pub fn list_response(req: &Request, kind: EntityKind, raw: anyhow::Result<Vec<Value>>) -> Value {
    match raw {
        Ok(records) => ok(
            &req.id,
            json!({ kind.table(): normalize_all(kind, &records) }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn handle_list(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    list_response(req, kind, SqliteStore::new(conn).get_all(kind))
}

pub fn handle_get(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match SqliteStore::new(conn).get_by_id(kind, id) {
        Ok(Some(raw)) => ok(
            &req.id,
            json!({ record_key(kind): normalize::normalize_to_json(kind, &raw) }),
        ),
        Ok(None) => core_err(
            &req.id,
            &CoreError::NotFound {
                entity: kind.label(),
                id,
            },
        ),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn handle_create(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let fields = match object(req, "fields") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store_for(conn).create(kind, fields) {
        Ok(Some(raw)) => {
            let entity = normalize::normalize_to_json(kind, &raw);
            tracing::info!(kind = kind.table(), id = ?normalize::record_id(&raw), "created");
            ok(&req.id, json!({ record_key(kind): entity }))
        }
        Ok(None) => core_err(
            &req.id,
            &CoreError::CollaboratorFailure(format!("{} was not created", kind.label())),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn handle_update(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match object(req, "patch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match SqliteStore::new(conn).update(kind, id, patch) {
        Ok(Some(raw)) => ok(
            &req.id,
            json!({ record_key(kind): normalize::normalize_to_json(kind, &raw) }),
        ),
        Ok(None) => core_err(
            &req.id,
            &CoreError::NotFound {
                entity: kind.label(),
                id,
            },
        ),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn handle_delete(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match SqliteStore::new(conn).delete(kind, id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true, "id": id })),
        Ok(false) => core_err(
            &req.id,
            &CoreError::NotFound {
                entity: kind.label(),
                id,
            },
        ),
        Err(e) => store_err(&req.id, e),
    }
}

/// `<prefix>.list|get|create|update|delete` for one entity kind.
pub fn try_handle_crud(
    state: &mut AppState,
    req: &Request,
    prefix: &str,
    kind: EntityKind,
) -> Option<Value> {
    let op = req.method.strip_prefix(prefix)?.strip_prefix('.')?;
    match op {
        "list" => Some(handle_list(state, req, kind)),
        "get" => Some(handle_get(state, req, kind)),
        "create" => Some(handle_create(state, req, kind)),
        "update" => Some(handle_update(state, req, kind)),
        "delete" => Some(handle_delete(state, req, kind)),
        _ => None,
    }
}
