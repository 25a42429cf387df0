use crate::ipc::error::{ok, store_err};
use crate::ipc::handlers::records;
use crate::ipc::helpers::{db_conn, opt_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::normalize;
use crate::query::{self, ClassFilter};
use crate::store::{RecordStore, SqliteStore};
use serde_json::{json, Value};

fn class_filter(req: &Request) -> HandlerResult<ClassFilter> {
    Ok(ClassFilter {
        search: opt_str(req, "search")?.and_then(query::search_term),
        subject: opt_str(req, "subject")?
            .filter(|s| !query::is_unfiltered(s))
            .map(|s| s.trim().to_lowercase()),
    })
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let filter = match class_filter(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match SqliteStore::new(conn).get_all(EntityKind::Class) {
        Ok(raw) => {
            let classes = raw.iter().map(normalize::normalize_class).collect();
            ok(
                &req.id,
                json!({ "classes": query::filter_classes(classes, &filter) }),
            )
        }
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        _ => records::try_handle_crud(state, req, "classes", EntityKind::Class),
    }
}
