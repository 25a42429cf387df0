use crate::error::CoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn core_err(id: &str, e: &CoreError) -> serde_json::Value {
    tracing::warn!(code = e.code(), "{e}");
    err(id, e.code(), e.to_string(), e.details())
}

/// Store failures surface as retryable collaborator failures.
pub fn store_err(id: &str, e: anyhow::Error) -> serde_json::Value {
    core_err(id, &CoreError::collaborator(e))
}
