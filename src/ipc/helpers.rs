//! Param extraction shared by the handlers. Each helper returns the ready-made
//! error response on failure so handlers can bail with a single `match`.

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::EntityId;
use crate::normalize;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::{Map, Value};

pub type HandlerResult<T> = Result<T, Value>;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> HandlerResult<&'a Connection> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn opt_id(req: &Request, key: &str) -> HandlerResult<Option<EntityId>> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => normalize::reference_id(v).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("params.{key} must be an id"),
                None,
            )
        }),
    }
}

pub fn required_id(req: &Request, key: &str) -> HandlerResult<EntityId> {
    opt_id(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{key}"), None))
}

pub fn object<'a>(req: &'a Request, key: &str) -> HandlerResult<&'a Map<String, Value>> {
    req.params
        .get(key)
        .and_then(|v| v.as_object())
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("params.{key} must be an object"),
                None,
            )
        })
}

pub fn opt_str<'a>(req: &'a Request, key: &str) -> HandlerResult<Option<&'a str>> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("params.{key} must be a string"),
            None,
        )),
    }
}

pub fn required_f64(req: &Request, key: &str) -> HandlerResult<f64> {
    match req.params.get(key).map(normalize::numeric_value) {
        Some(crate::model::NumericField::Value(v)) => Ok(v),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("params.{key} must be a number"),
            None,
        )),
    }
}

pub fn opt_timestamp(req: &Request, key: &str) -> HandlerResult<Option<DateTime<Utc>>> {
    match opt_str(req, key)? {
        None => Ok(None),
        Some(s) => normalize::parse_date(s).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("params.{key} must be a date"),
                None,
            )
        }),
    }
}

/// Upper bound of a date range; a bare day covers the whole of that day.
pub fn opt_until(req: &Request, key: &str) -> HandlerResult<Option<DateTime<Utc>>> {
    match opt_str(req, key)? {
        None => Ok(None),
        Some(s) => normalize::parse_date_end(s).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("params.{key} must be a date"),
                None,
            )
        }),
    }
}

pub fn required_str<'a>(req: &'a Request, key: &str) -> HandlerResult<&'a str> {
    opt_str(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{key}"), None))
}

pub fn opt_day(req: &Request, key: &str) -> HandlerResult<Option<NaiveDate>> {
    Ok(opt_timestamp(req, key)?.map(|d| d.date_naive()))
}

/// Reference time for derived figures; `asOf` lets callers pin it.
pub fn as_of(req: &Request) -> HandlerResult<DateTime<Utc>> {
    Ok(opt_timestamp(req, "asOf")?.unwrap_or_else(Utc::now))
}
