use crate::export::{self, ExportFormat};
use crate::ipc::error::{core_err, err, ok};
use crate::ipc::handlers::{records, setup};
use crate::ipc::helpers::{as_of, db_conn, opt_id, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, DateRange, Report, ReportKind, ReportRequest};
use serde_json::json;
use std::path::PathBuf;

fn parse_report_request(req: &Request) -> Result<ReportRequest, serde_json::Value> {
    let raw_kind = required_str(req, "reportType")?;
    let Some(kind) = ReportKind::parse(raw_kind) else {
        return Err(err(
            &req.id,
            "bad_params",
            "reportType must be one of: student-progress, class-summary, attendance-overview",
            Some(json!({ "reportType": raw_kind })),
        ));
    };
    let range = match opt_str(req, "range")? {
        None => None,
        Some(token) => match DateRange::parse(token) {
            Some(r) => Some(r),
            None => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "range must be one of: week, month, semester",
                    Some(json!({ "range": token })),
                ))
            }
        },
    };
    Ok(ReportRequest {
        kind,
        student_id: opt_id(req, "studentId")?,
        class_id: opt_id(req, "classId")?,
        range,
    })
}

/// Shared by generate and export: parse, validate, load, assemble.
fn build_report(state: &AppState, req: &Request) -> Result<Report, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let request = parse_report_request(req)?;
    let now = as_of(req)?;
    let settings = setup::report_settings(conn);
    reports::generate(&records::store_for(conn), &request, now, &settings.options)
        .map_err(|e| core_err(&req.id, &e))
}

fn handle_reports_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    match build_report(state, req) {
        Ok(report) => ok(&req.id, json!({ "report": report })),
        Err(resp) => resp,
    }
}

fn handle_reports_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_dir = match required_str(req, "outDir") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    let format = match opt_str(req, "format") {
        Ok(None) => ExportFormat::Json,
        Ok(Some(s)) => match ExportFormat::parse(s) {
            Some(f) => f,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "format must be one of: json, bundle",
                    Some(json!({ "format": s })),
                )
            }
        },
        Err(resp) => return resp,
    };
    let report = match build_report(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let pretty = match state.db.as_ref() {
        Some(conn) => setup::report_settings(conn).export_pretty,
        None => true,
    };

    match export::export_report(&report, &out_dir, format, pretty) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "reportType": report.report_type,
                "issueCount": report.issues.len(),
                "path": summary.path,
                "format": summary.format,
                "bytes": summary.bytes,
                "sha256": summary.sha256,
            }),
        ),
        Err(e) => err(&req.id, "export_failed", format!("{e:#}"), None),
    }
}

fn handle_reports_open_bundle(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    match export::read_report_bundle(&path) {
        Ok(contents) => ok(
            &req.id,
            json!({ "manifest": contents.manifest, "report": contents.report }),
        ),
        Err(e) => err(&req.id, "export_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.generate" => Some(handle_reports_generate(state, req)),
        "reports.export" => Some(handle_reports_export(state, req)),
        "reports.openBundle" => Some(handle_reports_open_bundle(state, req)),
        _ => None,
    }
}
