use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, GradeCategory};
use crate::reports::ReportOptions;
use crate::store::CreateDefaults;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupSection {
    Grades,
    Attendance,
    Reports,
}

const SECTIONS: [SetupSection; 3] = [
    SetupSection::Grades,
    SetupSection::Attendance,
    SetupSection::Reports,
];

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grades" => Some(Self::Grades),
            "attendance" => Some(Self::Attendance),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Grades => "grades",
            Self::Attendance => "attendance",
            Self::Reports => "reports",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grades => "setup.grades",
            Self::Attendance => "setup.attendance",
            Self::Reports => "setup.reports",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grades => json!({
            "defaultMaxScore": 100,
            "defaultCategory": "Assignment"
        }),
        SetupSection::Attendance => json!({
            "defaultStatus": "Present"
        }),
        SetupSection::Reports => json!({
            "recentAttendanceLimit": 10,
            "exportPretty": true
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v.as_f64().ok_or_else(|| format!("{} must be a number", key))?;
    if !(n > min && n <= max) {
        return Err(format!("{} must be in ({}, {}]", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Grades => match k.as_str() {
                "defaultMaxScore" => {
                    obj.insert(k.clone(), json!(parse_f64_range(v, k, 0.0, 10_000.0)?));
                }
                "defaultCategory" => {
                    let s = parse_string_max(v, k, 16)?;
                    let Some(category) = GradeCategory::parse(&s) else {
                        return Err(
                            "defaultCategory must be one of: Homework, Quiz, Exam, Project, Assignment"
                                .into(),
                        );
                    };
                    obj.insert(k.clone(), Value::String(category.as_str().to_string()));
                }
                _ => return Err(format!("unknown grades field: {}", k)),
            },
            SetupSection::Attendance => match k.as_str() {
                "defaultStatus" => {
                    let s = parse_string_max(v, k, 16)?;
                    let Some(status) = AttendanceStatus::parse(&s) else {
                        return Err(
                            "defaultStatus must be one of: Present, Absent, Tardy, Excused".into(),
                        );
                    };
                    obj.insert(k.clone(), Value::String(status.as_str().to_string()));
                }
                _ => return Err(format!("unknown attendance field: {}", k)),
            },
            SetupSection::Reports => match k.as_str() {
                "recentAttendanceLimit" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
                }
                "exportPretty" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: a malformed stored value falls back to the default.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn load_or_default(conn: &rusqlite::Connection, section: SetupSection) -> Value {
    load_section(conn, section).unwrap_or_else(|e| {
        tracing::warn!(section = section.name(), "setup load failed: {e:#}");
        default_section(section)
    })
}

/// Create-time defaults for the record store, from the grades and attendance sections.
pub fn create_defaults(conn: &rusqlite::Connection) -> CreateDefaults {
    let grades = load_or_default(conn, SetupSection::Grades);
    let attendance = load_or_default(conn, SetupSection::Attendance);
    let fallback = CreateDefaults::default();
    CreateDefaults {
        max_score: grades
            .get("defaultMaxScore")
            .and_then(|v| v.as_f64())
            .unwrap_or(fallback.max_score),
        grade_category: grades
            .get("defaultCategory")
            .and_then(|v| v.as_str())
            .and_then(GradeCategory::parse)
            .unwrap_or(fallback.grade_category),
        attendance_status: attendance
            .get("defaultStatus")
            .and_then(|v| v.as_str())
            .and_then(AttendanceStatus::parse)
            .unwrap_or(fallback.attendance_status),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub options: ReportOptions,
    pub export_pretty: bool,
}

pub fn report_settings(conn: &rusqlite::Connection) -> ReportSettings {
    let reports = load_or_default(conn, SetupSection::Reports);
    ReportSettings {
        options: ReportOptions {
            recent_attendance_limit: reports
                .get("recentAttendanceLimit")
                .and_then(|v| v.as_u64())
                .map(|n| n as usize)
                .unwrap_or_else(|| ReportOptions::default().recent_attendance_limit),
        },
        export_pretty: reports
            .get("exportPretty")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SECTIONS {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.name(), "setup updated");
    ok(&req.id, json!({ "ok": true, section.name(): current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
