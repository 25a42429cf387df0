use crate::calc::{self, AttendanceCounts, DateWindow};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{db_conn, opt_id, opt_timestamp, opt_until, required_f64, required_id};
use crate::ipc::types::{AppState, Request};
use crate::model::{same_id, EntityKind, Grade};
use crate::normalize;
use crate::store::{RecordStore, SqliteStore};
use serde_json::json;

fn handle_calc_percentage(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let score = match required_f64(req, "score") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let max_score = match required_f64(req, "maxScore") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::percentage(score, max_score) {
        Ok(p) => ok(
            &req.id,
            json!({
                "percentage": p,
                "letterGrade": calc::letter_grade(p),
                "band": calc::grade_band(p),
            }),
        ),
        Err(e) => err(
            &req.id,
            "invalid_numeric",
            e.to_string(),
            Some(json!({ "field": "maxScore", "value": max_score })),
        ),
    }
}

fn handle_calc_letter_grade(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = match required_f64(req, "percentage") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "letterGrade": calc::letter_grade(p), "band": calc::grade_band(p) }),
    )
}

fn class_grades(state: &AppState, req: &Request) -> Result<(i64, Vec<Grade>), serde_json::Value> {
    let conn = db_conn(state, req)?;
    let class_id = required_id(req, "classId")?;
    let raw = SqliteStore::new(conn)
        .get_by_class_id(EntityKind::Grade, class_id)
        .map_err(|e| store_err(&req.id, e))?;
    Ok((class_id, raw.iter().map(normalize::normalize_grade).collect()))
}

fn handle_calc_class_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (class_id, grades) = match class_grades(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({
            "classId": class_id,
            "average": calc::class_average(&grades, class_id),
            "gradeCount": grades.len(),
            "issues": calc::grade_issues(&grades),
        }),
    )
}

fn handle_calc_grade_distribution(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (class_id, grades) = match class_grades(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let distribution = calc::grade_distribution(&grades, class_id);
    ok(
        &req.id,
        json!({
            "classId": class_id,
            "gradeCount": distribution.total(),
            "distribution": distribution,
            "issues": calc::grade_issues(&grades),
        }),
    )
}

fn handle_calc_attendance_rate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match opt_id(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_id = match opt_id(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let window = match (opt_timestamp(req, "since"), opt_until(req, "until")) {
        (Ok(start), Ok(end)) => DateWindow { start, end },
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    let store = SqliteStore::new(conn);
    let raw = match student_id {
        Some(id) => store.get_by_student_id(EntityKind::Attendance, id),
        None => store.get_all(EntityKind::Attendance),
    };
    let records: Vec<_> = match raw {
        Ok(raw) => raw
            .iter()
            .map(normalize::normalize_attendance)
            .filter(|r| class_id.map(|c| same_id(r.class_id, Some(c))).unwrap_or(true))
            .collect(),
        Err(e) => return store_err(&req.id, e),
    };

    let counts = AttendanceCounts::tally(records.iter().filter(|r| window.contains(r.date)));
    ok(
        &req.id,
        json!({
            "attendanceRate": calc::attendance_rate(&records, &window),
            "counts": counts,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.percentage" => Some(handle_calc_percentage(state, req)),
        "calc.letterGrade" => Some(handle_calc_letter_grade(state, req)),
        "calc.classAverage" => Some(handle_calc_class_average(state, req)),
        "calc.gradeDistribution" => Some(handle_calc_grade_distribution(state, req)),
        "calc.attendanceRate" => Some(handle_calc_attendance_rate(state, req)),
        _ => None,
    }
}
