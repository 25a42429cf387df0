use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoolbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoolbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_line(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_line(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("schoolbook-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
    assert_eq!(health["result"]["workspacePath"], json!(null));

    let before = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(error_code(&before), Some("no_workspace"));

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["ok"], json!(true));
    assert!(workspace.join("schoolbook.sqlite3").is_file());
    assert_eq!(selected["result"]["counts"]["students"], json!(0));

    let calls = [
        ("students.list", json!({})),
        ("students.get", json!({ "id": 1 })),
        ("classes.list", json!({})),
        ("classes.create", json!({ "fields": { "name": "Smoke" } })),
        ("grades.list", json!({})),
        ("grades.listByStudent", json!({ "studentId": 1 })),
        ("grades.listByClass", json!({ "classId": 1 })),
        (
            "grades.upsert",
            json!({ "fields": { "studentId": 1, "classId": 1, "assignment": "Q1", "score": 5 } }),
        ),
        ("attendance.list", json!({})),
        ("attendance.listByDate", json!({ "date": "2025-03-03" })),
        (
            "attendance.mark",
            json!({ "fields": { "studentId": 1, "classId": 1, "date": "2025-03-03" } }),
        ),
        ("attendance.weekSummary", json!({ "weekOf": "2025-03-03" })),
        ("attendance.weeklyStats", json!({ "weekOf": "2025-03-03" })),
        ("calc.percentage", json!({ "score": 45, "maxScore": 50 })),
        ("calc.letterGrade", json!({ "percentage": 88 })),
        ("calc.classAverage", json!({ "classId": 1 })),
        ("calc.gradeDistribution", json!({ "classId": 1 })),
        ("calc.attendanceRate", json!({})),
        ("dashboard.overview", json!({})),
        (
            "reports.generate",
            json!({ "reportType": "attendance-overview", "range": "week" }),
        ),
        ("setup.get", json!({})),
    ];
    for (i, (method, params)) in calls.iter().enumerate() {
        let id = format!("call-{i}");
        let _ = request(&mut stdin, &mut reader, &id, method, params.clone());
    }

    let reopened = request(
        &mut stdin,
        &mut reader,
        "reopen",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        reopened["result"]["counts"],
        json!({ "students": 0, "classes": 1, "grades": 1, "attendance": 1 })
    );

    writeln!(
        stdin,
        "{}",
        json!({ "id": "x", "method": "gradebook.explode", "params": {} })
    )
    .expect("write");
    stdin.flush().expect("flush");
    let unknown = read_line(&mut reader);
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let bad = read_line(&mut reader);
    assert_eq!(error_code(&bad), Some("bad_json"));

    let still_alive = request(&mut stdin, &mut reader, "last", "health", json!({}));
    assert_eq!(
        still_alive["result"]["workspacePath"],
        json!(workspace.to_string_lossy())
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn calc_methods_answer_without_a_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let pct = request(
        &mut stdin,
        &mut reader,
        "1",
        "calc.percentage",
        json!({ "score": "45", "maxScore": 50 }),
    );
    assert_eq!(pct["result"]["percentage"], json!(90.0));
    assert_eq!(pct["result"]["letterGrade"], json!("A-"));
    assert_eq!(pct["result"]["band"], json!("success"));

    let zero = request(
        &mut stdin,
        &mut reader,
        "2",
        "calc.percentage",
        json!({ "score": 5, "maxScore": 0 }),
    );
    assert_eq!(error_code(&zero), Some("invalid_numeric"));

    let letter = request(
        &mut stdin,
        &mut reader,
        "3",
        "calc.letterGrade",
        json!({ "percentage": 64.9 }),
    );
    assert_eq!(letter["result"]["letterGrade"], json!("F"));
    assert_eq!(letter["result"]["band"], json!("error"));

    let missing = request(&mut stdin, &mut reader, "4", "calc.letterGrade", json!({}));
    assert_eq!(error_code(&missing), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
}
