use crate::calc::{self, AttendanceOverview, ClassSummary, DateWindow, StudentProgress};
use crate::error::{CoreError, Issue};
use crate::model::{same_id, EntityId};
use crate::store::{RecordStore, Snapshot};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    StudentProgress,
    ClassSummary,
    AttendanceOverview,
}

impl ReportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student-progress" => Some(Self::StudentProgress),
            "class-summary" => Some(Self::ClassSummary),
            "attendance-overview" => Some(Self::AttendanceOverview),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StudentProgress => "student-progress",
            Self::ClassSummary => "class-summary",
            Self::AttendanceOverview => "attendance-overview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Week,
    Month,
    Semester,
}

pub const SEMESTER_DAYS: i64 = 120;

impl DateRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "semester" => Some(Self::Semester),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Semester => "semester",
        }
    }

    /// Start of the window ending at `now`. Month means the first of the
    /// current calendar month, midnight UTC.
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Week => now - Duration::days(7),
            Self::Month => NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
                .unwrap_or(now),
            Self::Semester => now - Duration::days(SEMESTER_DAYS),
        }
    }
}

/// Report parameters as the caller sent them; nothing is validated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub student_id: Option<EntityId>,
    pub class_id: Option<EntityId>,
    pub range: Option<DateRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    StudentProgress { student_id: EntityId },
    ClassSummary { class_id: EntityId },
    AttendanceOverview { range: DateRange },
}

impl ReportRequest {
    pub fn select(&self) -> Result<Selection, CoreError> {
        match self.kind {
            ReportKind::StudentProgress => self
                .student_id
                .map(|student_id| Selection::StudentProgress { student_id })
                .ok_or(CoreError::MissingSelection { param: "studentId" }),
            ReportKind::ClassSummary => self
                .class_id
                .map(|class_id| Selection::ClassSummary { class_id })
                .ok_or(CoreError::MissingSelection { param: "classId" }),
            ReportKind::AttendanceOverview => self
                .range
                .map(|range| Selection::AttendanceOverview { range })
                .ok_or(CoreError::MissingSelection { param: "range" }),
        }
    }
}

impl Selection {
    pub fn kind(&self) -> ReportKind {
        match self {
            Self::StudentProgress { .. } => ReportKind::StudentProgress,
            Self::ClassSummary { .. } => ReportKind::ClassSummary,
            Self::AttendanceOverview { .. } => ReportKind::AttendanceOverview,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub recent_attendance_limit: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            recent_attendance_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeMeta {
    pub token: &'static str,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportData {
    StudentProgress(StudentProgress),
    ClassSummary(ClassSummary),
    AttendanceOverview(AttendanceOverview),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_type: ReportKind,
    pub generated_at: DateTime<Utc>,
    pub selection: SelectionMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeMeta>,
    pub data: ReportData,
    pub issues: Vec<Issue>,
}

impl Report {
    /// `<reportType>-<YYYY-MM-DD>.json`, dated by generation time.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.report_type.as_str(),
            self.generated_at.format("%Y-%m-%d")
        )
    }
}

pub fn assemble(
    selection: &Selection,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
    options: &ReportOptions,
) -> Report {
    let mut issues = Vec::new();
    let mut meta = SelectionMeta {
        student_id: None,
        class_id: None,
        range: None,
    };
    let mut range = None;

    let data = match *selection {
        Selection::StudentProgress { student_id } => {
            meta.student_id = Some(student_id);
            match snapshot.student(student_id) {
                Some(student) => {
                    issues.extend(calc::grade_issues(
                        snapshot
                            .grades
                            .iter()
                            .filter(|g| same_id(g.student_id, student.id)),
                    ));
                    ReportData::StudentProgress(calc::student_progress_summary(
                        student,
                        &snapshot.classes,
                        &snapshot.grades,
                        &snapshot.attendance,
                        options.recent_attendance_limit,
                    ))
                }
                None => {
                    issues.push(Issue::from(CoreError::NotFound {
                        entity: "student",
                        id: student_id,
                    }));
                    ReportData::StudentProgress(StudentProgress::unknown(student_id))
                }
            }
        }
        Selection::ClassSummary { class_id } => {
            meta.class_id = Some(class_id);
            match snapshot.class(class_id) {
                Some(class) => {
                    issues.extend(calc::grade_issues(
                        snapshot
                            .grades
                            .iter()
                            .filter(|g| same_id(g.class_id, class.id)),
                    ));
                    ReportData::ClassSummary(calc::class_summary(
                        class,
                        &snapshot.students,
                        &snapshot.grades,
                        &snapshot.attendance,
                    ))
                }
                None => {
                    issues.push(Issue::from(CoreError::NotFound {
                        entity: "class",
                        id: class_id,
                    }));
                    ReportData::ClassSummary(ClassSummary::unknown(class_id))
                }
            }
        }
        Selection::AttendanceOverview { range: token } => {
            let since = token.since(now);
            meta.range = Some(token.as_str());
            range = Some(RangeMeta {
                token: token.as_str(),
                since,
            });
            ReportData::AttendanceOverview(calc::attendance_overview(
                &snapshot.students,
                &snapshot.attendance,
                &DateWindow::since(since),
            ))
        }
    };

    Report {
        report_type: selection.kind(),
        generated_at: now,
        selection: meta,
        range,
        data,
        issues,
    }
}

/// Validates the selection, loads a fresh snapshot and assembles the report.
/// A missing selection fails before the store is touched.
pub fn generate(
    store: &dyn RecordStore,
    request: &ReportRequest,
    now: DateTime<Utc>,
    options: &ReportOptions,
) -> Result<Report, CoreError> {
    let selection = request.select()?;
    let snapshot = Snapshot::load(store)?;
    let report = assemble(&selection, &snapshot, now, options);
    tracing::info!(
        report_type = report.report_type.as_str(),
        issues = report.issues.len(),
        "report generated"
    );
    Ok(report)
}
