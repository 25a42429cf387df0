use crate::error::{CoreError, Issue};
use crate::model::{
    same_id, AttendanceRecord, AttendanceStatus, Class, EntityId, Grade, NumericField, Student,
    StudentStatus,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("maxScore must be greater than zero")]
    ZeroMaxScore,
    #[error("percentage is not a finite number")]
    NonFinite,
}

/// Half-up rounding to `decimals` places, the way the dashboard displays figures.
pub fn round_off(x: f64, decimals: i32) -> f64 {
    let f = 10_f64.powi(decimals);
    let scaled = x * f;
    if !scaled.is_finite() {
        return x;
    }
    (scaled + 0.5).floor() / f
}

pub fn round_off_1_decimal(x: f64) -> f64 {
    round_off(x, 1)
}

pub fn percentage(score: f64, max_score: f64) -> Result<f64, CalcError> {
    if !score.is_finite() || !max_score.is_finite() {
        return Err(CalcError::NonFinite);
    }
    if max_score <= 0.0 {
        return Err(CalcError::ZeroMaxScore);
    }
    let p = score / max_score * 100.0;
    if !p.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(p)
}

const LETTER_BANDS: [(f64, &str); 11] = [
    (97.0, "A+"),
    (93.0, "A"),
    (90.0, "A-"),
    (87.0, "B+"),
    (83.0, "B"),
    (80.0, "B-"),
    (77.0, "C+"),
    (73.0, "C"),
    (70.0, "C-"),
    (67.0, "D+"),
    (65.0, "D"),
];

/// Per-cell letter grade. Lower edges are inclusive; anything below 65 (and NaN) is F.
pub fn letter_grade(percentage: f64) -> &'static str {
    LETTER_BANDS
        .iter()
        .find(|(floor, _)| percentage >= *floor)
        .map(|(_, letter)| *letter)
        .unwrap_or("F")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    Success,
    Primary,
    Warning,
    Error,
}

pub fn grade_band(percentage: f64) -> GradeBand {
    if percentage >= 90.0 {
        GradeBand::Success
    } else if percentage >= 80.0 {
        GradeBand::Primary
    } else if percentage >= 70.0 {
        GradeBand::Warning
    } else {
        GradeBand::Error
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradeOutcome {
    Scored(f64),
    Unscored,
    Invalid(CoreError),
}

fn invalid(g: &Grade, field: &'static str, value: String, reason: impl Into<String>) -> GradeOutcome {
    GradeOutcome::Invalid(CoreError::InvalidNumeric {
        entity: "grade",
        record_id: g.id,
        field,
        value,
        reason: reason.into(),
    })
}

/// Classifies one grade for aggregation. A grade without a score is skipped
/// silently; a malformed score or maxScore is an issue.
pub fn grade_outcome(g: &Grade) -> GradeOutcome {
    let score = match &g.score {
        NumericField::Missing => return GradeOutcome::Unscored,
        NumericField::Malformed(s) => return invalid(g, "score", s.clone(), "not a number"),
        NumericField::Value(v) => *v,
    };
    let max_score = match &g.max_score {
        NumericField::Missing => {
            return invalid(g, "maxScore", String::new(), CalcError::ZeroMaxScore.to_string())
        }
        NumericField::Malformed(s) => return invalid(g, "maxScore", s.clone(), "not a number"),
        NumericField::Value(v) => *v,
    };
    match percentage(score, max_score) {
        Ok(p) => GradeOutcome::Scored(p),
        Err(e) => invalid(g, "maxScore", max_score.to_string(), e.to_string()),
    }
}

fn scored_percentages<'a, I>(grades: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Grade>,
{
    grades
        .into_iter()
        .filter_map(|g| match grade_outcome(g) {
            GradeOutcome::Scored(p) => Some(p),
            _ => None,
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / (values.len() as f64)
    }
}

/// InvalidNumeric issues for every grade the aggregates had to skip.
pub fn grade_issues<'a, I>(grades: I) -> Vec<Issue>
where
    I: IntoIterator<Item = &'a Grade>,
{
    grades
        .into_iter()
        .filter_map(|g| match grade_outcome(g) {
            GradeOutcome::Invalid(e) => Some(Issue::from(e)),
            _ => None,
        })
        .collect()
}

/// One-level class average: mean over every scored grade of the class.
pub fn class_average(grades: &[Grade], class_id: EntityId) -> f64 {
    let values = scored_percentages(grades.iter().filter(|g| g.class_id == Some(class_id)));
    round_off_1_decimal(mean(&values))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "D")]
    pub d: usize,
    #[serde(rename = "F")]
    pub f: usize,
}

impl GradeDistribution {
    pub fn total(&self) -> usize {
        self.a + self.b + self.c + self.d + self.f
    }
}

/// Five-bucket distribution with its own 90/80/70/60 cut points.
pub fn grade_distribution(grades: &[Grade], class_id: EntityId) -> GradeDistribution {
    let mut dist = GradeDistribution::default();
    for p in scored_percentages(grades.iter().filter(|g| g.class_id == Some(class_id))) {
        if p >= 90.0 {
            dist.a += 1;
        } else if p >= 80.0 {
            dist.b += 1;
        } else if p >= 70.0 {
            dist.c += 1;
        } else if p >= 60.0 {
            dist.d += 1;
        } else {
            dist.f += 1;
        }
    }
    dist
}

/// Inclusive date bounds. A record without a date only falls inside an unbounded window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: Option<DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(d) = date else {
            return false;
        };
        self.start.map(|s| d >= s).unwrap_or(true) && self.end.map(|e| d <= e).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub present: usize,
    pub absent: usize,
    pub tardy: usize,
    pub excused: usize,
    pub total: usize,
}

impl AttendanceCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Tardy => self.tardy += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
        self.total += 1;
    }

    pub fn tally<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        let mut counts = Self::default();
        for r in records {
            counts.add(r.status);
        }
        counts
    }

    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            round_off_1_decimal(100.0 * (self.present as f64) / (self.total as f64))
        }
    }
}

/// Present share of the records inside `window`, as a one-decimal percentage.
pub fn attendance_rate(records: &[AttendanceRecord], window: &DateWindow) -> f64 {
    AttendanceCounts::tally(records.iter().filter(|r| window.contains(r.date))).rate()
}

pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

pub const SCHOOL_DAYS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRow {
    pub student_id: Option<EntityId>,
    pub display_name: String,
    pub statuses: Vec<AttendanceStatus>,
    pub present: usize,
    pub absent: usize,
    pub tardy: usize,
    pub excused: usize,
    pub recorded_days: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<NaiveDate>,
    pub rows: Vec<WeekRow>,
}

/// First record for the student on that calendar day, in collection order.
pub fn find_day_record<'a>(
    records: &'a [AttendanceRecord],
    student_id: Option<EntityId>,
    day: NaiveDate,
) -> Option<&'a AttendanceRecord> {
    records.iter().find(|r| {
        same_id(r.student_id, student_id) && r.date.map(|d| d.date_naive()) == Some(day)
    })
}

/// Monday-to-Friday grid for active students. A day with no record shows as Present.
pub fn weekly_attendance_summary(
    students: &[Student],
    records: &[AttendanceRecord],
    week_of: NaiveDate,
    class_id: Option<EntityId>,
) -> WeekSummary {
    let start = week_start(week_of);
    let days: Vec<NaiveDate> = (0..SCHOOL_DAYS as i64)
        .map(|i| start + Duration::days(i))
        .collect();

    let scoped: Vec<AttendanceRecord> = records
        .iter()
        .filter(|r| class_id.map(|c| r.class_id == Some(c)).unwrap_or(true))
        .cloned()
        .collect();

    let rows = students
        .iter()
        .filter(|s| s.is_active())
        .map(|s| {
            let mut counts = AttendanceCounts::default();
            let mut recorded_days = 0;
            let statuses: Vec<AttendanceStatus> = days
                .iter()
                .map(|day| match find_day_record(&scoped, s.id, *day) {
                    Some(r) => {
                        recorded_days += 1;
                        r.status
                    }
                    None => AttendanceStatus::Present,
                })
                .collect();
            for st in &statuses {
                counts.add(*st);
            }
            WeekRow {
                student_id: s.id,
                display_name: s.display_name(),
                statuses,
                present: counts.present,
                absent: counts.absent,
                tardy: counts.tardy,
                excused: counts.excused,
                recorded_days,
                label: format!("{}/{} Present", counts.present, SCHOOL_DAYS),
            }
        })
        .collect();

    WeekSummary {
        week_start: start,
        week_end: start + Duration::days(SCHOOL_DAYS as i64 - 1),
        days,
        rows,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
    pub attendance_rate: f64,
}

/// Totals over every record dated in the Monday-to-Sunday week containing `week_of`.
pub fn weekly_attendance_stats(records: &[AttendanceRecord], week_of: NaiveDate) -> WeeklyStats {
    let start = week_start(week_of);
    let end = start + Duration::days(6);
    let counts = AttendanceCounts::tally(records.iter().filter(|r| {
        r.date
            .map(|d| {
                let day = d.date_naive();
                day >= start && day <= end
            })
            .unwrap_or(false)
    }));
    WeeklyStats {
        week_start: start,
        week_end: end,
        counts,
        attendance_rate: counts.rate(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassBreakdown {
    pub class_id: Option<EntityId>,
    pub class_name: String,
    pub subject: String,
    pub grade_count: usize,
    pub average: f64,
    pub letter_grade: &'static str,
    pub band: GradeBand,
    pub grades: Vec<Grade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub student_id: Option<EntityId>,
    pub display_name: String,
    pub student: Option<Student>,
    pub overall_percentage: f64,
    pub letter_grade: &'static str,
    pub attendance_rate: f64,
    pub total_grades: usize,
    pub grades_by_class: Vec<ClassBreakdown>,
    pub recent_attendance: Vec<AttendanceRecord>,
}

impl StudentProgress {
    /// Placeholder rendered when the selected student is not in the snapshot.
    pub fn unknown(student_id: EntityId) -> Self {
        Self {
            student_id: Some(student_id),
            display_name: "Unknown".to_string(),
            student: None,
            overall_percentage: 0.0,
            letter_grade: letter_grade(0.0),
            attendance_rate: 0.0,
            total_grades: 0,
            grades_by_class: Vec::new(),
            recent_attendance: Vec::new(),
        }
    }
}

fn by_date(a: &AttendanceRecord, b: &AttendanceRecord) -> Ordering {
    a.date.cmp(&b.date)
}

pub fn student_progress_summary(
    student: &Student,
    classes: &[Class],
    grades: &[Grade],
    attendance: &[AttendanceRecord],
    recent_limit: usize,
) -> StudentProgress {
    let student_grades: Vec<&Grade> = grades
        .iter()
        .filter(|g| same_id(g.student_id, student.id))
        .collect();
    let mut student_attendance: Vec<AttendanceRecord> = attendance
        .iter()
        .filter(|a| same_id(a.student_id, student.id))
        .cloned()
        .collect();

    let overall = round_off(mean(&scored_percentages(student_grades.iter().copied())), 2);
    let attendance_rate = AttendanceCounts::tally(student_attendance.iter()).rate();

    let grades_by_class = classes
        .iter()
        .filter_map(|cls| {
            let class_grades: Vec<&Grade> = student_grades
                .iter()
                .copied()
                .filter(|g| same_id(g.class_id, cls.id))
                .collect();
            if class_grades.is_empty() {
                return None;
            }
            let average =
                round_off_1_decimal(mean(&scored_percentages(class_grades.iter().copied())));
            Some(ClassBreakdown {
                class_id: cls.id,
                class_name: cls.name.clone(),
                subject: cls.subject.clone(),
                grade_count: class_grades.len(),
                average,
                letter_grade: letter_grade(average),
                band: grade_band(average),
                grades: class_grades.into_iter().cloned().collect(),
            })
        })
        .collect();

    // Stable sort keeps collection order among same-day entries.
    student_attendance.sort_by(by_date);
    let skip = student_attendance.len().saturating_sub(recent_limit);
    let recent_attendance = student_attendance.split_off(skip);

    StudentProgress {
        student_id: student.id,
        display_name: student.display_name(),
        student: Some(student.clone()),
        overall_percentage: overall,
        letter_grade: letter_grade(overall),
        attendance_rate,
        total_grades: student_grades.len(),
        grades_by_class,
        recent_attendance,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStanding {
    pub student_id: Option<EntityId>,
    pub display_name: String,
    pub grade_count: usize,
    pub average: f64,
    pub letter_grade: &'static str,
    pub band: GradeBand,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_id: Option<EntityId>,
    pub class_name: String,
    pub subject: String,
    pub teacher: String,
    pub class: Option<Class>,
    pub class_average: f64,
    pub class_attendance_rate: f64,
    pub total_students: usize,
    pub student_stats: Vec<StudentStanding>,
}

impl ClassSummary {
    pub fn unknown(class_id: EntityId) -> Self {
        Self {
            class_id: Some(class_id),
            class_name: "Unknown".to_string(),
            subject: String::new(),
            teacher: String::new(),
            class: None,
            class_average: 0.0,
            class_attendance_rate: 0.0,
            total_students: 0,
            student_stats: Vec::new(),
        }
    }
}

/// Two-level summary: each active student is averaged on their own, then the
/// class average is the mean of those per-student averages.
pub fn class_summary(
    class: &Class,
    students: &[Student],
    grades: &[Grade],
    attendance: &[AttendanceRecord],
) -> ClassSummary {
    let class_grades: Vec<&Grade> = grades
        .iter()
        .filter(|g| same_id(g.class_id, class.id))
        .collect();
    let class_attendance: Vec<&AttendanceRecord> = attendance
        .iter()
        .filter(|a| same_id(a.class_id, class.id))
        .collect();

    let mut student_stats: Vec<StudentStanding> = students
        .iter()
        .filter(|s| s.is_active())
        .map(|s| {
            let own: Vec<&Grade> = class_grades
                .iter()
                .copied()
                .filter(|g| same_id(g.student_id, s.id))
                .collect();
            let average = round_off_1_decimal(mean(&scored_percentages(own.iter().copied())));
            let attendance_rate = AttendanceCounts::tally(
                class_attendance
                    .iter()
                    .copied()
                    .filter(|a| same_id(a.student_id, s.id)),
            )
            .rate();
            StudentStanding {
                student_id: s.id,
                display_name: s.display_name(),
                grade_count: own.len(),
                average,
                letter_grade: letter_grade(average),
                band: grade_band(average),
                attendance_rate,
            }
        })
        .collect();

    let averages: Vec<f64> = student_stats.iter().map(|s| s.average).collect();
    let rates: Vec<f64> = student_stats.iter().map(|s| s.attendance_rate).collect();

    student_stats.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));

    ClassSummary {
        class_id: class.id,
        class_name: class.name.clone(),
        subject: class.subject.clone(),
        teacher: class.teacher.clone(),
        class: Some(class.clone()),
        class_average: round_off_1_decimal(mean(&averages)),
        class_attendance_rate: round_off_1_decimal(mean(&rates)),
        total_students: student_stats.len(),
        student_stats,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStanding {
    pub student_id: Option<EntityId>,
    pub display_name: String,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOverview {
    pub window: DateWindow,
    pub total_records: usize,
    pub attendance_stats: Vec<AttendanceStanding>,
}

/// Per active student counts inside the window, lowest attendance first.
pub fn attendance_overview(
    students: &[Student],
    records: &[AttendanceRecord],
    window: &DateWindow,
) -> AttendanceOverview {
    let in_window: Vec<&AttendanceRecord> =
        records.iter().filter(|r| window.contains(r.date)).collect();

    let mut attendance_stats: Vec<AttendanceStanding> = students
        .iter()
        .filter(|s| s.is_active())
        .map(|s| {
            let counts = AttendanceCounts::tally(
                in_window
                    .iter()
                    .copied()
                    .filter(|r| same_id(r.student_id, s.id)),
            );
            AttendanceStanding {
                student_id: s.id,
                display_name: s.display_name(),
                counts,
                attendance_rate: counts.rate(),
            }
        })
        .collect();
    attendance_stats.sort_by(|a, b| {
        a.attendance_rate
            .partial_cmp(&b.attendance_rate)
            .unwrap_or(Ordering::Equal)
    });

    AttendanceOverview {
        window: *window,
        total_records: in_window.len(),
        attendance_stats,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub student_name: String,
    pub record: AttendanceRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub total_students: usize,
    pub active_students: usize,
    pub inactive_students: usize,
    pub graduated_students: usize,
    pub total_classes: usize,
    pub today: AttendanceCounts,
    pub today_attendance_rate: f64,
    /// Every record in the last seven days, not just the listed ones.
    pub week_record_count: usize,
    pub recent_activity: Vec<ActivityEntry>,
}

pub const RECENT_ACTIVITY_DAYS: i64 = 7;
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

pub fn student_name(students: &[Student], id: Option<EntityId>) -> String {
    students
        .iter()
        .find(|s| same_id(s.id, id))
        .map(|s| s.display_name())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn dashboard_overview(
    students: &[Student],
    classes: &[Class],
    records: &[AttendanceRecord],
    now: DateTime<Utc>,
) -> DashboardOverview {
    let today_date = now.date_naive();
    let today = AttendanceCounts::tally(
        records
            .iter()
            .filter(|r| r.date.map(|d| d.date_naive()) == Some(today_date)),
    );

    let cutoff = now - Duration::days(RECENT_ACTIVITY_DAYS);
    let mut recent: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| r.date.map(|d| d >= cutoff).unwrap_or(false))
        .collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    let with_status =
        |status: StudentStatus| students.iter().filter(|s| s.status == status).count();

    DashboardOverview {
        total_students: students.len(),
        active_students: with_status(StudentStatus::Active),
        inactive_students: with_status(StudentStatus::Inactive),
        graduated_students: with_status(StudentStatus::Graduated),
        total_classes: classes.len(),
        today,
        today_attendance_rate: today.rate(),
        week_record_count: recent.len(),
        recent_activity: recent
            .into_iter()
            .take(RECENT_ACTIVITY_LIMIT)
            .map(|r| ActivityEntry {
                student_name: student_name(students, r.student_id),
                record: r.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GradeCategory, ParentContact};
    use chrono::TimeZone;

    fn student(id: EntityId, first: &str, status: StudentStatus) -> Student {
        Student {
            id: Some(id),
            first_name: first.to_string(),
            last_name: "Tester".to_string(),
            email: String::new(),
            phone: String::new(),
            grade: None,
            status,
            enrollment_date: None,
            parent_contact: ParentContact::default(),
        }
    }

    fn class(id: EntityId, name: &str) -> Class {
        Class {
            id: Some(id),
            name: name.to_string(),
            subject: "Math".to_string(),
            teacher: "Ms. Noether".to_string(),
            schedule: Default::default(),
            grade_weights: Default::default(),
            students: Vec::new(),
        }
    }

    fn grade(id: EntityId, student: EntityId, class: EntityId, score: f64, max: f64) -> Grade {
        Grade {
            id: Some(id),
            student_id: Some(student),
            class_id: Some(class),
            assignment: format!("A{}", id),
            score: NumericField::Value(score),
            max_score: NumericField::Value(max),
            category: GradeCategory::Assignment,
            date: None,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0)
            .single()
            .expect("valid date")
    }

    fn record(
        id: EntityId,
        student: EntityId,
        class: EntityId,
        date: DateTime<Utc>,
        status: AttendanceStatus,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id: Some(id),
            student_id: Some(student),
            class_id: Some(class),
            date: Some(date),
            status,
            notes: String::new(),
        }
    }

    #[test]
    fn percentage_rejects_zero_max() {
        assert_eq!(percentage(45.0, 50.0), Ok(90.0));
        assert_eq!(percentage(10.0, 0.0), Err(CalcError::ZeroMaxScore));
        assert_eq!(percentage(f64::NAN, 10.0), Err(CalcError::NonFinite));
        assert_eq!(percentage(1e300, 1e-10), Err(CalcError::NonFinite));
    }

    #[test]
    fn letter_grade_edges() {
        assert_eq!(letter_grade(97.0), "A+");
        assert_eq!(letter_grade(96.9), "A");
        assert_eq!(letter_grade(90.0), "A-");
        assert_eq!(letter_grade(65.0), "D");
        assert_eq!(letter_grade(64.9), "F");
        assert_eq!(letter_grade(-5.0), "F");
        assert_eq!(letter_grade(140.0), "A+");
        assert_eq!(letter_grade(f64::NAN), "F");
    }

    #[test]
    fn letter_grade_is_monotone_over_bands() {
        let rank = |letter: &str| {
            LETTER_BANDS
                .iter()
                .position(|(_, l)| *l == letter)
                .unwrap_or(LETTER_BANDS.len())
        };
        let mut prev = rank(letter_grade(100.0));
        let mut p = 100.0;
        while p >= 0.0 {
            let r = rank(letter_grade(p));
            assert!(r >= prev, "grade improved as percentage dropped at {}", p);
            prev = r;
            p -= 0.1;
        }
    }

    #[test]
    fn class_average_edges() {
        assert_eq!(class_average(&[], 10), 0.0);
        assert_eq!(class_average(&[grade(1, 1, 10, 80.0, 100.0)], 10), 80.0);
        let mixed = vec![
            grade(1, 1, 10, 45.0, 50.0),
            grade(2, 2, 10, 70.0, 100.0),
            grade(3, 3, 11, 10.0, 100.0),
        ];
        assert_eq!(class_average(&mixed, 10), 80.0);
    }

    #[test]
    fn class_average_skips_unscored_and_invalid() {
        let mut unscored = grade(2, 1, 10, 0.0, 100.0);
        unscored.score = NumericField::Missing;
        let mut malformed = grade(3, 1, 10, 0.0, 100.0);
        malformed.score = NumericField::Malformed("abc".into());
        let zero_max = grade(4, 1, 10, 5.0, 0.0);
        let overflow = grade(5, 1, 10, 1e300, 1e-10);
        let grades = vec![
            grade(1, 1, 10, 90.0, 100.0),
            unscored,
            malformed,
            zero_max,
            overflow,
        ];

        assert_eq!(class_average(&grades, 10), 90.0);
        assert!(class_average(&grades, 10).is_finite());
        let issues = grade_issues(&grades);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.code == "invalid_numeric"));
        assert!(issues.iter().all(|i| !i.message.contains("inf")));
    }

    #[test]
    fn distribution_uses_its_own_cut_points() {
        let grades = vec![
            grade(1, 1, 10, 90.0, 100.0),
            grade(2, 1, 10, 89.9, 100.0),
            grade(3, 1, 10, 60.0, 100.0),
            grade(4, 1, 10, 64.0, 100.0),
            grade(5, 1, 10, 59.9, 100.0),
            grade(6, 1, 99, 100.0, 100.0),
        ];
        let dist = grade_distribution(&grades, 10);
        assert_eq!(
            dist,
            GradeDistribution {
                a: 1,
                b: 1,
                c: 0,
                d: 2,
                f: 1
            }
        );
        // 64 is a D bucket here but an F letter grade.
        assert_eq!(letter_grade(64.0), "F");
        assert_eq!(dist.total(), 5);
    }

    #[test]
    fn attendance_rate_scenario_and_order_invariance() {
        use AttendanceStatus::*;
        let statuses = [Present, Present, Absent, Tardy, Present];
        let mut records: Vec<AttendanceRecord> = statuses
            .iter()
            .enumerate()
            .map(|(i, st)| record(i as EntityId + 1, 1, 10, day(2025, 3, 3 + i as u32), *st))
            .collect();
        let all = DateWindow::default();
        assert_eq!(attendance_rate(&records, &all), 60.0);
        assert_eq!(attendance_rate(&records, &all), 60.0);
        records.reverse();
        assert_eq!(attendance_rate(&records, &all), 60.0);
        assert_eq!(attendance_rate(&[], &all), 0.0);

        let late_window = DateWindow::since(day(2025, 3, 6));
        assert_eq!(attendance_rate(&records, &late_window), 50.0);
    }

    #[test]
    fn weekly_summary_defaults_unrecorded_days_to_present() {
        use AttendanceStatus::*;
        let students = vec![
            student(1, "Ada", StudentStatus::Active),
            student(2, "Bo", StudentStatus::Inactive),
        ];
        // 2025-03-05 is a Wednesday.
        let records = vec![
            record(1, 1, 10, day(2025, 3, 3), Absent),
            record(2, 1, 10, day(2025, 3, 3), Present),
            record(3, 1, 10, day(2025, 3, 4), Tardy),
            record(4, 1, 11, day(2025, 3, 5), Absent),
            record(5, 1, 10, day(2025, 3, 8), Absent),
        ];
        let week = NaiveDate::from_ymd_opt(2025, 3, 5).expect("date");
        let summary = weekly_attendance_summary(&students, &records, week, Some(10));
        assert_eq!(summary.week_start.to_string(), "2025-03-03");
        assert_eq!(summary.week_end.to_string(), "2025-03-07");
        assert_eq!(summary.rows.len(), 1);
        let row = &summary.rows[0];
        assert_eq!(row.statuses, vec![Absent, Tardy, Present, Present, Present]);
        assert_eq!(row.present, 3);
        assert_eq!(row.absent, 1);
        assert_eq!(row.tardy, 1);
        assert_eq!(row.recorded_days, 2);
        assert_eq!(row.label, "3/5 Present");
    }

    #[test]
    fn weekly_stats_cover_monday_to_sunday() {
        use AttendanceStatus::*;
        let records = vec![
            record(1, 1, 10, day(2025, 3, 3), Present),
            record(2, 2, 10, day(2025, 3, 9), Absent),
            record(3, 2, 10, day(2025, 3, 10), Absent),
        ];
        let stats =
            weekly_attendance_stats(&records, NaiveDate::from_ymd_opt(2025, 3, 6).expect("date"));
        assert_eq!(stats.counts.total, 2);
        assert_eq!(stats.counts.present, 1);
        assert_eq!(stats.attendance_rate, 50.0);
    }

    #[test]
    fn class_summary_is_mean_of_student_means() {
        let students = vec![
            student(1, "Ada", StudentStatus::Active),
            student(2, "Bo", StudentStatus::Active),
        ];
        let grades = vec![grade(1, 1, 10, 90.0, 100.0), grade(2, 2, 10, 70.0, 100.0)];
        let summary = class_summary(&class(10, "Algebra"), &students, &grades, &[]);
        assert_eq!(summary.class_average, 80.0);
        let order: Vec<(Option<EntityId>, f64)> = summary
            .student_stats
            .iter()
            .map(|s| (s.student_id, s.average))
            .collect();
        assert_eq!(order, vec![(Some(1), 90.0), (Some(2), 70.0)]);
    }

    #[test]
    fn two_level_average_differs_from_one_level_with_uneven_counts() {
        let students = vec![
            student(1, "Ada", StudentStatus::Active),
            student(2, "Bo", StudentStatus::Active),
        ];
        let grades = vec![
            grade(1, 1, 10, 100.0, 100.0),
            grade(2, 1, 10, 100.0, 100.0),
            grade(3, 1, 10, 100.0, 100.0),
            grade(4, 2, 10, 60.0, 100.0),
        ];
        let summary = class_summary(&class(10, "Algebra"), &students, &grades, &[]);
        assert_eq!(summary.class_average, 80.0);
        assert_eq!(class_average(&grades, 10), 90.0);
    }

    #[test]
    fn student_progress_breaks_down_by_class() {
        use AttendanceStatus::*;
        let ada = student(1, "Ada", StudentStatus::Active);
        let classes = vec![class(10, "Algebra"), class(11, "Biology"), class(12, "Art")];
        let grades = vec![
            grade(1, 1, 10, 45.0, 50.0),
            grade(2, 1, 10, 80.0, 100.0),
            grade(3, 1, 11, 70.0, 100.0),
            grade(4, 2, 12, 100.0, 100.0),
        ];
        let attendance: Vec<AttendanceRecord> = (1..=12)
            .map(|i| {
                let st = if i % 4 == 0 { Absent } else { Present };
                record(i, 1, 10, day(2025, 1, i as u32), st)
            })
            .rev()
            .collect();

        let p = student_progress_summary(&ada, &classes, &grades, &attendance, 10);
        assert_eq!(p.total_grades, 3);
        assert_eq!(p.overall_percentage, 80.0);
        assert_eq!(p.letter_grade, "B-");
        assert_eq!(p.attendance_rate, 75.0);
        assert_eq!(p.grades_by_class.len(), 2);
        assert_eq!(p.grades_by_class[0].class_name, "Algebra");
        assert_eq!(p.grades_by_class[0].average, 85.0);
        assert_eq!(p.grades_by_class[0].letter_grade, "B");
        assert_eq!(p.grades_by_class[1].average, 70.0);
        assert_eq!(p.recent_attendance.len(), 10);
        assert_eq!(p.recent_attendance[0].id, Some(3));
        assert_eq!(p.recent_attendance[9].id, Some(12));
    }

    #[test]
    fn attendance_overview_sorts_lowest_rate_first() {
        use AttendanceStatus::*;
        let students = vec![
            student(1, "Ada", StudentStatus::Active),
            student(2, "Bo", StudentStatus::Active),
            student(3, "Cy", StudentStatus::Graduated),
        ];
        let records = vec![
            record(1, 1, 10, day(2025, 3, 3), Present),
            record(2, 2, 10, day(2025, 3, 3), Absent),
            record(3, 2, 10, day(2025, 3, 4), Present),
            record(4, 3, 10, day(2025, 3, 4), Absent),
            record(5, 1, 10, day(2025, 1, 4), Absent),
        ];
        let overview = attendance_overview(&students, &records, &DateWindow::since(day(2025, 3, 1)));
        assert_eq!(overview.total_records, 4);
        assert_eq!(overview.attendance_stats.len(), 2);
        assert_eq!(overview.attendance_stats[0].student_id, Some(2));
        assert_eq!(overview.attendance_stats[0].attendance_rate, 50.0);
        assert_eq!(overview.attendance_stats[1].attendance_rate, 100.0);
    }

    #[test]
    fn dashboard_counts_today_and_recent() {
        use AttendanceStatus::*;
        let now = Utc
            .with_ymd_and_hms(2025, 3, 10, 15, 0, 0)
            .single()
            .expect("valid date");
        let students = vec![
            student(1, "Ada", StudentStatus::Active),
            student(2, "Bo", StudentStatus::Inactive),
            student(3, "Cy", StudentStatus::Graduated),
            student(4, "Di", StudentStatus::Graduated),
        ];
        let mut records = vec![
            record(1, 1, 10, day(2025, 3, 10), Present),
            record(2, 2, 10, day(2025, 3, 10), Absent),
            record(3, 99, 10, day(2025, 3, 8), Tardy),
            record(4, 1, 10, day(2025, 2, 1), Absent),
        ];
        let d = dashboard_overview(&students, &[class(10, "Algebra")], &records, now);
        assert_eq!(d.total_students, 4);
        assert_eq!(d.active_students, 1);
        assert_eq!(d.inactive_students, 1);
        assert_eq!(d.graduated_students, 2);
        assert_eq!(d.total_classes, 1);
        assert_eq!(d.today.total, 2);
        assert_eq!(d.today_attendance_rate, 50.0);
        assert_eq!(d.week_record_count, 3);
        assert_eq!(d.recent_activity.len(), 3);
        assert_eq!(d.recent_activity[2].student_name, "Unknown");

        // The week count keeps going past the activity cap.
        for i in 0..12 {
            records.push(record(100 + i, 1, 10, day(2025, 3, 5), Present));
        }
        let busy = dashboard_overview(&students, &[], &records, now);
        assert_eq!(busy.week_record_count, 15);
        assert_eq!(busy.recent_activity.len(), RECENT_ACTIVITY_LIMIT);
    }

    #[test]
    fn round_off_matches_display_rounding() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(66.66666), 66.7);
        assert_eq!(round_off(83.333333, 2), 83.33);
        assert_eq!(round_off_1_decimal(f64::MAX), f64::MAX);
    }
}
