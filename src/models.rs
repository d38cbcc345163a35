use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Completed,
}

impl StudentStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub center_id: Uuid,
    pub enrolled_on: NaiveDate,
    pub status: StudentStatus,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub faculty_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
}

/// One attendance event, denormalized with the student name and subject id so
/// downstream computations never go back to the store.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub assignment_id: Uuid,
    pub subject_id: Uuid,
    pub attended_on: NaiveDate,
    pub in_time: NaiveTime,
    pub out_time: NaiveTime,
    pub duration_minutes: i64,
    pub topic_ids: Vec<Uuid>,
    pub marked_by: Uuid,
    pub backdated: bool,
}

#[derive(Debug, Clone)]
pub struct FeedbackResponse {
    pub student_id: Uuid,
    pub survey_id: Uuid,
    pub satisfaction: i32,
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Derived value objects. All of these are recomputed on demand and carry no
// identity; none of them ever writes back to an entity.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMetrics {
    pub total_sessions: usize,
    pub total_minutes: i64,
    pub avg_session_minutes: f64,
    pub distinct_students: usize,
    pub distinct_subjects: usize,
}

impl WindowMetrics {
    pub fn zero() -> Self {
        Self {
            total_sessions: 0,
            total_minutes: 0,
            avg_session_minutes: 0.0,
            distinct_students: 0,
            distinct_subjects: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceVelocity {
    pub window_days: i64,
    pub total_sessions: usize,
    pub sessions_per_week: f64,
    pub avg_session_minutes: f64,
    pub total_learning_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningVelocity {
    pub total_sessions: usize,
    pub total_topics: usize,
    pub topics_per_session: f64,
    pub minutes_per_topic: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskStudent {
    pub student_id: Uuid,
    pub name: String,
    pub last_attendance: Option<NaiveDate>,
    pub days_since_attendance: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendedStudent {
    pub student_id: Uuid,
    pub name: String,
    pub enrolled_on: NaiveDate,
    pub days_enrolled: i64,
    pub attendance_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearingCompletionStudent {
    pub student_id: Uuid,
    pub name: String,
    pub attendance_count: usize,
    pub active_assignments: usize,
    pub completion_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IrregularStudent {
    pub student_id: Uuid,
    pub name: String,
    pub sessions_in_window: usize,
    pub max_gap_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelayedStudent {
    pub student_id: Uuid,
    pub name: String,
    pub months_enrolled: f64,
    pub expected_sessions: f64,
    pub actual_sessions: usize,
    pub progress_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusySlot {
    pub student_name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySchedule {
    pub faculty_id: Uuid,
    pub date: NaiveDate,
    pub busy_minutes: i64,
    pub free_minutes: i64,
    pub utilization_pct: f64,
    pub slots: Vec<BusySlot>,
    /// Inconsistencies found while computing (overlaps, sessions outside the
    /// working window). Non-fatal: the numbers above are best-effort.
    pub anomalies: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInterval {
    pub subject_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreCard {
    pub overall_score: f64,
    pub grade: Grade,
    pub breakdown: std::collections::BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary<T> {
    pub count: usize,
    pub top: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsSummary {
    pub scope: String,
    pub as_of: NaiveDate,
    pub at_risk: CategorySummary<AtRiskStudent>,
    pub extended: CategorySummary<ExtendedStudent>,
    pub nearing_completion: CategorySummary<NearingCompletionStudent>,
    pub irregular: CategorySummary<IrregularStudent>,
    pub delayed: CategorySummary<DelayedStudent>,
}
