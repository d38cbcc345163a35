use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{AttendanceRecord, WindowMetrics};

/// Inclusive on both ends; `None` bounds are open.
pub fn in_window(
    date: NaiveDate,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> bool {
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

/// Primitive aggregates over a record set, optionally restricted to
/// `[start, end]`. An empty selection yields all-zero metrics.
pub fn window_metrics(
    records: &[AttendanceRecord],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> WindowMetrics {
    let mut total_sessions = 0usize;
    let mut total_minutes = 0i64;
    let mut students: HashSet<uuid::Uuid> = HashSet::new();
    let mut subjects: HashSet<uuid::Uuid> = HashSet::new();

    for record in records {
        if !in_window(record.attended_on, start, end) {
            continue;
        }
        total_sessions += 1;
        total_minutes += record.duration_minutes;
        students.insert(record.student_id);
        subjects.insert(record.subject_id);
    }

    if total_sessions == 0 {
        return WindowMetrics::zero();
    }

    WindowMetrics {
        total_sessions,
        total_minutes,
        avg_session_minutes: total_minutes as f64 / total_sessions as f64,
        distinct_students: students.len(),
        distinct_subjects: subjects.len(),
    }
}

/// Rate per `days`, dividing by days directly rather than rounding to weeks.
/// Zero or negative spans yield 0 rather than a nonsense rate.
pub fn per_day_rate(count: f64, days: i64) -> f64 {
    if days <= 0 {
        return 0.0;
    }
    count / days as f64
}
