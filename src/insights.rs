use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::models::{
    Assignment, AttendanceRecord, CategorySummary, InsightsSummary, Student,
};
use crate::risk;

const TOP_N: usize = 10;

fn summarize<T>(mut entries: Vec<T>) -> CategorySummary<T> {
    let count = entries.len();
    entries.truncate(TOP_N);
    CategorySummary {
        count,
        top: entries,
    }
}

/// Cross-category risk rollup for one scope (a center, or everything).
/// Runs every classifier against the same snapshot and reference date, so the
/// result is reproducible and calling it twice yields identical output.
pub fn build_summary(
    scope: &str,
    students: &[Student],
    records: &[AttendanceRecord],
    assignments: &[Assignment],
    today: NaiveDate,
    config: &EngineConfig,
) -> InsightsSummary {
    InsightsSummary {
        scope: scope.to_string(),
        as_of: today,
        at_risk: summarize(risk::at_risk(students, records, today, config)),
        extended: summarize(risk::extended(students, records, today, config)),
        nearing_completion: summarize(risk::nearing_completion(
            students,
            records,
            assignments,
            config,
        )),
        irregular: summarize(risk::irregular(students, records, today, config)),
        delayed: summarize(risk::delayed(
            students,
            records,
            assignments,
            today,
            config,
        )),
    }
}
