use std::fmt::Write;

use crate::models::{InsightsSummary, ScoreCard};

/// Markdown rendering of an insights summary, optionally with the center's
/// scorecard. Pure formatting over already-computed values.
pub fn build_report(summary: &InsightsSummary, center_card: Option<&ScoreCard>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Insights Report");
    let _ = writeln!(
        output,
        "Scope: {} (as of {})",
        summary.scope, summary.as_of
    );

    if let Some(card) = center_card {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Center Performance");
        let _ = writeln!(
            output,
            "Overall score {:.1} (grade {})",
            card.overall_score, card.grade
        );
        for (component, points) in &card.breakdown {
            let _ = writeln!(output, "- {}: {:.1}", component, points);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## At Risk ({})", summary.at_risk.count);
    if summary.at_risk.top.is_empty() {
        let _ = writeln!(output, "No students flagged.");
    }
    for entry in &summary.at_risk.top {
        match entry.last_attendance {
            Some(date) => {
                let _ = writeln!(output, "- {} last attended {}", entry.name, date);
            }
            None => {
                let _ = writeln!(output, "- {} has never attended", entry.name);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Extended Enrollment ({})", summary.extended.count);
    if summary.extended.top.is_empty() {
        let _ = writeln!(output, "No students flagged.");
    }
    for entry in &summary.extended.top {
        let _ = writeln!(
            output,
            "- {} enrolled {} ({} days, {} sessions)",
            entry.name, entry.enrolled_on, entry.days_enrolled, entry.attendance_count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Nearing Completion ({})",
        summary.nearing_completion.count
    );
    if summary.nearing_completion.top.is_empty() {
        let _ = writeln!(output, "No students flagged.");
    }
    for entry in &summary.nearing_completion.top {
        let _ = writeln!(
            output,
            "- {} at {:.0}% ({} sessions across {} subjects)",
            entry.name, entry.completion_pct, entry.attendance_count, entry.active_assignments
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Irregular Attendance ({})", summary.irregular.count);
    if summary.irregular.top.is_empty() {
        let _ = writeln!(output, "No students flagged.");
    }
    for entry in &summary.irregular.top {
        let _ = writeln!(
            output,
            "- {} max gap {} days over {} sessions",
            entry.name, entry.max_gap_days, entry.sessions_in_window
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Delayed Progress ({})", summary.delayed.count);
    if summary.delayed.top.is_empty() {
        let _ = writeln!(output, "No students flagged.");
    }
    for entry in &summary.delayed.top {
        let _ = writeln!(
            output,
            "- {} at {:.0}% progress ({} of {:.0} expected sessions)",
            entry.name, entry.progress_pct, entry.actual_sessions, entry.expected_sessions
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::insights;
    use crate::models::{Student, StudentStatus};
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    #[test]
    fn report_lists_every_category() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let students = vec![Student {
            id: Uuid::new_v4(),
            name: "Meera Nair".to_string(),
            center_id: Uuid::new_v4(),
            enrolled_on: today - Duration::days(10),
            status: StudentStatus::Active,
        }];
        let summary = insights::build_summary(
            "main-center",
            &students,
            &[],
            &[],
            today,
            &EngineConfig::default(),
        );
        let report = build_report(&summary, None);
        assert!(report.contains("# Attendance Insights Report"));
        assert!(report.contains("## At Risk (1)"));
        assert!(report.contains("Meera Nair has never attended"));
        assert!(report.contains("## Extended Enrollment (0)"));
        assert!(report.contains("## Nearing Completion (0)"));
        assert!(report.contains("## Irregular Attendance (0)"));
        assert!(report.contains("## Delayed Progress (0)"));
    }
}
