use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::config::{self, EngineConfig};
use crate::models::{
    Assignment, AtRiskStudent, AttendanceRecord, DelayedStudent, ExtendedStudent,
    IrregularStudent, NearingCompletionStudent, Student, StudentStatus,
};

fn records_by_student<'a>(
    records: &'a [AttendanceRecord],
) -> HashMap<Uuid, Vec<&'a AttendanceRecord>> {
    let mut map: HashMap<Uuid, Vec<&AttendanceRecord>> = HashMap::new();
    for record in records {
        map.entry(record.student_id).or_default().push(record);
    }
    map
}

fn active_assignment_count(assignments: &[Assignment], student_id: Uuid) -> usize {
    assignments
        .iter()
        .filter(|a| a.student_id == student_id && a.active)
        .count()
}

/// Active students with no session on or after `today - at_risk_days`.
/// Never-attended students qualify with `last_attendance = None` and sort
/// first; the rest sort oldest last attendance first.
pub fn at_risk(
    students: &[Student],
    records: &[AttendanceRecord],
    today: NaiveDate,
    config: &EngineConfig,
) -> Vec<AtRiskStudent> {
    let cutoff = today - Duration::days(config.at_risk_days);
    let by_student = records_by_student(records);

    let mut flagged: Vec<AtRiskStudent> = students
        .iter()
        .filter(|s| s.status == StudentStatus::Active)
        .filter_map(|student| {
            let last_attendance = by_student
                .get(&student.id)
                .and_then(|recs| recs.iter().map(|r| r.attended_on).max());
            if last_attendance.map_or(false, |d| d >= cutoff) {
                return None;
            }
            Some(AtRiskStudent {
                student_id: student.id,
                name: student.name.clone(),
                last_attendance,
                days_since_attendance: last_attendance.map(|d| (today - d).num_days()),
            })
        })
        .collect();

    // Option orders None first, which is exactly "most overdue first".
    flagged.sort_by(|a, b| {
        a.last_attendance
            .cmp(&b.last_attendance)
            .then_with(|| a.name.cmp(&b.name))
    });
    flagged
}

/// Active students enrolled longer than the threshold, earliest first.
pub fn extended(
    students: &[Student],
    records: &[AttendanceRecord],
    today: NaiveDate,
    config: &EngineConfig,
) -> Vec<ExtendedStudent> {
    let cutoff = today - Duration::days(config.extended_months * config::DAYS_PER_MONTH);
    let by_student = records_by_student(records);

    let mut flagged: Vec<ExtendedStudent> = students
        .iter()
        .filter(|s| s.status == StudentStatus::Active && s.enrolled_on <= cutoff)
        .map(|student| ExtendedStudent {
            student_id: student.id,
            name: student.name.clone(),
            enrolled_on: student.enrolled_on,
            days_enrolled: (today - student.enrolled_on).num_days(),
            attendance_count: by_student.get(&student.id).map_or(0, |r| r.len()),
        })
        .collect();

    flagged.sort_by(|a, b| a.enrolled_on.cmp(&b.enrolled_on).then_with(|| a.name.cmp(&b.name)));
    flagged
}

/// Active students whose attendance count has reached the completion
/// threshold against the 20-sessions-per-subject baseline. Students with no
/// active assignment have undefined completion and are skipped.
pub fn nearing_completion(
    students: &[Student],
    records: &[AttendanceRecord],
    assignments: &[Assignment],
    config: &EngineConfig,
) -> Vec<NearingCompletionStudent> {
    let by_student = records_by_student(records);

    let mut flagged: Vec<NearingCompletionStudent> = students
        .iter()
        .filter(|s| s.status == StudentStatus::Active)
        .filter_map(|student| {
            let active_assignments = active_assignment_count(assignments, student.id);
            if active_assignments == 0 {
                return None;
            }
            let attendance_count = by_student.get(&student.id).map_or(0, |r| r.len());
            let full_course = (active_assignments as i64 * config::SESSIONS_PER_SUBJECT) as f64;
            let completion_pct = attendance_count as f64 / full_course * 100.0;
            if completion_pct < config.completion_threshold_pct {
                return None;
            }
            Some(NearingCompletionStudent {
                student_id: student.id,
                name: student.name.clone(),
                attendance_count,
                active_assignments,
                completion_pct,
            })
        })
        .collect();

    flagged.sort_by(|a, b| {
        b.completion_pct
            .partial_cmp(&a.completion_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    flagged
}

/// Gap over ascending session dates; repeated sessions on one date count as
/// a zero gap.
fn max_session_gap(dates: &mut Vec<NaiveDate>) -> i64 {
    dates.sort();
    dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .max()
        .unwrap_or(0)
}

/// Active students attending often enough to judge (>= `irregular_min_sessions`
/// in the window) whose largest gap between session dates exceeds the
/// threshold. Largest gap first. Pure over its inputs: rerunning on an
/// unchanged snapshot returns the identical ordered list.
pub fn irregular(
    students: &[Student],
    records: &[AttendanceRecord],
    today: NaiveDate,
    config: &EngineConfig,
) -> Vec<IrregularStudent> {
    let start = today - Duration::days(config.irregular_window_days);
    let by_student = records_by_student(records);

    let mut flagged: Vec<IrregularStudent> = students
        .iter()
        .filter(|s| s.status == StudentStatus::Active)
        .filter_map(|student| {
            let mut dates: Vec<NaiveDate> = by_student
                .get(&student.id)
                .map(|recs| {
                    recs.iter()
                        .map(|r| r.attended_on)
                        .filter(|d| *d >= start && *d <= today)
                        .collect()
                })
                .unwrap_or_default();
            if dates.len() < config.irregular_min_sessions {
                return None;
            }
            let max_gap_days = max_session_gap(&mut dates);
            if max_gap_days <= config.gap_threshold_days {
                return None;
            }
            Some(IrregularStudent {
                student_id: student.id,
                name: student.name.clone(),
                sessions_in_window: dates.len(),
                max_gap_days,
            })
        })
        .collect();

    flagged.sort_by(|a, b| {
        b.max_gap_days
            .cmp(&a.max_gap_days)
            .then_with(|| a.name.cmp(&b.name))
    });
    flagged
}

/// Expected sessions normalized to a six-month course: each assignment is
/// worth 20 sessions spread over six months of enrollment.
pub fn expected_sessions(assignment_count: usize, months_enrolled: f64) -> f64 {
    assignment_count as f64 * months_enrolled * config::SESSIONS_PER_SUBJECT as f64
        / config::BASELINE_COURSE_MONTHS
}

/// Active students enrolled past the threshold whose actual session count
/// falls below the progress cutoff. Zero-assignment students are excluded.
/// Lowest progress first.
pub fn delayed(
    students: &[Student],
    records: &[AttendanceRecord],
    assignments: &[Assignment],
    today: NaiveDate,
    config: &EngineConfig,
) -> Vec<DelayedStudent> {
    let by_student = records_by_student(records);

    let mut flagged: Vec<DelayedStudent> = students
        .iter()
        .filter(|s| s.status == StudentStatus::Active)
        .filter_map(|student| {
            let days_enrolled = (today - student.enrolled_on).num_days();
            if days_enrolled < config.delayed_months * config::DAYS_PER_MONTH {
                return None;
            }
            let assignment_count = active_assignment_count(assignments, student.id);
            if assignment_count == 0 {
                return None;
            }
            let months_enrolled = days_enrolled as f64 / config::DAYS_PER_MONTH as f64;
            let expected = expected_sessions(assignment_count, months_enrolled);
            let actual_sessions = by_student.get(&student.id).map_or(0, |r| r.len());
            let progress_pct = if expected <= 0.0 {
                0.0
            } else {
                actual_sessions as f64 / expected * 100.0
            };
            if progress_pct >= config.progress_threshold_pct {
                return None;
            }
            Some(DelayedStudent {
                student_id: student.id,
                name: student.name.clone(),
                months_enrolled,
                expected_sessions: expected,
                actual_sessions,
                progress_pct,
            })
        })
        .collect();

    flagged.sort_by(|a, b| {
        a.progress_pct
            .partial_cmp(&b.progress_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    fn student(name: &str, enrolled_days_ago: i64) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
            center_id: Uuid::new_v4(),
            enrolled_on: today() - Duration::days(enrolled_days_ago),
            status: StudentStatus::Active,
        }
    }

    fn session(student_id: Uuid, days_ago: i64) -> AttendanceRecord {
        let in_time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            student_name: String::new(),
            assignment_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            attended_on: today() - Duration::days(days_ago),
            in_time,
            out_time: in_time + Duration::minutes(60),
            duration_minutes: 60,
            topic_ids: vec![Uuid::new_v4()],
            marked_by: Uuid::new_v4(),
            backdated: false,
        }
    }

    fn assignment(student_id: Uuid) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            student_id,
            subject_id: Uuid::new_v4(),
            faculty_id: Uuid::new_v4(),
            start_date: today() - Duration::days(120),
            end_date: None,
            active: true,
        }
    }

    #[test]
    fn never_attended_student_is_at_risk_with_null_last_attendance() {
        let students = vec![student("Meera Nair", 10)];
        let flagged = at_risk(&students, &[], today(), &EngineConfig::default());
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].last_attendance, None);
        assert_eq!(flagged[0].days_since_attendance, None);
    }

    #[test]
    fn recent_attendance_clears_at_risk() {
        let s = student("Ishaan Rao", 60);
        let records = vec![session(s.id, 3)];
        let flagged = at_risk(&[s], &records, today(), &EngineConfig::default());
        assert!(flagged.is_empty());
    }

    #[test]
    fn at_risk_is_monotonic_in_days_threshold() {
        let students = vec![
            student("Meera Nair", 90),
            student("Ishaan Rao", 90),
            student("Sana Qureshi", 90),
        ];
        let records = vec![
            session(students[0].id, 2),
            session(students[1].id, 10),
            session(students[2].id, 25),
        ];
        let mut config = EngineConfig::default();
        let mut previous = usize::MAX;
        for days in [1, 7, 14, 30, 60] {
            config.at_risk_days = days;
            let count = at_risk(&students, &records, today(), &config).len();
            assert!(count <= previous, "threshold {days} grew the at-risk set");
            previous = count;
        }
    }

    #[test]
    fn at_risk_orders_most_overdue_first() {
        let students = vec![
            student("Meera Nair", 90),
            student("Ishaan Rao", 90),
            student("Sana Qureshi", 90),
        ];
        let records = vec![session(students[0].id, 10), session(students[2].id, 40)];
        let flagged = at_risk(&students, &records, today(), &EngineConfig::default());
        assert_eq!(flagged.len(), 3);
        assert_eq!(flagged[0].name, "Ishaan Rao"); // never attended
        assert_eq!(flagged[1].name, "Sana Qureshi");
        assert_eq!(flagged[2].name, "Meera Nair");
    }

    #[test]
    fn extended_flags_long_enrollments_earliest_first() {
        let students = vec![
            student("Meera Nair", 200),
            student("Ishaan Rao", 400),
            student("Sana Qureshi", 30),
        ];
        let records = vec![session(students[0].id, 5)];
        let flagged = extended(&students, &records, today(), &EngineConfig::default());
        assert_eq!(flagged.len(), 2);
        assert_eq!(flagged[0].name, "Ishaan Rao");
        assert_eq!(flagged[0].days_enrolled, 400);
        assert_eq!(flagged[0].attendance_count, 0);
        assert_eq!(flagged[1].attendance_count, 1);
    }

    #[test]
    fn forty_sessions_on_one_assignment_is_nearing_completion() {
        let s = student("Meera Nair", 200);
        let assignments = vec![assignment(s.id)];
        let records: Vec<AttendanceRecord> =
            (0..40).map(|i| session(s.id, i % 90)).collect();
        let flagged =
            nearing_completion(&[s], &records, &assignments, &EngineConfig::default());
        assert_eq!(flagged.len(), 1);
        assert!((flagged[0].completion_pct - 200.0).abs() < 1e-9);
    }

    #[test]
    fn zero_assignments_skip_completion_check() {
        let s = student("Meera Nair", 200);
        let records: Vec<AttendanceRecord> = (0..40).map(|i| session(s.id, i % 90)).collect();
        let flagged = nearing_completion(&[s], &records, &[], &EngineConfig::default());
        assert!(flagged.is_empty());
    }

    #[test]
    fn gap_of_eight_days_is_irregular() {
        let s = student("Meera Nair", 60);
        // Sessions on window days 1, 2, 10 plus enough volume to qualify.
        let records = vec![
            session(s.id, 29),
            session(s.id, 28),
            session(s.id, 20),
            session(s.id, 19),
            session(s.id, 18),
        ];
        let flagged = irregular(&[s], &records, today(), &EngineConfig::default());
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].max_gap_days, 8);
        assert_eq!(flagged[0].sessions_in_window, 5);
    }

    #[test]
    fn same_day_sessions_count_as_zero_gap() {
        let s = student("Meera Nair", 60);
        let records = vec![
            session(s.id, 5),
            session(s.id, 5),
            session(s.id, 4),
            session(s.id, 3),
            session(s.id, 2),
        ];
        let flagged = irregular(&[s], &records, today(), &EngineConfig::default());
        assert!(flagged.is_empty());
    }

    #[test]
    fn too_few_sessions_never_flag_irregular() {
        let s = student("Meera Nair", 60);
        let records = vec![session(s.id, 29), session(s.id, 1)];
        let flagged = irregular(&[s], &records, today(), &EngineConfig::default());
        assert!(flagged.is_empty());
    }

    #[test]
    fn irregular_is_idempotent_on_a_fixed_snapshot() {
        let students = vec![student("Meera Nair", 60), student("Ishaan Rao", 60)];
        let mut records = Vec::new();
        for s in &students {
            for days_ago in [29, 28, 15, 14, 2] {
                records.push(session(s.id, days_ago));
            }
        }
        let config = EngineConfig::default();
        let first = irregular(&students, &records, today(), &config);
        let second = irregular(&students, &records, today(), &config);
        let ids_first: Vec<Uuid> = first.iter().map(|f| f.student_id).collect();
        let ids_second: Vec<Uuid> = second.iter().map(|f| f.student_id).collect();
        assert_eq!(ids_first, ids_second);
    }

    #[test]
    fn slow_progress_after_six_months_is_delayed() {
        let s = student("Meera Nair", 180);
        let assignments = vec![assignment(s.id)];
        // Six months in, one assignment expects 20 sessions; 5 is 25%.
        let records: Vec<AttendanceRecord> = (0..5).map(|i| session(s.id, i * 10)).collect();
        let flagged = delayed(&[s], &records, &assignments, today(), &EngineConfig::default());
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].actual_sessions, 5);
        assert!((flagged[0].expected_sessions - 20.0).abs() < 1e-9);
        assert!((flagged[0].progress_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn recent_enrollments_are_not_judged_delayed() {
        let s = student("Meera Nair", 90);
        let assignments = vec![assignment(s.id)];
        let flagged = delayed(&[s], &[], &assignments, today(), &EngineConfig::default());
        assert!(flagged.is_empty());
    }
}
