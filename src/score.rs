use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::config;
use crate::models::{
    Assignment, AttendanceRecord, FeedbackResponse, Grade, ScoreCard, Student, StudentStatus,
};
use crate::risk;

// Composite weights. These are design constants, not tunables: the three
// scorecards are only comparable across centers/faculty/students because
// everyone is weighed the same way.
pub const CENTER_ATTENDANCE_WEIGHT: f64 = 0.4;
pub const CENTER_SATISFACTION_WEIGHT: f64 = 0.3;
pub const CENTER_COMPLETION_WEIGHT: f64 = 0.3;

pub const FACULTY_QUALITY_POINTS: f64 = 30.0;
pub const FACULTY_CONSISTENCY_POINTS: f64 = 30.0;
pub const FACULTY_ENGAGEMENT_POINTS: f64 = 20.0;
pub const FACULTY_REACH_POINTS: f64 = 20.0;

pub const STUDENT_COMPLETION_WEIGHT: f64 = 0.30;
pub const STUDENT_CONSISTENCY_WEIGHT: f64 = 0.25;
pub const STUDENT_EFFICIENCY_WEIGHT: f64 = 0.25;
pub const STUDENT_PROGRESS_WEIGHT: f64 = 0.20;

/// A student is expected to attend 12 sessions a month.
const EXPECTED_MONTHLY_SESSIONS: f64 = 12.0;
/// Covering 5 topics an hour is treated as the quality ceiling.
const TOPICS_PER_HOUR_CEILING: f64 = 5.0;
/// Consistency looks at the trailing 8 weeks.
const CONSISTENCY_WEEKS: i64 = 8;
/// More than 10 sessions per assigned student earns no extra engagement.
const ENGAGEMENT_SESSION_CAP: f64 = 10.0;
/// Reach counts assigned students seen within the last 7 days.
const REACH_WINDOW_DAYS: i64 = 7;
/// Covering 2 topics per session is full efficiency for a student.
const TARGET_TOPICS_PER_SESSION: f64 = 2.0;

pub fn grade_for(score: f64) -> Grade {
    if score >= 90.0 {
        Grade::APlus
    } else if score >= 80.0 {
        Grade::A
    } else if score >= 70.0 {
        Grade::BPlus
    } else if score >= 60.0 {
        Grade::B
    } else if score >= 50.0 {
        Grade::C
    } else {
        Grade::D
    }
}

fn cap(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Distinct week buckets (counted back from `today`) with at least one
/// session, out of the trailing `weeks`.
fn active_weeks(records: &[AttendanceRecord], today: NaiveDate, weeks: i64) -> i64 {
    let mut buckets: HashSet<i64> = HashSet::new();
    for record in records {
        let days_ago = (today - record.attended_on).num_days();
        if days_ago < 0 || days_ago >= weeks * 7 {
            continue;
        }
        buckets.insert(days_ago / 7);
    }
    buckets.len() as i64
}

fn card(overall: f64, breakdown: BTreeMap<String, f64>) -> ScoreCard {
    let overall_score = cap(overall);
    ScoreCard {
        overall_score,
        grade: grade_for(overall_score),
        breakdown,
    }
}

/// Center health: attendance volume against a 12-sessions-per-student month,
/// mean feedback satisfaction scaled from 1-5 to 0-100, and the share of
/// students who finished. `month_records` is the trailing month of sessions
/// for the center.
pub fn center_score(
    students: &[Student],
    month_records: &[AttendanceRecord],
    feedback: &[FeedbackResponse],
) -> ScoreCard {
    let active = students
        .iter()
        .filter(|s| s.status == StudentStatus::Active)
        .count();
    let completed = students
        .iter()
        .filter(|s| s.status == StudentStatus::Completed)
        .count();

    let attendance_rate = cap(
        ratio(
            month_records.len() as f64,
            active as f64 * EXPECTED_MONTHLY_SESSIONS,
        ) * 100.0,
    );

    let responses: Vec<i32> = feedback
        .iter()
        .filter(|f| f.completed)
        .map(|f| f.satisfaction)
        .collect();
    let satisfaction = ratio(responses.iter().sum::<i32>() as f64, responses.len() as f64);

    let completion_rate = cap(ratio(completed as f64, students.len() as f64) * 100.0);

    let overall = CENTER_ATTENDANCE_WEIGHT * attendance_rate
        + CENTER_SATISFACTION_WEIGHT * (satisfaction * 20.0)
        + CENTER_COMPLETION_WEIGHT * completion_rate;

    let mut breakdown = BTreeMap::new();
    breakdown.insert("attendance_rate".to_string(), attendance_rate);
    breakdown.insert("satisfaction".to_string(), satisfaction);
    breakdown.insert("completion_rate".to_string(), completion_rate);
    card(overall, breakdown)
}

/// Faculty utilization quality. `assignments` are the faculty's active
/// assignments; `records` are the sessions they marked.
pub fn faculty_score(
    assignments: &[Assignment],
    records: &[AttendanceRecord],
    today: NaiveDate,
) -> ScoreCard {
    let total_minutes: i64 = records.iter().map(|r| r.duration_minutes).sum();
    let total_topics: usize = records.iter().map(|r| r.topic_ids.len()).sum();
    let topics_per_hour = ratio(total_topics as f64, total_minutes as f64 / 60.0);
    let quality =
        (topics_per_hour / TOPICS_PER_HOUR_CEILING).min(1.0) * FACULTY_QUALITY_POINTS;

    let consistency = active_weeks(records, today, CONSISTENCY_WEEKS) as f64
        / CONSISTENCY_WEEKS as f64
        * FACULTY_CONSISTENCY_POINTS;

    let assigned: HashSet<Uuid> = assignments
        .iter()
        .filter(|a| a.active)
        .map(|a| a.student_id)
        .collect();
    let sessions_per_student = ratio(records.len() as f64, assigned.len() as f64);
    let engagement =
        (sessions_per_student / ENGAGEMENT_SESSION_CAP).min(1.0) * FACULTY_ENGAGEMENT_POINTS;

    let reach_cutoff = today - Duration::days(REACH_WINDOW_DAYS);
    let seen_recently: HashSet<Uuid> = records
        .iter()
        .filter(|r| r.attended_on >= reach_cutoff && assigned.contains(&r.student_id))
        .map(|r| r.student_id)
        .collect();
    let reach =
        ratio(seen_recently.len() as f64, assigned.len() as f64) * FACULTY_REACH_POINTS;

    let mut breakdown = BTreeMap::new();
    breakdown.insert("session_quality".to_string(), quality);
    breakdown.insert("consistency".to_string(), consistency);
    breakdown.insert("engagement".to_string(), engagement);
    breakdown.insert("recent_reach".to_string(), reach);
    card(quality + consistency + engagement + reach, breakdown)
}

/// Student standing: completion against the 20-sessions-per-subject baseline,
/// week-over-week consistency, topic-coverage efficiency, and progress against
/// the six-month expectation. Each sub-metric is capped at 100 before its
/// weight applies.
pub fn student_score(
    student: &Student,
    records: &[AttendanceRecord],
    assignments: &[Assignment],
    today: NaiveDate,
) -> ScoreCard {
    let active_assignments = assignments
        .iter()
        .filter(|a| a.student_id == student.id && a.active)
        .count();
    let sessions = records.len();

    let completion = cap(
        ratio(
            sessions as f64,
            (active_assignments as i64 * config::SESSIONS_PER_SUBJECT) as f64,
        ) * 100.0,
    );

    let consistency = cap(
        active_weeks(records, today, CONSISTENCY_WEEKS) as f64 / CONSISTENCY_WEEKS as f64
            * 100.0,
    );

    let total_topics: usize = records.iter().map(|r| r.topic_ids.len()).sum();
    let topics_per_session = ratio(total_topics as f64, sessions as f64);
    let efficiency = cap(topics_per_session / TARGET_TOPICS_PER_SESSION * 100.0);

    let months_enrolled =
        (today - student.enrolled_on).num_days() as f64 / config::DAYS_PER_MONTH as f64;
    let expected = risk::expected_sessions(active_assignments, months_enrolled);
    let progress = cap(ratio(sessions as f64, expected) * 100.0);

    let overall = STUDENT_COMPLETION_WEIGHT * completion
        + STUDENT_CONSISTENCY_WEIGHT * consistency
        + STUDENT_EFFICIENCY_WEIGHT * efficiency
        + STUDENT_PROGRESS_WEIGHT * progress;

    let mut breakdown = BTreeMap::new();
    breakdown.insert("attendance_completion".to_string(), completion);
    breakdown.insert("consistency".to_string(), consistency);
    breakdown.insert("efficiency".to_string(), efficiency);
    breakdown.insert("progress".to_string(), progress);
    card(overall, breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    fn student(status: StudentStatus, enrolled_days_ago: i64) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: "Meera Nair".to_string(),
            center_id: Uuid::new_v4(),
            enrolled_on: today() - Duration::days(enrolled_days_ago),
            status,
        }
    }

    fn session(
        student_id: Uuid,
        faculty_id: Uuid,
        days_ago: i64,
        minutes: i64,
        topics: usize,
    ) -> AttendanceRecord {
        let in_time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            student_name: String::new(),
            assignment_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            attended_on: today() - Duration::days(days_ago),
            in_time,
            out_time: in_time + Duration::minutes(minutes),
            duration_minutes: minutes,
            topic_ids: (0..topics).map(|_| Uuid::new_v4()).collect(),
            marked_by: faculty_id,
            backdated: false,
        }
    }

    fn assignment(student_id: Uuid, faculty_id: Uuid) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            student_id,
            subject_id: Uuid::new_v4(),
            faculty_id,
            start_date: today() - Duration::days(120),
            end_date: None,
            active: true,
        }
    }

    fn feedback(student_id: Uuid, satisfaction: i32) -> FeedbackResponse {
        FeedbackResponse {
            student_id,
            survey_id: Uuid::new_v4(),
            satisfaction,
            completed: true,
        }
    }

    #[test]
    fn grade_boundaries_are_exact() {
        assert_eq!(grade_for(90.0), Grade::APlus);
        assert_eq!(grade_for(89.99), Grade::A);
        assert_eq!(grade_for(80.0), Grade::A);
        assert_eq!(grade_for(70.0), Grade::BPlus);
        assert_eq!(grade_for(60.0), Grade::B);
        assert_eq!(grade_for(50.0), Grade::C);
        assert_eq!(grade_for(49.99), Grade::D);
    }

    #[test]
    fn empty_center_scores_zero_without_panicking() {
        let score = center_score(&[], &[], &[]);
        assert_eq!(score.overall_score, 0.0);
        assert_eq!(score.grade, Grade::D);
    }

    #[test]
    fn perfect_center_scores_100() {
        let active = student(StudentStatus::Active, 100);
        let done_a = student(StudentStatus::Completed, 300);
        let done_b = student(StudentStatus::Completed, 300);
        // One active student, 12 sessions this month, top satisfaction, but
        // completion is 2 of 3 students.
        let faculty = Uuid::new_v4();
        let records: Vec<AttendanceRecord> = (0..12)
            .map(|i| session(active.id, faculty, i, 60, 1))
            .collect();
        let responses = vec![feedback(active.id, 5), feedback(done_a.id, 5)];
        let score = center_score(&[active, done_a, done_b], &records, &responses);
        let expected = 0.4 * 100.0 + 0.3 * 100.0 + 0.3 * (2.0 / 3.0 * 100.0);
        assert!((score.overall_score - expected).abs() < 1e-6);
        assert!(score.overall_score <= 100.0);
    }

    #[test]
    fn incomplete_feedback_is_ignored() {
        let active = student(StudentStatus::Active, 100);
        let mut skipped = feedback(active.id, 1);
        skipped.completed = false;
        let score = center_score(&[active], &[], &[skipped]);
        assert_eq!(score.breakdown["satisfaction"], 0.0);
    }

    #[test]
    fn faculty_score_stays_in_bounds() {
        let faculty = Uuid::new_v4();
        let students: Vec<Student> = (0..3).map(|_| student(StudentStatus::Active, 90)).collect();
        let assignments: Vec<Assignment> = students
            .iter()
            .map(|s| assignment(s.id, faculty))
            .collect();
        let mut records = Vec::new();
        for (i, s) in students.iter().enumerate() {
            for week in 0..8 {
                records.push(session(s.id, faculty, week * 7 + i as i64, 60, 10));
            }
        }
        let score = faculty_score(&assignments, &records, today());
        assert!(score.overall_score > 0.0 && score.overall_score <= 100.0);
        // 10 topics per 60-minute session saturates the quality ceiling.
        assert!((score.breakdown["session_quality"] - FACULTY_QUALITY_POINTS).abs() < 1e-9);
        assert!((score.breakdown["consistency"] - FACULTY_CONSISTENCY_POINTS).abs() < 1e-9);
    }

    #[test]
    fn faculty_with_no_assignments_scores_zero_engagement() {
        let faculty = Uuid::new_v4();
        let records = vec![session(Uuid::new_v4(), faculty, 2, 60, 1)];
        let score = faculty_score(&[], &records, today());
        assert_eq!(score.breakdown["engagement"], 0.0);
        assert_eq!(score.breakdown["recent_reach"], 0.0);
    }

    #[test]
    fn student_with_no_assignments_scores_zero_completion() {
        let s = student(StudentStatus::Active, 200);
        let faculty = Uuid::new_v4();
        let records = vec![session(s.id, faculty, 2, 60, 2)];
        let score = student_score(&s, &records, &[], today());
        assert_eq!(score.breakdown["attendance_completion"], 0.0);
        assert_eq!(score.breakdown["progress"], 0.0);
        assert!(score.overall_score >= 0.0 && score.overall_score <= 100.0);
    }

    #[test]
    fn student_sub_metrics_are_capped_before_weighting() {
        let s = student(StudentStatus::Active, 200);
        let faculty = Uuid::new_v4();
        let assignments = vec![assignment(s.id, faculty)];
        // 60 sessions against a 20-session course: raw completion is 300%.
        let records: Vec<AttendanceRecord> = (0..60)
            .map(|i| session(s.id, faculty, i % 56, 60, 5))
            .collect();
        let score = student_score(&s, &records, &assignments, today());
        assert_eq!(score.breakdown["attendance_completion"], 100.0);
        assert!(score.overall_score <= 100.0);
        assert_eq!(score.grade, grade_for(score.overall_score));
    }
}
