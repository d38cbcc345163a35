use chrono::{Duration, NaiveDate};

use crate::aggregate;
use crate::models::{AttendanceRecord, AttendanceVelocity, LearningVelocity};

/// Attendance pace for one student over the trailing window ending at `today`.
/// `records` should already be scoped to that student. A student with no
/// sessions in the window gets all-zero rates, never an error.
pub fn attendance_velocity(
    records: &[AttendanceRecord],
    today: NaiveDate,
    window_days: i64,
) -> AttendanceVelocity {
    let start = today - Duration::days(window_days);
    let metrics = aggregate::window_metrics(records, Some(start), Some(today));

    let sessions_per_week =
        aggregate::per_day_rate(metrics.total_sessions as f64, window_days) * 7.0;

    AttendanceVelocity {
        window_days,
        total_sessions: metrics.total_sessions,
        sessions_per_week,
        avg_session_minutes: metrics.avg_session_minutes,
        total_learning_hours: metrics.total_minutes as f64 / 60.0,
    }
}

/// Learning pace over the student's entire history, not windowed. Both ratios
/// are guarded: no sessions and no topics each collapse to 0.
pub fn learning_velocity(records: &[AttendanceRecord]) -> LearningVelocity {
    let total_sessions = records.len();
    let total_topics: usize = records.iter().map(|r| r.topic_ids.len()).sum();
    let total_minutes: i64 = records.iter().map(|r| r.duration_minutes).sum();

    let topics_per_session = if total_sessions == 0 {
        0.0
    } else {
        total_topics as f64 / total_sessions as f64
    };
    let minutes_per_topic = if total_topics == 0 {
        0.0
    } else {
        total_minutes as f64 / total_topics as f64
    };

    LearningVelocity {
        total_sessions,
        total_topics,
        topics_per_session,
        minutes_per_topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn session(days_ago: i64, minutes: i64, topics: usize, today: NaiveDate) -> AttendanceRecord {
        let in_time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            student_name: "Ishaan Rao".to_string(),
            assignment_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            attended_on: today - Duration::days(days_ago),
            in_time,
            out_time: in_time + Duration::minutes(minutes),
            duration_minutes: minutes,
            topic_ids: (0..topics).map(|_| Uuid::new_v4()).collect(),
            marked_by: Uuid::new_v4(),
            backdated: false,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 15).unwrap()
    }

    #[test]
    fn window_count_matches_raw_count() {
        let records = vec![
            session(1, 60, 1, today()),
            session(10, 45, 2, today()),
            session(29, 90, 0, today()),
            session(45, 60, 1, today()),
        ];
        let velocity = attendance_velocity(&records, today(), 30);
        assert_eq!(velocity.total_sessions, 3);
        assert!((velocity.sessions_per_week - 3.0 / (30.0 / 7.0)).abs() < 1e-9);
        assert!((velocity.total_learning_hours - 195.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn zero_sessions_yield_zero_rates() {
        let velocity = attendance_velocity(&[], today(), 30);
        assert_eq!(velocity.total_sessions, 0);
        assert_eq!(velocity.sessions_per_week, 0.0);
        assert_eq!(velocity.avg_session_minutes, 0.0);
        assert_eq!(velocity.total_learning_hours, 0.0);
    }

    #[test]
    fn minutes_per_topic_is_zero_without_topics() {
        let records = vec![session(2, 60, 0, today()), session(5, 40, 0, today())];
        let velocity = learning_velocity(&records);
        assert_eq!(velocity.total_topics, 0);
        assert_eq!(velocity.minutes_per_topic, 0.0);
        assert_eq!(velocity.topics_per_session, 0.0);
    }

    #[test]
    fn learning_velocity_uses_full_history() {
        let records = vec![
            session(5, 60, 2, today()),
            session(200, 120, 4, today()),
        ];
        let velocity = learning_velocity(&records);
        assert_eq!(velocity.total_sessions, 2);
        assert_eq!(velocity.total_topics, 6);
        assert!((velocity.topics_per_session - 3.0).abs() < 1e-9);
        assert!((velocity.minutes_per_topic - 30.0).abs() < 1e-9);
    }
}
