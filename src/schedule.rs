use chrono::{NaiveDate, NaiveTime, Timelike};
use uuid::Uuid;

use crate::models::{AttendanceRecord, BusySlot, DaySchedule, ScheduleInterval};

/// Working day runs 06:00-22:00.
pub const DAY_START_MINUTE: i64 = 6 * 60;
pub const DAY_END_MINUTE: i64 = 22 * 60;
pub const WORKING_MINUTES: i64 = DAY_END_MINUTE - DAY_START_MINUTE;

fn minute_of_day(time: NaiveTime) -> i64 {
    time.hour() as i64 * 60 + time.minute() as i64
}

/// Free/busy breakdown for one faculty member on one date. Overlapping or
/// out-of-window sessions are data errors: they are clipped, reported in
/// `anomalies`, and the computation continues. The invariants
/// `busy + free == WORKING_MINUTES` and `0 <= utilization <= 100` always hold.
pub fn day_schedule(
    faculty_id: Uuid,
    date: NaiveDate,
    records: &[AttendanceRecord],
) -> DaySchedule {
    let mut sessions: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| r.marked_by == faculty_id && r.attended_on == date)
        .collect();
    sessions.sort_by_key(|r| (r.in_time, r.out_time));

    let mut anomalies = Vec::new();
    let mut slots = Vec::new();
    let mut busy_minutes = 0i64;
    let mut cursor = DAY_START_MINUTE;

    for record in sessions {
        let raw_start = minute_of_day(record.in_time);
        let raw_end = minute_of_day(record.out_time);

        if raw_start < DAY_START_MINUTE || raw_end > DAY_END_MINUTE {
            anomalies.push(format!(
                "session {} at {}-{} falls outside the 06:00-22:00 working day",
                record.id, record.in_time, record.out_time
            ));
        }
        let mut start = raw_start.clamp(DAY_START_MINUTE, DAY_END_MINUTE);
        let end = raw_end.clamp(DAY_START_MINUTE, DAY_END_MINUTE);

        if start < cursor {
            // One faculty member cannot run two sessions at once. Keep the
            // later record's tail (last write wins) and flag it.
            anomalies.push(format!(
                "session {} overlaps a previous session at {}",
                record.id, record.in_time
            ));
            start = cursor;
        }
        if end <= start {
            continue;
        }

        busy_minutes += end - start;
        cursor = end;
        slots.push(BusySlot {
            student_name: record.student_name.clone(),
            start: record.in_time,
            end: record.out_time,
            minutes: end - start,
        });
    }

    let free_minutes = WORKING_MINUTES - busy_minutes;
    DaySchedule {
        faculty_id,
        date,
        busy_minutes,
        free_minutes,
        utilization_pct: busy_minutes as f64 / WORKING_MINUTES as f64 * 100.0,
        slots,
        anomalies,
    }
}

/// Gantt export: every session the faculty ran in `[from, to]`, in
/// chronological order, as full datetime intervals.
pub fn schedule_intervals(
    faculty_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    records: &[AttendanceRecord],
) -> Vec<ScheduleInterval> {
    let mut intervals: Vec<ScheduleInterval> = records
        .iter()
        .filter(|r| r.marked_by == faculty_id && r.attended_on >= from && r.attended_on <= to)
        .map(|r| ScheduleInterval {
            subject_id: r.subject_id,
            student_id: r.student_id,
            student_name: r.student_name.clone(),
            start: r.attended_on.and_time(r.in_time),
            end: r.attended_on.and_time(r.out_time),
        })
        .collect();
    intervals.sort_by_key(|i| (i.start, i.end));
    intervals
}
