use std::collections::HashMap;

use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveTime};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Assignment, AttendanceRecord, FeedbackResponse, Student, StudentStatus};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Attendance events for a scope, fully materialized. Topic sets are attached
/// with a single batched lookup rather than one query per record.
pub async fn fetch_records(
    pool: &PgPool,
    center: Option<&str>,
    student: Option<Uuid>,
    faculty: Option<Uuid>,
    since: Option<NaiveDate>,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut query = String::from(
        "SELECT r.id, r.student_id, st.full_name, r.assignment_id, a.subject_id, \
         r.attended_on, r.in_time, r.out_time, r.duration_minutes, r.marked_by, r.backdated \
         FROM attendance_insights.attendance_records r \
         JOIN attendance_insights.students st ON st.id = r.student_id \
         JOIN attendance_insights.assignments a ON a.id = r.assignment_id \
         JOIN attendance_insights.centers c ON c.id = st.center_id \
         WHERE TRUE",
    );

    let mut position = 0;
    if center.is_some() {
        position += 1;
        query.push_str(&format!(" AND c.code = ${position}"));
    }
    if student.is_some() {
        position += 1;
        query.push_str(&format!(" AND r.student_id = ${position}"));
    }
    if faculty.is_some() {
        position += 1;
        query.push_str(&format!(" AND r.marked_by = ${position}"));
    }
    if since.is_some() {
        position += 1;
        query.push_str(&format!(" AND r.attended_on >= ${position}"));
    }
    query.push_str(" ORDER BY r.attended_on, r.in_time");

    let mut rows = sqlx::query(&query);
    if let Some(value) = center {
        rows = rows.bind(value);
    }
    if let Some(value) = student {
        rows = rows.bind(value);
    }
    if let Some(value) = faculty {
        rows = rows.bind(value);
    }
    if let Some(value) = since {
        rows = rows.bind(value);
    }

    let fetched = rows.fetch_all(pool).await.context("failed to fetch records")?;
    let mut records = Vec::with_capacity(fetched.len());
    for row in fetched {
        records.push(AttendanceRecord {
            id: row.get("id"),
            student_id: row.get("student_id"),
            student_name: row.get("full_name"),
            assignment_id: row.get("assignment_id"),
            subject_id: row.get("subject_id"),
            attended_on: row.get("attended_on"),
            in_time: row.get("in_time"),
            out_time: row.get("out_time"),
            duration_minutes: row.get::<i32, _>("duration_minutes") as i64,
            topic_ids: Vec::new(),
            marked_by: row.get("marked_by"),
            backdated: row.get("backdated"),
        });
    }

    if records.is_empty() {
        return Ok(records);
    }

    let record_ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    let topic_rows = sqlx::query(
        "SELECT record_id, topic_id FROM attendance_insights.attendance_topics \
         WHERE record_id = ANY($1)",
    )
    .bind(&record_ids)
    .fetch_all(pool)
    .await
    .context("failed to fetch record topics")?;

    let mut topics_by_record: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in topic_rows {
        topics_by_record
            .entry(row.get("record_id"))
            .or_default()
            .push(row.get("topic_id"));
    }
    for record in &mut records {
        if let Some(topics) = topics_by_record.remove(&record.id) {
            record.topic_ids = topics;
        }
    }

    Ok(records)
}

pub async fn fetch_students(
    pool: &PgPool,
    center: Option<&str>,
    status: Option<&str>,
) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from(
        "SELECT st.id, st.full_name, st.center_id, st.enrolled_on, st.status \
         FROM attendance_insights.students st \
         JOIN attendance_insights.centers c ON c.id = st.center_id \
         WHERE TRUE",
    );
    let mut position = 0;
    if center.is_some() {
        position += 1;
        query.push_str(&format!(" AND c.code = ${position}"));
    }
    if status.is_some() {
        position += 1;
        query.push_str(&format!(" AND st.status = ${position}"));
    }
    query.push_str(" ORDER BY st.full_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = center {
        rows = rows.bind(value);
    }
    if let Some(value) = status {
        rows = rows.bind(value);
    }

    let fetched = rows.fetch_all(pool).await.context("failed to fetch students")?;
    let mut students = Vec::with_capacity(fetched.len());
    for row in fetched {
        let status_text: String = row.get("status");
        let status = StudentStatus::from_db(&status_text)
            .with_context(|| format!("unknown student status {status_text:?}"))?;
        students.push(Student {
            id: row.get("id"),
            name: row.get("full_name"),
            center_id: row.get("center_id"),
            enrolled_on: row.get("enrolled_on"),
            status,
        });
    }
    Ok(students)
}

pub async fn fetch_assignments(
    pool: &PgPool,
    student: Option<Uuid>,
    faculty: Option<Uuid>,
) -> anyhow::Result<Vec<Assignment>> {
    let mut query = String::from(
        "SELECT id, student_id, subject_id, faculty_id, start_date, end_date, active \
         FROM attendance_insights.assignments WHERE TRUE",
    );
    let mut position = 0;
    if student.is_some() {
        position += 1;
        query.push_str(&format!(" AND student_id = ${position}"));
    }
    if faculty.is_some() {
        position += 1;
        query.push_str(&format!(" AND faculty_id = ${position}"));
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = student {
        rows = rows.bind(value);
    }
    if let Some(value) = faculty {
        rows = rows.bind(value);
    }

    let fetched = rows
        .fetch_all(pool)
        .await
        .context("failed to fetch assignments")?;
    Ok(fetched
        .into_iter()
        .map(|row| Assignment {
            id: row.get("id"),
            student_id: row.get("student_id"),
            subject_id: row.get("subject_id"),
            faculty_id: row.get("faculty_id"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            active: row.get("active"),
        })
        .collect())
}

pub async fn fetch_feedback(
    pool: &PgPool,
    center: Option<&str>,
) -> anyhow::Result<Vec<FeedbackResponse>> {
    let mut query = String::from(
        "SELECT f.student_id, f.survey_id, f.satisfaction, f.completed \
         FROM attendance_insights.feedback_responses f \
         JOIN attendance_insights.students st ON st.id = f.student_id \
         JOIN attendance_insights.centers c ON c.id = st.center_id \
         WHERE TRUE",
    );
    if center.is_some() {
        query.push_str(" AND c.code = $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = center {
        rows = rows.bind(value);
    }

    let fetched = rows.fetch_all(pool).await.context("failed to fetch feedback")?;
    Ok(fetched
        .into_iter()
        .map(|row| FeedbackResponse {
            student_id: row.get("student_id"),
            survey_id: row.get("survey_id"),
            satisfaction: row.get("satisfaction"),
            completed: row.get("completed"),
        })
        .collect())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let center_id = Uuid::parse_str("7a1e4c9e-58d1-4b7a-9f22-4a6f0c3d2b18")?;
    sqlx::query(
        r#"
        INSERT INTO attendance_insights.centers (id, code, name, active)
        VALUES ($1, $2, $3, TRUE)
        ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(center_id)
    .bind("main")
    .bind("Main Learning Center")
    .execute(pool)
    .await?;

    let faculty_id = Uuid::parse_str("b4c2d7a1-0e6f-4f3b-8a5d-1c9e2f7b6a40")?;
    sqlx::query(
        r#"
        INSERT INTO attendance_insights.faculty (id, center_id, full_name, active)
        VALUES ($1, $2, $3, TRUE)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(faculty_id)
    .bind(center_id)
    .bind("Priya Raman")
    .execute(pool)
    .await?;

    let subject_id = Uuid::parse_str("c8f1a2b3-6d4e-4c5a-b7f8-9e0d1c2b3a45")?;
    sqlx::query(
        r#"
        INSERT INTO attendance_insights.subjects (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(subject_id)
    .bind("Algebra")
    .execute(pool)
    .await?;

    let topics = [
        ("d1000000-0000-4000-8000-000000000001", "Linear equations", 1),
        ("d1000000-0000-4000-8000-000000000002", "Quadratics", 2),
        ("d1000000-0000-4000-8000-000000000003", "Polynomials", 3),
        ("d1000000-0000-4000-8000-000000000004", "Inequalities", 4),
    ];
    for (id, name, position) in topics {
        sqlx::query(
            r#"
            INSERT INTO attendance_insights.topics (id, subject_id, name, position)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (subject_id, position) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(subject_id)
        .bind(name)
        .bind(position)
        .execute(pool)
        .await?;
    }

    let students = [
        (
            "e2000000-0000-4000-8000-000000000001",
            "Meera Nair",
            NaiveDate::from_ymd_opt(2025, 9, 1).context("invalid date")?,
            "active",
        ),
        (
            "e2000000-0000-4000-8000-000000000002",
            "Ishaan Rao",
            NaiveDate::from_ymd_opt(2026, 1, 15).context("invalid date")?,
            "active",
        ),
        (
            "e2000000-0000-4000-8000-000000000003",
            "Sana Qureshi",
            NaiveDate::from_ymd_opt(2025, 6, 1).context("invalid date")?,
            "completed",
        ),
    ];
    for (id, name, enrolled_on, status) in students {
        let student_id = Uuid::parse_str(id)?;
        sqlx::query(
            r#"
            INSERT INTO attendance_insights.students
            (id, center_id, full_name, enrolled_on, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(student_id)
        .bind(center_id)
        .bind(name)
        .bind(enrolled_on)
        .bind(status)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO attendance_insights.assignments
            (id, student_id, subject_id, faculty_id, start_date, active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT (student_id, subject_id, start_date) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(subject_id)
        .bind(faculty_id)
        .bind(enrolled_on)
        .execute(pool)
        .await?;
    }

    let sessions = [
        ("seed-att-001", "e2000000-0000-4000-8000-000000000001", "2026-02-02", "09:00", "10:30"),
        ("seed-att-002", "e2000000-0000-4000-8000-000000000001", "2026-02-04", "09:00", "10:00"),
        ("seed-att-003", "e2000000-0000-4000-8000-000000000002", "2026-02-03", "11:00", "12:30"),
        ("seed-att-004", "e2000000-0000-4000-8000-000000000002", "2026-02-10", "11:00", "12:00"),
        ("seed-att-005", "e2000000-0000-4000-8000-000000000003", "2026-01-20", "14:00", "15:30"),
    ];
    for (source_key, student, date, start, end) in sessions {
        let student_id = Uuid::parse_str(student)?;
        let assignment_id: Uuid = sqlx::query(
            "SELECT id FROM attendance_insights.assignments WHERE student_id = $1 LIMIT 1",
        )
        .bind(student_id)
        .fetch_one(pool)
        .await?
        .get("id");

        let attended_on: NaiveDate = date.parse()?;
        let in_time = NaiveTime::parse_from_str(start, "%H:%M")?;
        let out_time = NaiveTime::parse_from_str(end, "%H:%M")?;
        let duration = (out_time - in_time).num_minutes();

        let inserted = sqlx::query(
            r#"
            INSERT INTO attendance_insights.attendance_records
            (id, student_id, assignment_id, attended_on, in_time, out_time,
             duration_minutes, marked_by, backdated, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9)
            ON CONFLICT (source_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(assignment_id)
        .bind(attended_on)
        .bind(in_time)
        .bind(out_time)
        .bind(duration as i32)
        .bind(faculty_id)
        .bind(source_key)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = inserted {
            let record_id: Uuid = row.get("id");
            sqlx::query(
                r#"
                INSERT INTO attendance_insights.attendance_topics (record_id, topic_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(record_id)
            .bind(Uuid::parse_str("d1000000-0000-4000-8000-000000000001")?)
            .execute(pool)
            .await?;
        }
    }

    let feedback = [
        ("e2000000-0000-4000-8000-000000000001", 4),
        ("e2000000-0000-4000-8000-000000000003", 5),
    ];
    for (student, satisfaction) in feedback {
        sqlx::query(
            r#"
            INSERT INTO attendance_insights.feedback_responses
            (id, student_id, survey_id, satisfaction, completed)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Uuid::parse_str(student)?)
        .bind(Uuid::parse_str("f3000000-0000-4000-8000-000000000001")?)
        .bind(satisfaction)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Import attendance events from CSV. Rows are keyed by `source_key`, so
/// re-importing the same file is a no-op; returns the number of new events.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: Uuid,
        assignment_id: Uuid,
        attended_on: NaiveDate,
        in_time: NaiveTime,
        out_time: NaiveTime,
        marked_by: Uuid,
        topic_ids: Option<String>,
        backdated: Option<bool>,
        backdate_reason: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("cannot open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad CSV row {}", line + 2))?;

        let duration = (row.out_time - row.in_time).num_minutes();
        if duration < 0 {
            bail!(
                "row {}: out_time {} precedes in_time {}",
                line + 2,
                row.out_time,
                row.in_time
            );
        }

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let record = sqlx::query(
            r#"
            INSERT INTO attendance_insights.attendance_records
            (id, student_id, assignment_id, attended_on, in_time, out_time,
             duration_minutes, marked_by, backdated, backdate_reason, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.student_id)
        .bind(row.assignment_id)
        .bind(row.attended_on)
        .bind(row.in_time)
        .bind(row.out_time)
        .bind(duration as i32)
        .bind(row.marked_by)
        .bind(row.backdated.unwrap_or(false))
        .bind(row.backdate_reason)
        .bind(&source_key)
        .fetch_optional(pool)
        .await?;

        let Some(record_row) = record else {
            continue;
        };
        inserted += 1;
        let record_id: Uuid = record_row.get("id");

        if let Some(topics) = row.topic_ids {
            for raw in topics.split(';').filter(|t| !t.trim().is_empty()) {
                let topic_id = Uuid::parse_str(raw.trim())
                    .with_context(|| format!("row {}: bad topic id {raw:?}", line + 2))?;
                sqlx::query(
                    r#"
                    INSERT INTO attendance_insights.attendance_topics (record_id, topic_id)
                    VALUES ($1, $2)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(record_id)
                .bind(topic_id)
                .execute(pool)
                .await?;
            }
        }
    }

    Ok(inserted)
}
