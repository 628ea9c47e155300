use anyhow::Context;
use sqlx::{PgPool, Row};

use crate::models::{LectureSummary, StudentId, StudentObservation};
use crate::roster::{demo_course, demo_roster, RosterSource};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let course = demo_course();
    sqlx::query(
        r#"
        INSERT INTO classcorer.courses (id, name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(&course.id)
    .bind(&course.name)
    .execute(pool)
    .await?;

    let roster = demo_roster();
    for student in roster.iter() {
        sqlx::query(
            r#"
            INSERT INTO classcorer.students (id, full_name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(student.id.as_str())
        .bind(&student.name)
        .execute(pool)
        .await?;

        let points = i32::try_from(student.points).context("points out of range")?;
        sqlx::query(
            r#"
            INSERT INTO classcorer.observations
            (course_id, student_id, focus, attendance, points)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (course_id, student_id) DO UPDATE
            SET focus = EXCLUDED.focus,
                attendance = EXCLUDED.attendance,
                points = EXCLUDED.points,
                observed_at = now()
            "#,
        )
        .bind(&course.id)
        .bind(student.id.as_str())
        .bind(student.focus)
        .bind(student.attendance)
        .bind(points)
        .execute(pool)
        .await?;
    }

    Ok(roster.len())
}

/// Roster for a course, ordered by student id.
pub async fn fetch_roster(pool: &PgPool, course: &str) -> anyhow::Result<Vec<StudentObservation>> {
    let rows = sqlx::query(
        "SELECT st.id, st.full_name, o.focus, o.attendance, o.points \
         FROM classcorer.observations o \
         JOIN classcorer.students st ON st.id = o.student_id \
         WHERE o.course_id = $1 \
         ORDER BY st.id",
    )
    .bind(course)
    .fetch_all(pool)
    .await?;

    let mut roster = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");
        let points: i32 = row.get("points");
        roster.push(StudentObservation {
            points: u32::try_from(points)
                .with_context(|| format!("student {id} has negative points"))?,
            id: StudentId::from(id),
            name: row.get("full_name"),
            focus: row.get("focus"),
            attendance: row.get("attendance"),
        });
    }

    Ok(roster)
}

/// Stores a finished lecture. Courses that only came from a CSV roster are
/// registered on the way so the session row always has its course.
pub async fn record_lecture(pool: &PgPool, summary: &LectureSummary) -> anyhow::Result<()> {
    let student_count = i32::try_from(summary.student_count).context("student count out of range")?;
    sqlx::query(
        r#"
        INSERT INTO classcorer.courses (id, name)
        VALUES ($1, $1)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&summary.course_id)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO classcorer.lecture_sessions
        (id, course_id, started_at, ended_at, student_count,
         average_focus, average_attendance, average_points)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(summary.session_id)
    .bind(&summary.course_id)
    .bind(summary.started_at)
    .bind(summary.ended_at)
    .bind(student_count)
    .bind(summary.stats.average_focus)
    .bind(summary.stats.average_attendance)
    .bind(summary.stats.average_points)
    .execute(pool)
    .await?;
    Ok(())
}

/// Postgres-backed roster source.
#[derive(Clone)]
pub struct PgRoster {
    pool: PgPool,
}

impl PgRoster {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RosterSource for PgRoster {
    async fn fetch_roster(&self, course: &str) -> anyhow::Result<Vec<StudentObservation>> {
        fetch_roster(&self.pool, course).await
    }
}
