use std::collections::HashSet;

use anyhow::anyhow;
use chrono::NaiveDate;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::{CourseId, SchoolId, StudentId, UserId};
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{
    ATTENDANCE_COLUMNS, Attendance, AttendanceCounts, AttendanceFilterParams, AttendanceStatus,
    AttendanceSummary, AttendanceSummaryParams, BulkAttendanceEntry, BulkRecordAttendanceDto,
    PaginatedAttendance, RecordAttendanceDto,
};

const ATTENDANCE_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR school_id = $1)
      AND ($2::uuid IS NULL OR student_id = $2)
      AND ($3::uuid IS NULL OR course_id = $3)
      AND ($4::attendance_status IS NULL OR status = $4)
      AND ($5::date IS NULL OR date >= $5)
      AND ($6::date IS NULL OR date <= $6)
"#;

pub struct AttendanceService;

impl AttendanceService {
    /// Students among `students` without an active enrollment in the course.
    async fn unenrolled(
        conn: &mut PgConnection,
        course_id: CourseId,
        students: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        let enrolled: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT student_id FROM enrollments
               WHERE course_id = $1 AND student_id = ANY($2)
                 AND status = 'active' AND is_deleted = FALSE"#,
        )
        .bind(course_id)
        .bind(students)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();

        Ok(students
            .iter()
            .filter(|id| !enrolled.contains(id))
            .copied()
            .collect())
    }

    /// Insert or overwrite the mark for one student on one day.
    async fn upsert(
        conn: &mut PgConnection,
        school_id: SchoolId,
        course_id: CourseId,
        date: NaiveDate,
        recorded_by: UserId,
        entry: &BulkAttendanceEntry,
    ) -> Result<Attendance, AppError> {
        let row = sqlx::query_as::<_, Attendance>(&format!(
            r#"INSERT INTO attendance
                 (school_id, student_id, course_id, date, status, remarks, recorded_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (student_id, course_id, date) DO UPDATE
               SET status = EXCLUDED.status,
                   remarks = EXCLUDED.remarks,
                   recorded_by = EXCLUDED.recorded_by,
                   updated_at = NOW()
               RETURNING {ATTENDANCE_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(entry.student_id)
        .bind(course_id)
        .bind(date)
        .bind(entry.status)
        .bind(&entry.remarks)
        .bind(recorded_by)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    #[instrument(skip(db, dto), fields(course.id = %dto.course_id, date = %dto.date))]
    pub async fn record(
        db: &PgPool,
        school_id: SchoolId,
        recorded_by: UserId,
        dto: RecordAttendanceDto,
    ) -> Result<Attendance, AppError> {
        let mut conn = db.acquire().await?;

        let missing =
            Self::unenrolled(&mut conn, dto.course_id, &[dto.student_id.into_inner()]).await?;
        if !missing.is_empty() {
            return Err(AppError::bad_request(anyhow!(
                "Student is not enrolled in this course"
            )));
        }

        let entry = BulkAttendanceEntry {
            student_id: dto.student_id,
            status: dto.status,
            remarks: dto.remarks,
        };
        Self::upsert(
            &mut conn,
            school_id,
            dto.course_id,
            dto.date,
            recorded_by,
            &entry,
        )
        .await
    }

    /// One course and day for many students, all or nothing.
    #[instrument(skip(db, dto), fields(course.id = %dto.course_id, count = dto.records.len()))]
    pub async fn bulk_record(
        db: &PgPool,
        school_id: SchoolId,
        recorded_by: UserId,
        dto: BulkRecordAttendanceDto,
    ) -> Result<Vec<Attendance>, AppError> {
        let students: Vec<Uuid> = dto.records.iter().map(|r| r.student_id.into_inner()).collect();

        let mut tx = db.begin().await?;

        let missing = Self::unenrolled(&mut tx, dto.course_id, &students).await?;
        if !missing.is_empty() {
            return Err(AppError::bad_request(anyhow!(
                "Students not enrolled in this course: {}",
                missing
                    .iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut rows = Vec::with_capacity(dto.records.len());
        for entry in &dto.records {
            let row =
                Self::upsert(&mut tx, school_id, dto.course_id, dto.date, recorded_by, entry)
                    .await?;
            rows.push(row);
        }

        tx.commit().await?;
        info!(count = rows.len(), "Attendance recorded");
        Ok(rows)
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: AttendanceFilterParams,
    ) -> Result<PaginatedAttendance, AppError> {
        let pagination = &filters.pagination;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM attendance {ATTENDANCE_FILTER}"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.status)
        .bind(filters.from)
        .bind(filters.to)
        .fetch_one(db)
        .await?;

        let rows = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance {ATTENDANCE_FILTER} \
             ORDER BY date DESC, created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.status)
        .bind(filters.from)
        .bind(filters.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedAttendance::new(rows, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn summary(
        db: &PgPool,
        scope: Option<SchoolId>,
        params: AttendanceSummaryParams,
    ) -> Result<AttendanceSummary, AppError> {
        let counts = sqlx::query_as::<_, AttendanceCounts>(&format!(
            r#"SELECT COUNT(*) FILTER (WHERE status = 'present') AS present,
                      COUNT(*) FILTER (WHERE status = 'absent') AS absent,
                      COUNT(*) FILTER (WHERE status = 'late') AS late,
                      COUNT(*) FILTER (WHERE status = 'excused') AS excused
               FROM attendance {ATTENDANCE_FILTER}"#
        ))
        .bind(scope)
        .bind(params.student_id)
        .bind(params.course_id)
        .bind(None::<AttendanceStatus>)
        .bind(params.from)
        .bind(params.to)
        .fetch_one(db)
        .await?;

        Ok(AttendanceSummary::new(
            params.student_id.map(StudentId::from),
            params.course_id.map(CourseId::from),
            counts,
        ))
    }
}
