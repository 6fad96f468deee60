use anyhow::anyhow;
use schoolhub_cache::{RedisCache, invalidate};
use schoolhub_core::AppError;
use schoolhub_core::grading::{letter_grade, validate_score};
use schoolhub_db::PgPool;
use schoolhub_models::ids::{CourseId, EnrollmentId, SchoolId, SemesterId, StudentId};
use sqlx::FromRow;
use tracing::{info, instrument, warn};

use crate::metrics;
use crate::modules::grades::GradeService;
use crate::utils::db_errors::constraint_violation;

use super::model::{
    CompleteEnrollmentDto, CreateEnrollmentDto, ENROLLMENT_COLUMNS, Enrollment,
    EnrollmentFilterParams, EnrollmentStatus, PaginatedEnrollments,
};

const ENROLLMENT_FILTER: &str = r#"
    WHERE is_deleted = FALSE
      AND ($1::uuid IS NULL OR school_id = $1)
      AND ($2::uuid IS NULL OR student_id = $2)
      AND ($3::uuid IS NULL OR course_id = $3)
      AND ($4::uuid IS NULL OR semester_id = $4)
      AND ($5::enrollment_status IS NULL OR status = $5)
"#;

#[derive(Debug, FromRow)]
struct LockedCourse {
    school_id: SchoolId,
    semester_id: Option<SemesterId>,
    max_capacity: i32,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct PriorEnrollment {
    id: EnrollmentId,
    status: EnrollmentStatus,
}

/// Reason a new active enrollment is refused, if any.
fn enrollment_blocker(
    prior: Option<EnrollmentStatus>,
    active: i64,
    capacity: i32,
) -> Option<(&'static str, &'static str)> {
    match prior {
        Some(EnrollmentStatus::Active) => {
            return Some(("duplicate", "Student is already enrolled in this course"));
        }
        Some(EnrollmentStatus::Completed) => {
            return Some(("completed", "Student has already completed this course"));
        }
        _ => {}
    }
    if active >= i64::from(capacity) {
        return Some(("capacity", "Course is at full capacity"));
    }
    None
}

pub struct EnrollmentService;

impl EnrollmentService {
    /// Enrolls a student. The course row stays locked until commit so
    /// concurrent enrollments cannot overfill it.
    #[instrument(skip(db, cache), fields(student.id = %dto.student_id, course.id = %dto.course_id))]
    pub async fn enroll(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        dto: CreateEnrollmentDto,
    ) -> Result<Enrollment, AppError> {
        let mut tx = db.begin().await?;

        let course = sqlx::query_as::<_, LockedCourse>(
            r#"SELECT school_id, semester_id, max_capacity, is_active
               FROM courses
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)
               FOR UPDATE"#,
        )
        .bind(dto.course_id)
        .bind(scope)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Course not found")))?;

        if !course.is_active {
            metrics::track_enrollment_rejected("inactive");
            return Err(AppError::bad_request(anyhow!(
                "Course is not open for enrollment"
            )));
        }

        let student_ok = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM students
               WHERE id = $1 AND school_id = $2 AND is_deleted = FALSE AND status = 'active')"#,
        )
        .bind(dto.student_id)
        .bind(course.school_id)
        .fetch_one(&mut *tx)
        .await?;
        if !student_ok {
            return Err(AppError::bad_request(anyhow!(
                "Student not found or not active in this school"
            )));
        }

        let semester_id = dto.semester_id.or(course.semester_id);

        let prior = sqlx::query_as::<_, PriorEnrollment>(
            r#"SELECT id, status FROM enrollments
               WHERE student_id = $1 AND course_id = $2
                 AND semester_id IS NOT DISTINCT FROM $3 AND is_deleted = FALSE
               FOR UPDATE"#,
        )
        .bind(dto.student_id)
        .bind(dto.course_id)
        .bind(semester_id)
        .fetch_optional(&mut *tx)
        .await?;

        let active = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM enrollments
               WHERE course_id = $1 AND status = 'active' AND is_deleted = FALSE"#,
        )
        .bind(dto.course_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some((reason, message)) =
            enrollment_blocker(prior.as_ref().map(|p| p.status), active, course.max_capacity)
        {
            metrics::track_enrollment_rejected(reason);
            warn!(reason, active, capacity = course.max_capacity, "Enrollment rejected");
            return Err(AppError::bad_request(anyhow!(message)));
        }

        let enrollment = match prior {
            Some(row) => {
                sqlx::query_as::<_, Enrollment>(&format!(
                    r#"UPDATE enrollments
                       SET status = 'active', enrolled_at = NOW(), dropped_at = NULL,
                           completed_at = NULL, final_score = NULL, final_letter = NULL,
                           updated_at = NOW()
                       WHERE id = $1
                       RETURNING {ENROLLMENT_COLUMNS}"#
                ))
                .bind(row.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => sqlx::query_as::<_, Enrollment>(&format!(
                r#"INSERT INTO enrollments (school_id, student_id, course_id, semester_id)
                   VALUES ($1, $2, $3, $4)
                   RETURNING {ENROLLMENT_COLUMNS}"#
            ))
            .bind(course.school_id)
            .bind(dto.student_id)
            .bind(dto.course_id)
            .bind(semester_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(constraint_violation(
                "Student is already enrolled in this course",
            ))?,
        };

        tx.commit().await?;

        Self::invalidate(cache, &enrollment).await;
        metrics::track_enrollment_created();
        info!(enrollment.id = %enrollment.id, "Student enrolled");
        Ok(enrollment)
    }

    async fn invalidate(cache: Option<&RedisCache>, enrollment: &Enrollment) {
        let school = enrollment.school_id.into_inner();
        invalidate::course(cache, enrollment.course_id.into_inner(), school).await;
        invalidate::student(cache, enrollment.student_id.into_inner(), school).await;
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: EnrollmentId,
    ) -> Result<Enrollment, AppError> {
        sqlx::query_as::<_, Enrollment>(&format!(
            r#"SELECT {ENROLLMENT_COLUMNS} FROM enrollments
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Enrollment not found")))
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: EnrollmentFilterParams,
    ) -> Result<PaginatedEnrollments, AppError> {
        let pagination = &filters.pagination;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM enrollments {ENROLLMENT_FILTER}"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.semester_id)
        .bind(filters.status)
        .fetch_one(db)
        .await?;

        let enrollments = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments {ENROLLMENT_FILTER} \
             ORDER BY enrolled_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.semester_id)
        .bind(filters.status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedEnrollments::new(enrollments, pagination, total))
    }

    /// Only active enrollments can be dropped. The seat is released at once.
    #[instrument(skip(db, cache))]
    pub async fn drop(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: EnrollmentId,
    ) -> Result<Enrollment, AppError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            r#"UPDATE enrollments
               SET status = 'dropped', dropped_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND status = 'active' AND is_deleted = FALSE
                 AND ($2::uuid IS NULL OR school_id = $2)
               RETURNING {ENROLLMENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?;

        let Some(enrollment) = enrollment else {
            // distinguish missing from not droppable
            Self::get(db, scope, id).await?;
            return Err(AppError::bad_request(anyhow!(
                "Only active enrollments can be dropped"
            )));
        };

        Self::invalidate(cache, &enrollment).await;
        info!(enrollment.id = %id, "Enrollment dropped");
        Ok(enrollment)
    }

    /// Closes an enrollment with a final score: the override when given,
    /// otherwise the weighted average of the recorded grades.
    #[instrument(skip(db, cache))]
    pub async fn complete(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: EnrollmentId,
        dto: CompleteEnrollmentDto,
    ) -> Result<Enrollment, AppError> {
        let mut tx = db.begin().await?;

        let status = sqlx::query_scalar::<_, EnrollmentStatus>(
            r#"SELECT status FROM enrollments
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)
               FOR UPDATE"#,
        )
        .bind(id)
        .bind(scope)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Enrollment not found")))?;

        if status != EnrollmentStatus::Active {
            return Err(AppError::bad_request(anyhow!(
                "Only active enrollments can be completed"
            )));
        }

        let final_score = match dto.final_score {
            Some(score) => score,
            None => GradeService::enrollment_average(&mut tx, id)
                .await?
                .ok_or_else(|| {
                    AppError::bad_request(anyhow!(
                        "No grades recorded for this enrollment; provide final_score"
                    ))
                })?,
        };
        validate_score(final_score)?;

        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            r#"UPDATE enrollments
               SET status = 'completed', completed_at = NOW(),
                   final_score = $2, final_letter = $3, updated_at = NOW()
               WHERE id = $1
               RETURNING {ENROLLMENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(final_score)
        .bind(letter_grade(final_score))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Self::invalidate(cache, &enrollment).await;
        info!(enrollment.id = %id, final_score, "Enrollment completed");
        Ok(enrollment)
    }

    /// Courses a student is actively enrolled in.
    pub async fn active_course_ids(
        db: &PgPool,
        student_id: StudentId,
    ) -> Result<Vec<CourseId>, AppError> {
        let ids = sqlx::query_scalar::<_, CourseId>(
            r#"SELECT course_id FROM enrollments
               WHERE student_id = $1 AND status = 'active' AND is_deleted = FALSE"#,
        )
        .bind(student_id)
        .fetch_all(db)
        .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_course_rejects() {
        assert_eq!(
            enrollment_blocker(None, 30, 30).map(|(reason, _)| reason),
            Some("capacity")
        );
        assert!(enrollment_blocker(None, 29, 30).is_none());
    }

    #[test]
    fn test_reopening_dropped_respects_capacity() {
        assert!(enrollment_blocker(Some(EnrollmentStatus::Dropped), 0, 1).is_none());
        assert!(enrollment_blocker(Some(EnrollmentStatus::Withdrawn), 1, 1).is_some());
    }

    #[test]
    fn test_duplicate_and_completed_reject() {
        assert_eq!(
            enrollment_blocker(Some(EnrollmentStatus::Active), 0, 10).map(|(r, _)| r),
            Some("duplicate")
        );
        assert_eq!(
            enrollment_blocker(Some(EnrollmentStatus::Completed), 0, 10).map(|(r, _)| r),
            Some("completed")
        );
    }
}
