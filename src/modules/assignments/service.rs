use anyhow::anyhow;
use chrono::Utc;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::{AssignmentId, CourseId, SchoolId, StudentId, SubmissionId, UserId};
use sqlx::FromRow;
use tracing::{info, instrument};

use crate::utils::db_errors::{constraint_violation, unique_violation};

use super::model::{
    ASSIGNMENT_COLUMNS, Assignment, AssignmentFilterParams, CreateAssignmentDto,
    GradeSubmissionDto, PaginatedAssignments, SUBMISSION_COLUMNS, Submission,
    SubmitAssignmentDto, UpdateAssignmentDto, is_late,
};

#[derive(Debug, FromRow)]
struct SubmissionTarget {
    course_id: CourseId,
    max_score: f64,
}

pub struct AssignmentService;

impl AssignmentService {
    #[instrument(skip(db, dto), fields(course.id = %dto.course_id))]
    pub async fn create(
        db: &PgPool,
        school_id: SchoolId,
        created_by: UserId,
        dto: CreateAssignmentDto,
    ) -> Result<Assignment, AppError> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            r#"INSERT INTO assignments
                 (school_id, course_id, title, description, due_date, max_score, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {ASSIGNMENT_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(dto.course_id)
        .bind(dto.title.trim())
        .bind(&dto.description)
        .bind(dto.due_date)
        .bind(dto.max_score)
        .bind(created_by)
        .fetch_one(db)
        .await
        .map_err(constraint_violation("Assignment could not be created"))?;

        info!(assignment.id = %assignment.id, "Assignment created");
        Ok(assignment)
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: AssignmentFilterParams,
    ) -> Result<PaginatedAssignments, AppError> {
        let pagination = &filters.pagination;
        let filter = r#"
            WHERE is_deleted = FALSE
              AND ($1::uuid IS NULL OR school_id = $1)
              AND ($2::uuid IS NULL OR course_id = $2)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM assignments {filter}"))
                .bind(scope)
                .bind(filters.course_id)
                .fetch_one(db)
                .await?;

        let assignments = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments {filter} \
             ORDER BY due_date LIMIT $3 OFFSET $4"
        ))
        .bind(scope)
        .bind(filters.course_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedAssignments::new(assignments, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: AssignmentId,
    ) -> Result<Assignment, AppError> {
        sqlx::query_as::<_, Assignment>(&format!(
            r#"SELECT {ASSIGNMENT_COLUMNS} FROM assignments
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Assignment not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update(
        db: &PgPool,
        id: AssignmentId,
        dto: UpdateAssignmentDto,
    ) -> Result<Assignment, AppError> {
        sqlx::query_as::<_, Assignment>(&format!(
            r#"UPDATE assignments
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   due_date = COALESCE($4, due_date),
                   max_score = COALESCE($5, max_score),
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING {ASSIGNMENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(&dto.title)
        .bind(&dto.description)
        .bind(dto.due_date)
        .bind(dto.max_score)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Assignment not found")))
    }

    #[instrument(skip(db))]
    pub async fn delete(db: &PgPool, id: AssignmentId) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE assignments SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Assignment not found")));
        }
        info!(assignment.id = %id, "Assignment deleted");
        Ok(())
    }

    /// One submission per student. Only students actively enrolled in the
    /// course may submit; late submissions are accepted and flagged.
    #[instrument(skip(db, dto))]
    pub async fn submit(
        db: &PgPool,
        assignment: &Assignment,
        student_id: StudentId,
        dto: SubmitAssignmentDto,
    ) -> Result<Submission, AppError> {
        if dto.content.as_deref().is_none_or(|c| c.trim().is_empty()) && dto.document_id.is_none()
        {
            return Err(AppError::bad_request(anyhow!(
                "A submission needs content or a document"
            )));
        }

        let enrolled = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM enrollments
               WHERE student_id = $1 AND course_id = $2
                 AND status = 'active' AND is_deleted = FALSE)"#,
        )
        .bind(student_id)
        .bind(assignment.course_id)
        .fetch_one(db)
        .await?;
        if !enrolled {
            return Err(AppError::bad_request(anyhow!(
                "Student is not enrolled in this course"
            )));
        }

        let now = Utc::now();
        let submission = sqlx::query_as::<_, Submission>(&format!(
            r#"INSERT INTO assignment_submissions
                 (assignment_id, student_id, content, document_id, submitted_at, is_late)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {SUBMISSION_COLUMNS}"#
        ))
        .bind(assignment.id)
        .bind(student_id)
        .bind(&dto.content)
        .bind(dto.document_id)
        .bind(now)
        .bind(is_late(assignment.due_date, now))
        .fetch_one(db)
        .await
        .map_err(unique_violation("Assignment already submitted"))?;

        info!(submission.id = %submission.id, late = submission.is_late, "Assignment submitted");
        Ok(submission)
    }

    /// Course the submission belongs to, for access checks.
    pub async fn submission_course(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: SubmissionId,
    ) -> Result<CourseId, AppError> {
        Self::submission_target(db, scope, id)
            .await
            .map(|target| target.course_id)
    }

    async fn submission_target(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: SubmissionId,
    ) -> Result<SubmissionTarget, AppError> {
        sqlx::query_as::<_, SubmissionTarget>(
            r#"SELECT a.course_id, a.max_score
               FROM assignment_submissions s
               JOIN assignments a ON a.id = s.assignment_id
               WHERE s.id = $1 AND a.is_deleted = FALSE
                 AND ($2::uuid IS NULL OR a.school_id = $2)"#,
        )
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Submission not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn grade_submission(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: SubmissionId,
        graded_by: UserId,
        dto: GradeSubmissionDto,
    ) -> Result<Submission, AppError> {
        let target = Self::submission_target(db, scope, id).await?;
        if !(0.0..=target.max_score).contains(&dto.score) {
            return Err(AppError::bad_request(anyhow!(
                "Score must be between 0 and {}",
                target.max_score
            )));
        }

        let submission = sqlx::query_as::<_, Submission>(&format!(
            r#"UPDATE assignment_submissions
               SET score = $2, feedback = $3, graded_by = $4, graded_at = NOW(), updated_at = NOW()
               WHERE id = $1
               RETURNING {SUBMISSION_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.score)
        .bind(&dto.feedback)
        .bind(graded_by)
        .fetch_one(db)
        .await?;

        info!(submission.id = %id, score = dto.score, "Submission graded");
        Ok(submission)
    }

    /// Submissions for an assignment, optionally one student's only.
    #[instrument(skip(db))]
    pub async fn submissions(
        db: &PgPool,
        assignment_id: AssignmentId,
        student_id: Option<StudentId>,
    ) -> Result<Vec<Submission>, AppError> {
        let submissions = sqlx::query_as::<_, Submission>(&format!(
            r#"SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions
               WHERE assignment_id = $1 AND ($2::uuid IS NULL OR student_id = $2)
               ORDER BY submitted_at"#
        ))
        .bind(assignment_id)
        .bind(student_id)
        .fetch_all(db)
        .await?;
        Ok(submissions)
    }
}
