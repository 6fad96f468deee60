use anyhow::anyhow;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::{SchoolId, SemesterId};
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};

use crate::utils::db_errors::constraint_violation;

use super::model::{
    CreateSemesterDto, PaginatedSemesters, Semester, SemesterFilterParams, UpdateSemesterDto,
};

const SEMESTER_COLUMNS: &str =
    "id, school_id, name, start_date, end_date, is_current, created_at, updated_at";

pub struct SemesterService;

impl SemesterService {
    async fn clear_current(
        tx: &mut Transaction<'_, Postgres>,
        school_id: SchoolId,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE semesters SET is_current = FALSE, updated_at = NOW()
               WHERE school_id = $1 AND is_current = TRUE"#,
        )
        .bind(school_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(skip(db, dto), fields(semester.name = %dto.name))]
    pub async fn create(
        db: &PgPool,
        school_id: SchoolId,
        dto: CreateSemesterDto,
    ) -> Result<Semester, AppError> {
        let mut tx = db.begin().await?;

        if dto.is_current {
            Self::clear_current(&mut tx, school_id).await?;
        }

        let semester = sqlx::query_as::<_, Semester>(&format!(
            r#"INSERT INTO semesters (school_id, name, start_date, end_date, is_current)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {SEMESTER_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(dto.name.trim())
        .bind(dto.start_date)
        .bind(dto.end_date)
        .bind(dto.is_current)
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint_violation("A semester with this name already exists"))?;

        tx.commit().await?;
        info!(semester.id = %semester.id, "Semester created");
        Ok(semester)
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: SemesterFilterParams,
    ) -> Result<PaginatedSemesters, AppError> {
        let pagination = &filters.pagination;

        const FILTER: &str = "WHERE is_deleted = FALSE AND ($1::uuid IS NULL OR school_id = $1)";

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM semesters {FILTER}"))
                .bind(scope)
                .fetch_one(db)
                .await?;

        let semesters = sqlx::query_as::<_, Semester>(&format!(
            "SELECT {SEMESTER_COLUMNS} FROM semesters {FILTER} \
             ORDER BY start_date DESC LIMIT $2 OFFSET $3"
        ))
        .bind(scope)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedSemesters::new(semesters, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: SemesterId,
    ) -> Result<Semester, AppError> {
        sqlx::query_as::<_, Semester>(&format!(
            r#"SELECT {SEMESTER_COLUMNS} FROM semesters
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Semester not found")))
    }

    #[instrument(skip(db))]
    pub async fn current(db: &PgPool, school_id: SchoolId) -> Result<Semester, AppError> {
        sqlx::query_as::<_, Semester>(&format!(
            r#"SELECT {SEMESTER_COLUMNS} FROM semesters
               WHERE school_id = $1 AND is_current = TRUE AND is_deleted = FALSE"#
        ))
        .bind(school_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("No current semester is set")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: SemesterId,
        dto: UpdateSemesterDto,
    ) -> Result<Semester, AppError> {
        let existing = Self::get(db, scope, id).await?;

        let start = dto.start_date.unwrap_or(existing.start_date);
        let end = dto.end_date.unwrap_or(existing.end_date);
        if start >= end {
            return Err(AppError::bad_request(anyhow!("start_date must be before end_date")));
        }

        sqlx::query_as::<_, Semester>(&format!(
            r#"UPDATE semesters
               SET name = COALESCE($2, name), start_date = $3, end_date = $4, updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING {SEMESTER_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(start)
        .bind(end)
        .fetch_optional(db)
        .await
        .map_err(constraint_violation("A semester with this name already exists"))?
        .ok_or_else(|| AppError::not_found(anyhow!("Semester not found")))
    }

    /// Makes `id` the only current semester of its school.
    #[instrument(skip(db))]
    pub async fn set_current(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: SemesterId,
    ) -> Result<Semester, AppError> {
        let existing = Self::get(db, scope, id).await?;

        let mut tx = db.begin().await?;
        Self::clear_current(&mut tx, existing.school_id).await?;

        let semester = sqlx::query_as::<_, Semester>(&format!(
            r#"UPDATE semesters SET is_current = TRUE, updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING {SEMESTER_COLUMNS}"#
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(semester.id = %id, school.id = %semester.school_id, "Current semester changed");
        Ok(semester)
    }

    #[instrument(skip(db))]
    pub async fn delete(db: &PgPool, scope: Option<SchoolId>, id: SemesterId) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE semesters SET is_deleted = TRUE, deleted_at = NOW(), is_current = FALSE
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#,
        )
        .bind(id)
        .bind(scope)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Semester not found")));
        }
        Ok(())
    }
}
