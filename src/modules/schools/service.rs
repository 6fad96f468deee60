use anyhow::anyhow;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::SchoolId;
use tracing::{debug, info, instrument};

use crate::utils::db_errors::unique_violation;

use super::model::{CreateSchoolDto, PaginatedSchools, School, SchoolFilterParams, UpdateSchoolDto};

const SCHOOL_COLUMNS: &str =
    "id, name, code, address, phone, email, is_active, created_at, updated_at";

pub struct SchoolService;

impl SchoolService {
    #[instrument(skip(db, dto), fields(school.name = %dto.name, db.operation = "INSERT", db.table = "schools"))]
    pub async fn create(db: &PgPool, dto: CreateSchoolDto) -> Result<School, AppError> {
        let school = sqlx::query_as::<_, School>(&format!(
            r#"INSERT INTO schools (name, code, address, phone, email)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {SCHOOL_COLUMNS}"#
        ))
        .bind(dto.name.trim())
        .bind(dto.code.trim())
        .bind(&dto.address)
        .bind(&dto.phone)
        .bind(&dto.email)
        .fetch_one(db)
        .await
        .map_err(unique_violation("School code already exists"))?;

        info!(school.id = %school.id, school.code = %school.code, "School created");
        Ok(school)
    }

    /// `scope` pins non-system admins to their own school.
    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "schools"))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: SchoolFilterParams,
    ) -> Result<PaginatedSchools, AppError> {
        let pagination = &filters.pagination;
        let search = filters.search.as_deref().map(|s| format!("%{s}%"));

        const FILTER: &str = r#"
            WHERE is_deleted = FALSE
              AND ($1::uuid IS NULL OR id = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR code ILIKE $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM schools {FILTER}"))
            .bind(scope)
            .bind(&search)
            .fetch_one(db)
            .await?;

        let schools = sqlx::query_as::<_, School>(&format!(
            "SELECT {SCHOOL_COLUMNS} FROM schools {FILTER} ORDER BY name LIMIT $3 OFFSET $4"
        ))
        .bind(scope)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        debug!(total, returned = schools.len(), "Schools fetched");
        Ok(PaginatedSchools::new(schools, pagination, total))
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "schools"))]
    pub async fn get(db: &PgPool, id: SchoolId) -> Result<School, AppError> {
        sqlx::query_as::<_, School>(&format!(
            "SELECT {SCHOOL_COLUMNS} FROM schools WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("School not found")))
    }

    #[instrument(skip(db, dto), fields(db.operation = "UPDATE", db.table = "schools"))]
    pub async fn update(db: &PgPool, id: SchoolId, dto: UpdateSchoolDto) -> Result<School, AppError> {
        sqlx::query_as::<_, School>(&format!(
            r#"UPDATE schools
               SET name = COALESCE($2, name),
                   address = COALESCE($3, address),
                   phone = COALESCE($4, phone),
                   email = COALESCE($5, email),
                   is_active = COALESCE($6, is_active),
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING {SCHOOL_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(&dto.address)
        .bind(&dto.phone)
        .bind(&dto.email)
        .bind(dto.is_active)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("School not found")))
    }

    /// Soft delete. Users of the school can no longer log in.
    #[instrument(skip(db), fields(db.operation = "UPDATE", db.table = "schools"))]
    pub async fn delete(db: &PgPool, id: SchoolId) -> Result<(), AppError> {
        let mut tx = db.begin().await?;

        let result = sqlx::query(
            r#"UPDATE schools SET is_deleted = TRUE, deleted_at = NOW(), is_active = FALSE
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("School not found")));
        }

        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE school_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(school.id = %id, "School deleted");
        Ok(())
    }
}
