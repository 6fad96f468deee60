use anyhow::anyhow;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::{DepartmentId, SchoolId, TeacherId};
use tracing::{info, instrument};

use crate::utils::db_errors::constraint_violation;

use super::model::{
    CreateDepartmentDto, Department, DepartmentFilterParams, PaginatedDepartments,
    UpdateDepartmentDto,
};

const DEPARTMENT_COLUMNS: &str =
    "id, school_id, name, code, description, head_teacher_id, created_at, updated_at";

pub struct DepartmentService;

impl DepartmentService {
    /// The head of a department must teach at the same school.
    async fn ensure_head_in_school(
        db: &PgPool,
        school_id: SchoolId,
        head: Option<TeacherId>,
    ) -> Result<(), AppError> {
        let Some(head) = head else {
            return Ok(());
        };

        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM teachers
               WHERE id = $1 AND school_id = $2 AND is_deleted = FALSE)"#,
        )
        .bind(head)
        .bind(school_id)
        .fetch_one(db)
        .await?;

        if !exists {
            return Err(AppError::bad_request(anyhow!("Head teacher not found in this school")));
        }
        Ok(())
    }

    /// Rejects a department reference from another school.
    pub async fn ensure_in_school(
        db: &PgPool,
        school_id: SchoolId,
        department: Option<DepartmentId>,
    ) -> Result<(), AppError> {
        let Some(department) = department else {
            return Ok(());
        };

        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM departments
               WHERE id = $1 AND school_id = $2 AND is_deleted = FALSE)"#,
        )
        .bind(department)
        .bind(school_id)
        .fetch_one(db)
        .await?;

        if !exists {
            return Err(AppError::bad_request(anyhow!("Department not found in this school")));
        }
        Ok(())
    }

    #[instrument(skip(db, dto), fields(department.code = %dto.code))]
    pub async fn create(
        db: &PgPool,
        school_id: SchoolId,
        dto: CreateDepartmentDto,
    ) -> Result<Department, AppError> {
        Self::ensure_head_in_school(db, school_id, dto.head_teacher_id).await?;

        let department = sqlx::query_as::<_, Department>(&format!(
            r#"INSERT INTO departments (school_id, name, code, description, head_teacher_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {DEPARTMENT_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(dto.name.trim())
        .bind(dto.code.trim())
        .bind(&dto.description)
        .bind(dto.head_teacher_id)
        .fetch_one(db)
        .await
        .map_err(constraint_violation("Department code already exists in this school"))?;

        info!(department.id = %department.id, "Department created");
        Ok(department)
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: DepartmentFilterParams,
    ) -> Result<PaginatedDepartments, AppError> {
        let pagination = &filters.pagination;
        let search = filters.search.as_deref().map(|s| format!("%{s}%"));

        const FILTER: &str = r#"
            WHERE is_deleted = FALSE
              AND ($1::uuid IS NULL OR school_id = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR code ILIKE $2)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM departments {FILTER}"))
                .bind(scope)
                .bind(&search)
                .fetch_one(db)
                .await?;

        let departments = sqlx::query_as::<_, Department>(&format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments {FILTER} ORDER BY name LIMIT $3 OFFSET $4"
        ))
        .bind(scope)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedDepartments::new(departments, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: DepartmentId,
    ) -> Result<Department, AppError> {
        sqlx::query_as::<_, Department>(&format!(
            r#"SELECT {DEPARTMENT_COLUMNS} FROM departments
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Department not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: DepartmentId,
        dto: UpdateDepartmentDto,
    ) -> Result<Department, AppError> {
        let existing = Self::get(db, scope, id).await?;
        Self::ensure_head_in_school(db, existing.school_id, dto.head_teacher_id).await?;

        sqlx::query_as::<_, Department>(&format!(
            r#"UPDATE departments
               SET name = COALESCE($2, name),
                   code = COALESCE($3, code),
                   description = COALESCE($4, description),
                   head_teacher_id = COALESCE($5, head_teacher_id),
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING {DEPARTMENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(dto.code.as_deref().map(str::trim))
        .bind(&dto.description)
        .bind(dto.head_teacher_id)
        .fetch_optional(db)
        .await
        .map_err(constraint_violation("Department code already exists in this school"))?
        .ok_or_else(|| AppError::not_found(anyhow!("Department not found")))
    }

    /// Soft delete. Students, teachers and courses pointing at it are detached.
    #[instrument(skip(db))]
    pub async fn delete(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: DepartmentId,
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await?;

        let result = sqlx::query(
            r#"UPDATE departments SET is_deleted = TRUE, deleted_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#,
        )
        .bind(id)
        .bind(scope)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Department not found")));
        }

        for table in ["students", "teachers", "courses"] {
            sqlx::query(&format!(
                "UPDATE {table} SET department_id = NULL WHERE department_id = $1"
            ))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(department.id = %id, "Department deleted");
        Ok(())
    }
}
