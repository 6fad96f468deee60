use anyhow::anyhow;
use chrono::Utc;
use schoolhub_cache::{RedisCache, invalidate};
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::Role;
use schoolhub_models::courses::{COURSE_SELECT, Course};
use schoolhub_models::ids::{CourseId, SchoolId, TeacherId};
use tracing::{info, instrument};

use crate::modules::departments::DepartmentService;
use crate::modules::users::UserService;
use crate::utils::db_errors::constraint_violation;

use super::model::{
    CreateTeacherDto, PaginatedTeachers, TEACHER_SELECT, Teacher, TeacherFilterParams,
    UpdateTeacherDto,
};

const TEACHER_FILTER: &str = r#"
    WHERE t.is_deleted = FALSE
      AND ($1::uuid IS NULL OR t.school_id = $1)
      AND ($2::uuid IS NULL OR t.department_id = $2)
      AND ($3::text IS NULL
           OR u.first_name ILIKE $3 OR u.last_name ILIKE $3
           OR u.email ILIKE $3 OR t.employee_number ILIKE $3)
"#;

pub struct TeacherService;

impl TeacherService {
    #[instrument(skip(db, dto), fields(teacher.number = %dto.employee_number))]
    pub async fn create(
        db: &PgPool,
        school_id: SchoolId,
        dto: CreateTeacherDto,
    ) -> Result<Teacher, AppError> {
        DepartmentService::ensure_in_school(db, school_id, dto.department_id).await?;

        let mut tx = db.begin().await?;

        let user_id =
            UserService::insert_account(&mut tx, school_id, &dto.account, Role::Teacher).await?;

        let teacher_id = sqlx::query_scalar::<_, TeacherId>(
            r#"INSERT INTO teachers
                 (user_id, school_id, employee_number, department_id, specialization,
                  qualification, hire_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(school_id)
        .bind(dto.employee_number.trim())
        .bind(dto.department_id)
        .bind(&dto.specialization)
        .bind(&dto.qualification)
        .bind(dto.hire_date.unwrap_or_else(|| Utc::now().date_naive()))
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint_violation("Employee number already exists in this school"))?;

        tx.commit().await?;
        info!(teacher.id = %teacher_id, "Teacher created");

        Self::get(db, None, teacher_id).await
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: TeacherFilterParams,
    ) -> Result<PaginatedTeachers, AppError> {
        let pagination = &filters.pagination;
        let search = filters.search.as_deref().map(|s| format!("%{s}%"));

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM teachers t JOIN users u ON u.id = t.user_id {TEACHER_FILTER}"
        ))
        .bind(scope)
        .bind(filters.department_id)
        .bind(&search)
        .fetch_one(db)
        .await?;

        let teachers = sqlx::query_as::<_, Teacher>(&format!(
            "{TEACHER_SELECT} {TEACHER_FILTER} ORDER BY u.last_name, u.first_name LIMIT $4 OFFSET $5"
        ))
        .bind(scope)
        .bind(filters.department_id)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedTeachers::new(teachers, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: TeacherId,
    ) -> Result<Teacher, AppError> {
        sqlx::query_as::<_, Teacher>(&format!(
            r#"{TEACHER_SELECT}
               WHERE t.id = $1 AND t.is_deleted = FALSE AND ($2::uuid IS NULL OR t.school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Teacher not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: TeacherId,
        dto: UpdateTeacherDto,
    ) -> Result<Teacher, AppError> {
        let existing = Self::get(db, scope, id).await?;
        DepartmentService::ensure_in_school(db, existing.school_id, dto.department_id).await?;

        let mut tx = db.begin().await?;

        UserService::update_account(
            &mut tx,
            existing.user_id,
            dto.first_name.as_deref(),
            dto.last_name.as_deref(),
            dto.phone.as_deref(),
        )
        .await?;

        sqlx::query(
            r#"UPDATE teachers
               SET department_id = COALESCE($2, department_id),
                   specialization = COALESCE($3, specialization),
                   qualification = COALESCE($4, qualification),
                   hire_date = COALESCE($5, hire_date),
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .bind(dto.department_id)
        .bind(&dto.specialization)
        .bind(&dto.qualification)
        .bind(dto.hire_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Self::get(db, None, id).await
    }

    /// Soft delete. Courses they taught become unassigned.
    #[instrument(skip(db, cache))]
    pub async fn delete(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: TeacherId,
    ) -> Result<Teacher, AppError> {
        let existing = Self::get(db, scope, id).await?;

        let mut tx = db.begin().await?;

        sqlx::query(
            r#"UPDATE teachers SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        UserService::deactivate_account(&mut tx, existing.user_id).await?;

        let unassigned = sqlx::query_scalar::<_, CourseId>(
            r#"UPDATE courses SET teacher_id = NULL, updated_at = NOW()
               WHERE teacher_id = $1 AND is_deleted = FALSE
               RETURNING id"#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("UPDATE departments SET head_teacher_id = NULL WHERE head_teacher_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        for course_id in unassigned {
            invalidate::course(cache, course_id.into_inner(), existing.school_id.into_inner())
                .await;
        }

        info!(teacher.id = %id, "Teacher deleted");
        Ok(existing)
    }

    #[instrument(skip(db))]
    pub async fn courses(db: &PgPool, id: TeacherId) -> Result<Vec<Course>, AppError> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "{COURSE_SELECT} WHERE c.teacher_id = $1 AND c.is_deleted = FALSE ORDER BY c.code"
        ))
        .bind(id)
        .fetch_all(db)
        .await?;

        Ok(courses)
    }
}
