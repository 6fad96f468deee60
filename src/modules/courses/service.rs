use anyhow::anyhow;
use schoolhub_cache::{RedisCache, cached, hash_filters, invalidate, keys};
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::{CourseId, DepartmentId, SchoolId, SemesterId, TeacherId};
use tracing::{info, instrument};

use crate::modules::departments::DepartmentService;
use crate::utils::db_errors::constraint_violation;

use super::model::{
    COURSE_SELECT, Course, CourseFilterParams, CreateCourseDto, PaginatedCourses, RosterEntry,
    UpdateCourseDto,
};

const COURSE_FILTER: &str = r#"
    WHERE c.is_deleted = FALSE
      AND ($1::uuid IS NULL OR c.school_id = $1)
      AND ($2::uuid IS NULL OR c.department_id = $2)
      AND ($3::uuid IS NULL OR c.teacher_id = $3)
      AND ($4::uuid IS NULL OR c.semester_id = $4)
      AND ($5::text IS NULL OR c.code ILIKE $5 OR c.name ILIKE $5)
"#;

pub struct CourseService;

impl CourseService {
    /// Department, teacher and semester must all belong to the course's school.
    async fn ensure_references(
        db: &PgPool,
        school_id: SchoolId,
        department_id: Option<DepartmentId>,
        teacher_id: Option<TeacherId>,
        semester_id: Option<SemesterId>,
    ) -> Result<(), AppError> {
        DepartmentService::ensure_in_school(db, school_id, department_id).await?;

        if let Some(teacher_id) = teacher_id {
            let exists = sqlx::query_scalar::<_, bool>(
                r#"SELECT EXISTS(SELECT 1 FROM teachers
                   WHERE id = $1 AND school_id = $2 AND is_deleted = FALSE)"#,
            )
            .bind(teacher_id)
            .bind(school_id)
            .fetch_one(db)
            .await?;
            if !exists {
                return Err(AppError::bad_request(anyhow!(
                    "Teacher not found in this school"
                )));
            }
        }

        if let Some(semester_id) = semester_id {
            let exists = sqlx::query_scalar::<_, bool>(
                r#"SELECT EXISTS(SELECT 1 FROM semesters
                   WHERE id = $1 AND school_id = $2 AND is_deleted = FALSE)"#,
            )
            .bind(semester_id)
            .bind(school_id)
            .fetch_one(db)
            .await?;
            if !exists {
                return Err(AppError::bad_request(anyhow!(
                    "Semester not found in this school"
                )));
            }
        }
        Ok(())
    }

    #[instrument(skip(db, cache, dto), fields(course.code = %dto.code))]
    pub async fn create(
        db: &PgPool,
        cache: Option<&RedisCache>,
        school_id: SchoolId,
        dto: CreateCourseDto,
    ) -> Result<Course, AppError> {
        Self::ensure_references(
            db,
            school_id,
            dto.department_id,
            dto.teacher_id,
            dto.semester_id,
        )
        .await?;

        let id = sqlx::query_scalar::<_, CourseId>(
            r#"INSERT INTO courses
                 (school_id, department_id, teacher_id, semester_id, code, name,
                  description, credit_hours, max_capacity)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id"#,
        )
        .bind(school_id)
        .bind(dto.department_id)
        .bind(dto.teacher_id)
        .bind(dto.semester_id)
        .bind(dto.code.trim().to_uppercase())
        .bind(dto.name.trim())
        .bind(&dto.description)
        .bind(dto.credit_hours)
        .bind(dto.max_capacity)
        .fetch_one(db)
        .await
        .map_err(constraint_violation("Course code already exists in this school"))?;

        invalidate::course(cache, id.into_inner(), school_id.into_inner()).await;
        info!(course.id = %id, "Course created");

        Self::load(db, id).await
    }

    async fn load(db: &PgPool, id: CourseId) -> Result<Course, AppError> {
        sqlx::query_as::<_, Course>(&format!(
            "{COURSE_SELECT} WHERE c.id = $1 AND c.is_deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Course not found")))
    }

    #[instrument(skip(db, cache, filters))]
    pub async fn list(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        filters: CourseFilterParams,
    ) -> Result<PaginatedCourses, AppError> {
        let filters = &filters;
        let load = move || async move {
            let pagination = &filters.pagination;
            let search = filters.search.as_deref().map(|s| format!("%{s}%"));

            let total = sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM courses c {COURSE_FILTER}"
            ))
            .bind(scope)
            .bind(filters.department_id)
            .bind(filters.teacher_id)
            .bind(filters.semester_id)
            .bind(&search)
            .fetch_one(db)
            .await?;

            let courses = sqlx::query_as::<_, Course>(&format!(
                "{COURSE_SELECT} {COURSE_FILTER} ORDER BY c.code LIMIT $6 OFFSET $7"
            ))
            .bind(scope)
            .bind(filters.department_id)
            .bind(filters.teacher_id)
            .bind(filters.semester_id)
            .bind(&search)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(db)
            .await?;

            Ok::<_, AppError>(PaginatedCourses::new(courses, pagination, total))
        };

        let Some(school_id) = scope else {
            return load().await;
        };

        let key = keys::courses::list(
            school_id.into_inner(),
            &hash_filters(&(
                &filters.search,
                filters.department_id,
                filters.teacher_id,
                filters.semester_id,
                &filters.pagination,
            )),
        );
        cached(cache, &key, load).await
    }

    #[instrument(skip(db, cache))]
    pub async fn get(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: CourseId,
    ) -> Result<Course, AppError> {
        let key = keys::courses::by_id(id.into_inner());
        let course = cached(cache, &key, || Self::load(db, id)).await?;

        if scope.is_some_and(|school| school != course.school_id) {
            return Err(AppError::not_found(anyhow!("Course not found")));
        }
        Ok(course)
    }

    #[instrument(skip(db, cache, dto))]
    pub async fn update(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: CourseId,
        dto: UpdateCourseDto,
    ) -> Result<Course, AppError> {
        let existing = Self::get(db, None, scope, id).await?;
        Self::ensure_references(
            db,
            existing.school_id,
            dto.department_id,
            dto.teacher_id,
            dto.semester_id,
        )
        .await?;

        if dto
            .max_capacity
            .is_some_and(|capacity| i64::from(capacity) < existing.enrolled_count)
        {
            return Err(AppError::bad_request(anyhow!(
                "Capacity cannot be below the {} students already enrolled",
                existing.enrolled_count
            )));
        }

        let credits_changed = dto.changes_credits(existing.credit_hours);

        sqlx::query(
            r#"UPDATE courses
               SET code = COALESCE($2, code),
                   name = COALESCE($3, name),
                   description = COALESCE($4, description),
                   credit_hours = COALESCE($5, credit_hours),
                   max_capacity = COALESCE($6, max_capacity),
                   department_id = COALESCE($7, department_id),
                   teacher_id = COALESCE($8, teacher_id),
                   semester_id = COALESCE($9, semester_id),
                   is_active = COALESCE($10, is_active),
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .bind(dto.code.as_deref().map(|c| c.trim().to_uppercase()))
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(dto.credit_hours)
        .bind(dto.max_capacity)
        .bind(dto.department_id)
        .bind(dto.teacher_id)
        .bind(dto.semester_id)
        .bind(dto.is_active)
        .execute(db)
        .await
        .map_err(constraint_violation("Course code already exists in this school"))?;

        invalidate::course(cache, id.into_inner(), existing.school_id.into_inner()).await;
        if credits_changed && cache.is_some() {
            let students = Self::student_ids(db, id).await?;
            invalidate::gpas(cache, &students).await;
        }
        Self::load(db, id).await
    }

    /// Everyone whose GPA includes this course, in any enrollment state.
    async fn student_ids(db: &PgPool, id: CourseId) -> Result<Vec<uuid::Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT DISTINCT student_id FROM enrollments WHERE course_id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .fetch_all(db)
        .await?;
        Ok(ids)
    }

    /// Soft delete. Refused while students are actively enrolled.
    #[instrument(skip(db, cache))]
    pub async fn delete(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: CourseId,
    ) -> Result<Course, AppError> {
        let existing = Self::get(db, None, scope, id).await?;
        if existing.enrolled_count > 0 {
            return Err(AppError::bad_request(anyhow!(
                "Cannot delete a course with active enrollments"
            )));
        }

        let mut tx = db.begin().await?;

        sqlx::query(
            r#"UPDATE courses SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE schedules SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE course_id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        invalidate::course(cache, id.into_inner(), existing.school_id.into_inner()).await;
        info!(course.id = %id, "Course deleted");
        Ok(existing)
    }

    /// Students actively enrolled, by surname.
    #[instrument(skip(db, cache))]
    pub async fn roster(
        db: &PgPool,
        cache: Option<&RedisCache>,
        id: CourseId,
    ) -> Result<Vec<RosterEntry>, AppError> {
        let key = keys::courses::roster(id.into_inner());
        cached(cache, &key, || async move {
            let roster = sqlx::query_as::<_, RosterEntry>(
                r#"SELECT e.id AS enrollment_id, s.id AS student_id, s.student_number,
                          u.first_name, u.last_name, u.email, e.enrolled_at
                   FROM enrollments e
                   JOIN students s ON s.id = e.student_id
                   JOIN users u ON u.id = s.user_id
                   WHERE e.course_id = $1 AND e.status = 'active'
                     AND e.is_deleted = FALSE AND s.is_deleted = FALSE
                   ORDER BY u.last_name, u.first_name"#,
            )
            .bind(id)
            .fetch_all(db)
            .await?;
            Ok::<_, AppError>(roster)
        })
        .await
    }
}
