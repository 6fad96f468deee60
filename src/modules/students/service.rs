use anyhow::anyhow;
use chrono::Utc;
use schoolhub_cache::{RedisCache, cached, hash_filters, invalidate, keys};
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::Role;
use schoolhub_models::enrollments::StudentCourse;
use schoolhub_models::ids::{SchoolId, StudentId};
use tracing::{debug, info, instrument};

use crate::modules::departments::DepartmentService;
use crate::modules::users::UserService;
use crate::utils::db_errors::constraint_violation;

use super::model::{
    CreateStudentDto, PaginatedStudents, STUDENT_SELECT, Student, StudentFilterParams,
    UpdateStudentDto,
};

const STUDENT_FILTER: &str = r#"
    WHERE s.is_deleted = FALSE
      AND ($1::uuid IS NULL OR s.school_id = $1)
      AND ($2::student_status IS NULL OR s.status = $2)
      AND ($3::uuid IS NULL OR s.department_id = $3)
      AND ($4::text IS NULL
           OR u.first_name ILIKE $4 OR u.last_name ILIKE $4
           OR u.email ILIKE $4 OR s.student_number ILIKE $4)
"#;

pub struct StudentService;

impl StudentService {
    /// Creates the login account and the profile together.
    #[instrument(skip(db, cache, dto), fields(student.number = %dto.student_number))]
    pub async fn create(
        db: &PgPool,
        cache: Option<&RedisCache>,
        school_id: SchoolId,
        dto: CreateStudentDto,
    ) -> Result<Student, AppError> {
        DepartmentService::ensure_in_school(db, school_id, dto.department_id).await?;

        let mut tx = db.begin().await?;

        let user_id = UserService::insert_account(&mut tx, school_id, &dto.account, Role::Student)
            .await?;

        let student_id = sqlx::query_scalar::<_, StudentId>(
            r#"INSERT INTO students
                 (user_id, school_id, student_number, department_id, date_of_birth, gender,
                  address, guardian_name, guardian_phone, enrollment_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(school_id)
        .bind(dto.student_number.trim())
        .bind(dto.department_id)
        .bind(dto.date_of_birth)
        .bind(&dto.gender)
        .bind(&dto.address)
        .bind(&dto.guardian_name)
        .bind(&dto.guardian_phone)
        .bind(dto.enrollment_date.unwrap_or_else(|| Utc::now().date_naive()))
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint_violation("Student number already exists in this school"))?;

        tx.commit().await?;

        invalidate::student(cache, student_id.into_inner(), school_id.into_inner()).await;
        info!(student.id = %student_id, "Student created");

        Self::load(db, student_id).await
    }

    async fn load(db: &PgPool, id: StudentId) -> Result<Student, AppError> {
        sqlx::query_as::<_, Student>(&format!(
            "{STUDENT_SELECT} WHERE s.id = $1 AND s.is_deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Student not found")))
    }

    #[instrument(skip(db, cache, filters))]
    pub async fn list(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        filters: StudentFilterParams,
    ) -> Result<PaginatedStudents, AppError> {
        let filters = &filters;
        let load = move || async move {
            let pagination = &filters.pagination;
            let search = filters.search.as_deref().map(|s| format!("%{s}%"));

            let total = sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM students s JOIN users u ON u.id = s.user_id {STUDENT_FILTER}"
            ))
            .bind(scope)
            .bind(filters.status)
            .bind(filters.department_id)
            .bind(&search)
            .fetch_one(db)
            .await?;

            let students = sqlx::query_as::<_, Student>(&format!(
                "{STUDENT_SELECT} {STUDENT_FILTER} \
                 ORDER BY u.last_name, u.first_name LIMIT $5 OFFSET $6"
            ))
            .bind(scope)
            .bind(filters.status)
            .bind(filters.department_id)
            .bind(&search)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(db)
            .await?;

            debug!(total, returned = students.len(), "Students fetched");
            Ok::<_, AppError>(PaginatedStudents::new(students, pagination, total))
        };

        // Lists are only cached per school
        let Some(school_id) = scope else {
            return load().await;
        };

        let key = keys::students::list(
            school_id.into_inner(),
            &hash_filters(&(
                &filters.search,
                filters.status.map(|s| s as u8),
                filters.department_id,
                &filters.pagination,
            )),
        );
        cached(cache, &key, load).await
    }

    /// Cached by ID; the tenant check runs on every read.
    #[instrument(skip(db, cache))]
    pub async fn get(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: StudentId,
    ) -> Result<Student, AppError> {
        let key = keys::students::by_id(id.into_inner());
        let student = cached(cache, &key, || Self::load(db, id)).await?;

        if scope.is_some_and(|school| school != student.school_id) {
            return Err(AppError::not_found(anyhow!("Student not found")));
        }
        Ok(student)
    }

    #[instrument(skip(db, cache, dto))]
    pub async fn update(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: StudentId,
        dto: UpdateStudentDto,
    ) -> Result<Student, AppError> {
        let existing = Self::get(db, None, scope, id).await?;
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
            r#"UPDATE students
               SET department_id = COALESCE($2, department_id),
                   date_of_birth = COALESCE($3, date_of_birth),
                   gender = COALESCE($4, gender),
                   address = COALESCE($5, address),
                   guardian_name = COALESCE($6, guardian_name),
                   guardian_phone = COALESCE($7, guardian_phone),
                   status = COALESCE($8, status),
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .bind(dto.department_id)
        .bind(dto.date_of_birth)
        .bind(&dto.gender)
        .bind(&dto.address)
        .bind(&dto.guardian_name)
        .bind(&dto.guardian_phone)
        .bind(dto.status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        invalidate::student(cache, id.into_inner(), existing.school_id.into_inner()).await;
        Self::load(db, id).await
    }

    /// Soft delete. The login account is deactivated and active enrollments
    /// are withdrawn so they stop holding seats.
    #[instrument(skip(db, cache))]
    pub async fn delete(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        id: StudentId,
    ) -> Result<Student, AppError> {
        let existing = Self::get(db, None, scope, id).await?;

        let mut tx = db.begin().await?;

        sqlx::query(
            r#"UPDATE students SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        UserService::deactivate_account(&mut tx, existing.user_id).await?;

        let withdrawn = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"UPDATE enrollments SET status = 'withdrawn', dropped_at = NOW(), updated_at = NOW()
               WHERE student_id = $1 AND status = 'active' AND is_deleted = FALSE
               RETURNING course_id"#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let school = existing.school_id.into_inner();
        invalidate::student(cache, id.into_inner(), school).await;
        for course_id in withdrawn {
            invalidate::course(cache, course_id, school).await;
        }

        info!(student.id = %id, "Student deleted");
        Ok(existing)
    }

    #[instrument(skip(db))]
    pub async fn enrollments(db: &PgPool, id: StudentId) -> Result<Vec<StudentCourse>, AppError> {
        let courses = sqlx::query_as::<_, StudentCourse>(
            r#"SELECT e.id AS enrollment_id, c.id AS course_id, c.code AS course_code,
                      c.name AS course_name, c.credit_hours, e.semester_id, e.status,
                      e.final_score, e.final_letter, e.enrolled_at
               FROM enrollments e
               JOIN courses c ON c.id = e.course_id
               WHERE e.student_id = $1 AND e.is_deleted = FALSE
               ORDER BY e.enrolled_at DESC"#,
        )
        .bind(id)
        .fetch_all(db)
        .await?;

        Ok(courses)
    }
}
