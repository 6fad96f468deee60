use std::collections::HashMap;

use anyhow::anyhow;
use schoolhub_cache::{RedisCache, cached, invalidate, keys};
use schoolhub_core::AppError;
use schoolhub_core::grading::{self, grade_points, letter_grade, validate_score, weighted_average};
use schoolhub_db::PgPool;
use schoolhub_models::enrollments::EnrollmentStatus;
use schoolhub_models::ids::{
    CourseId, EnrollmentId, GradeId, SchoolId, StudentId, TeacherId, UserId,
};
use schoolhub_models::students::StudentGpaResponse;
use sqlx::{FromRow, PgConnection};
use tracing::{debug, info, instrument};

use crate::metrics;

use super::model::{
    BulkCreateGradesDto, CourseGradeSummary, CreateGradeDto, GRADE_COLUMNS, Grade,
    GradeFilterParams, PaginatedGrades, UpdateGradeDto,
};

const GRADE_FILTER: &str = r#"
    WHERE is_deleted = FALSE
      AND ($1::uuid IS NULL OR school_id = $1)
      AND ($2::uuid IS NULL OR student_id = $2)
      AND ($3::uuid IS NULL OR course_id = $3)
      AND ($4::uuid IS NULL OR enrollment_id = $4)
      AND ($5::text IS NULL OR grade_type = $5)
"#;

/// Who is recording grades. Teachers are limited to the courses they teach.
#[derive(Debug, Clone, Copy)]
pub struct Grader {
    pub user_id: UserId,
    pub teacher_id: Option<TeacherId>,
}

impl Grader {
    fn ensure_teaches(&self, course_teacher: Option<TeacherId>) -> Result<(), AppError> {
        match self.teacher_id {
            Some(own) if Some(own) != course_teacher => Err(AppError::forbidden(
                "Only the course's teacher may grade it",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, FromRow)]
struct GradeTarget {
    school_id: SchoolId,
    student_id: StudentId,
    course_id: CourseId,
    status: EnrollmentStatus,
    teacher_id: Option<TeacherId>,
}

#[derive(Debug, FromRow)]
struct CreditRow {
    enrollment_id: EnrollmentId,
    status: EnrollmentStatus,
    final_score: Option<f64>,
    credit_hours: i32,
}

#[derive(Debug, FromRow)]
struct WeightedScore {
    enrollment_id: EnrollmentId,
    score: f64,
    weight: f64,
}

/// `(score, credit hours)` pairs feeding the GPA. Completed enrollments count
/// with their final score; when there are none, active enrollments count with
/// the weighted average of their grades.
fn gpa_inputs(enrollments: &[CreditRow], grades: &[WeightedScore]) -> Vec<(f64, i32)> {
    let completed: Vec<(f64, i32)> = enrollments
        .iter()
        .filter(|e| e.status == EnrollmentStatus::Completed)
        .filter_map(|e| e.final_score.map(|score| (score, e.credit_hours)))
        .collect();
    if !completed.is_empty() {
        return completed;
    }

    let mut by_enrollment: HashMap<EnrollmentId, Vec<(f64, f64)>> = HashMap::new();
    for grade in grades {
        by_enrollment
            .entry(grade.enrollment_id)
            .or_default()
            .push((grade.score, grade.weight));
    }

    enrollments
        .iter()
        .filter(|e| e.status == EnrollmentStatus::Active)
        .filter_map(|e| {
            let entries = by_enrollment.get(&e.enrollment_id)?;
            weighted_average(entries).map(|avg| (avg, e.credit_hours))
        })
        .collect()
}

pub struct GradeService;

impl GradeService {
    /// Checks the enrollment and inserts one grade on `conn`.
    async fn insert_grade(
        conn: &mut PgConnection,
        scope: Option<SchoolId>,
        grader: Grader,
        dto: &CreateGradeDto,
    ) -> Result<Grade, AppError> {
        validate_score(dto.score)?;

        let target = sqlx::query_as::<_, GradeTarget>(
            r#"SELECT e.school_id, e.student_id, e.course_id, e.status, c.teacher_id
               FROM enrollments e
               JOIN courses c ON c.id = e.course_id
               WHERE e.id = $1 AND e.is_deleted = FALSE
                 AND ($2::uuid IS NULL OR e.school_id = $2)"#,
        )
        .bind(dto.enrollment_id)
        .bind(scope)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Enrollment not found")))?;

        if !matches!(
            target.status,
            EnrollmentStatus::Active | EnrollmentStatus::Completed
        ) {
            return Err(AppError::bad_request(anyhow!(
                "Cannot grade a dropped or withdrawn enrollment"
            )));
        }
        grader.ensure_teaches(target.teacher_id)?;

        let grade = sqlx::query_as::<_, Grade>(&format!(
            r#"INSERT INTO grades
                 (school_id, enrollment_id, student_id, course_id, grade_type, title,
                  score, weight, letter_grade, comments, graded_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING {GRADE_COLUMNS}"#
        ))
        .bind(target.school_id)
        .bind(dto.enrollment_id)
        .bind(target.student_id)
        .bind(target.course_id)
        .bind(dto.grade_type.trim())
        .bind(dto.title.trim())
        .bind(dto.score)
        .bind(dto.weight)
        .bind(letter_grade(dto.score))
        .bind(&dto.comments)
        .bind(grader.user_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(grade)
    }

    #[instrument(skip(db, cache, dto), fields(enrollment.id = %dto.enrollment_id))]
    pub async fn create(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        grader: Grader,
        dto: CreateGradeDto,
    ) -> Result<Grade, AppError> {
        let mut conn = db.acquire().await?;
        let grade = Self::insert_grade(&mut conn, scope, grader, &dto).await?;

        invalidate::gpa(cache, grade.student_id.into_inner()).await;
        metrics::track_grades_recorded(1);
        info!(grade.id = %grade.id, letter = %grade.letter_grade, "Grade recorded");
        Ok(grade)
    }

    /// All or nothing: the first invalid entry rolls the whole batch back.
    #[instrument(skip(db, cache, dto), fields(count = dto.grades.len()))]
    pub async fn bulk_create(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        grader: Grader,
        dto: BulkCreateGradesDto,
    ) -> Result<Vec<Grade>, AppError> {
        let mut tx = db.begin().await?;
        let mut grades = Vec::with_capacity(dto.grades.len());

        for (index, entry) in dto.grades.iter().enumerate() {
            let grade = Self::insert_grade(&mut tx, scope, grader, entry)
                .await
                .map_err(|e| AppError::new(e.status, anyhow!("grades[{index}]: {}", e.error)))?;
            grades.push(grade);
        }

        tx.commit().await?;

        let mut students: Vec<StudentId> = grades.iter().map(|g| g.student_id).collect();
        students.sort_unstable_by_key(|id| id.into_inner());
        students.dedup();
        for student_id in students {
            invalidate::gpa(cache, student_id.into_inner()).await;
        }

        metrics::track_grades_recorded(grades.len());
        info!(count = grades.len(), "Grades recorded in bulk");
        Ok(grades)
    }

    #[instrument(skip(db))]
    pub async fn get(db: &PgPool, scope: Option<SchoolId>, id: GradeId) -> Result<Grade, AppError> {
        sqlx::query_as::<_, Grade>(&format!(
            r#"SELECT {GRADE_COLUMNS} FROM grades
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Grade not found")))
    }

    /// Teacher of the course a grade belongs to.
    pub async fn course_teacher(
        db: &PgPool,
        course_id: CourseId,
    ) -> Result<Option<TeacherId>, AppError> {
        let teacher = sqlx::query_scalar::<_, Option<TeacherId>>(
            "SELECT teacher_id FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(db)
        .await?
        .flatten();
        Ok(teacher)
    }

    #[instrument(skip(db, cache, dto))]
    pub async fn update(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        grader: Grader,
        id: GradeId,
        dto: UpdateGradeDto,
    ) -> Result<Grade, AppError> {
        let existing = Self::get(db, scope, id).await?;
        grader.ensure_teaches(Self::course_teacher(db, existing.course_id).await?)?;

        if let Some(score) = dto.score {
            validate_score(score)?;
        }
        let letter = dto.score.map(letter_grade);

        let grade = sqlx::query_as::<_, Grade>(&format!(
            r#"UPDATE grades
               SET grade_type = COALESCE($2, grade_type),
                   title = COALESCE($3, title),
                   score = COALESCE($4, score),
                   weight = COALESCE($5, weight),
                   letter_grade = COALESCE($6, letter_grade),
                   comments = COALESCE($7, comments),
                   graded_by = $8,
                   graded_at = CASE WHEN $4 IS NULL THEN graded_at ELSE NOW() END,
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING {GRADE_COLUMNS}"#
        ))
        .bind(id)
        .bind(&dto.grade_type)
        .bind(&dto.title)
        .bind(dto.score)
        .bind(dto.weight)
        .bind(letter)
        .bind(&dto.comments)
        .bind(grader.user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Grade not found")))?;

        invalidate::gpa(cache, grade.student_id.into_inner()).await;
        Ok(grade)
    }

    #[instrument(skip(db, cache))]
    pub async fn delete(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        grader: Grader,
        id: GradeId,
    ) -> Result<Grade, AppError> {
        let existing = Self::get(db, scope, id).await?;
        grader.ensure_teaches(Self::course_teacher(db, existing.course_id).await?)?;

        sqlx::query(
            r#"UPDATE grades SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(db)
        .await?;

        invalidate::gpa(cache, existing.student_id.into_inner()).await;
        info!(grade.id = %id, "Grade deleted");
        Ok(existing)
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: GradeFilterParams,
    ) -> Result<PaginatedGrades, AppError> {
        let pagination = &filters.pagination;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM grades {GRADE_FILTER}"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.enrollment_id)
        .bind(&filters.grade_type)
        .fetch_one(db)
        .await?;

        let grades = sqlx::query_as::<_, Grade>(&format!(
            "SELECT {GRADE_COLUMNS} FROM grades {GRADE_FILTER} \
             ORDER BY graded_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.enrollment_id)
        .bind(&filters.grade_type)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedGrades::new(grades, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn course_summary(
        db: &PgPool,
        scope: Option<SchoolId>,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<CourseGradeSummary, AppError> {
        let grades = sqlx::query_as::<_, Grade>(&format!(
            r#"SELECT {GRADE_COLUMNS} FROM grades
               WHERE student_id = $1 AND course_id = $2 AND is_deleted = FALSE
                 AND ($3::uuid IS NULL OR school_id = $3)
               ORDER BY graded_at"#
        ))
        .bind(student_id)
        .bind(course_id)
        .bind(scope)
        .fetch_all(db)
        .await?;

        let entries: Vec<(f64, f64)> = grades.iter().map(|g| (g.score, g.weight)).collect();
        let average = weighted_average(&entries);
        let letter = average.map(letter_grade);

        Ok(CourseGradeSummary {
            student_id,
            course_id,
            grade_count: grades.len(),
            weighted_average: average,
            letter_grade: letter.map(str::to_string),
            grade_points: letter.map(grade_points),
            grades,
        })
    }

    /// Final score for an enrollment from its recorded grades.
    pub async fn enrollment_average(
        conn: &mut PgConnection,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<f64>, AppError> {
        let entries = sqlx::query_as::<_, (f64, f64)>(
            "SELECT score, weight FROM grades WHERE enrollment_id = $1 AND is_deleted = FALSE",
        )
        .bind(enrollment_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(weighted_average(&entries))
    }

    /// Cached per student and dropped whenever one of their grades or
    /// enrollments changes.
    #[instrument(skip(db, cache))]
    pub async fn student_gpa(
        db: &PgPool,
        cache: Option<&RedisCache>,
        student_id: StudentId,
    ) -> Result<StudentGpaResponse, AppError> {
        let key = keys::gpa::student(student_id.into_inner());
        cached(cache, &key, || async move {
            let enrollments = sqlx::query_as::<_, CreditRow>(
                r#"SELECT e.id AS enrollment_id, e.status, e.final_score, c.credit_hours
                   FROM enrollments e
                   JOIN courses c ON c.id = e.course_id
                   WHERE e.student_id = $1 AND e.is_deleted = FALSE
                     AND e.status IN ('active', 'completed')"#,
            )
            .bind(student_id)
            .fetch_all(db)
            .await?;

            let grades = sqlx::query_as::<_, WeightedScore>(
                r#"SELECT enrollment_id, score, weight FROM grades
                   WHERE student_id = $1 AND is_deleted = FALSE"#,
            )
            .bind(student_id)
            .fetch_all(db)
            .await?;

            let inputs = gpa_inputs(&enrollments, &grades);
            let gpa = grading::gpa(&inputs);
            debug!(courses = inputs.len(), gpa, "GPA computed");

            Ok::<_, AppError>(StudentGpaResponse {
                student_id,
                gpa,
                total_credits: inputs.iter().map(|(_, c)| i64::from(*c)).sum(),
                courses_counted: inputs.len(),
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment(status: EnrollmentStatus, final_score: Option<f64>, credits: i32) -> CreditRow {
        CreditRow {
            enrollment_id: EnrollmentId::new(),
            status,
            final_score,
            credit_hours: credits,
        }
    }

    #[test]
    fn test_completed_enrollments_take_precedence() {
        let done = enrollment(EnrollmentStatus::Completed, Some(95.0), 3);
        let active = enrollment(EnrollmentStatus::Active, None, 4);
        let grades = vec![WeightedScore {
            enrollment_id: active.enrollment_id,
            score: 50.0,
            weight: 1.0,
        }];

        let inputs = gpa_inputs(&[done, active], &grades);
        assert_eq!(inputs, vec![(95.0, 3)]);
    }

    #[test]
    fn test_active_enrollments_use_weighted_grades() {
        let graded = enrollment(EnrollmentStatus::Active, None, 3);
        let ungraded = enrollment(EnrollmentStatus::Active, None, 4);
        let grades = vec![
            WeightedScore {
                enrollment_id: graded.enrollment_id,
                score: 80.0,
                weight: 1.0,
            },
            WeightedScore {
                enrollment_id: graded.enrollment_id,
                score: 100.0,
                weight: 3.0,
            },
        ];

        let inputs = gpa_inputs(&[graded, ungraded], &grades);
        assert_eq!(inputs, vec![(95.0, 3)]);
        assert_eq!(grading::gpa(&inputs), 4.0);
    }

    #[test]
    fn test_no_enrollments_gives_zero() {
        assert!(gpa_inputs(&[], &[]).is_empty());
        assert_eq!(grading::gpa(&[]), 0.0);
    }

    #[test]
    fn test_teacher_limited_to_own_course() {
        let own = TeacherId::new();
        let grader = Grader {
            user_id: UserId::new(),
            teacher_id: Some(own),
        };
        assert!(grader.ensure_teaches(Some(own)).is_ok());
        assert!(grader.ensure_teaches(Some(TeacherId::new())).is_err());
        assert!(grader.ensure_teaches(None).is_err());

        let admin = Grader {
            user_id: UserId::new(),
            teacher_id: None,
        };
        assert!(admin.ensure_teaches(None).is_ok());
    }
}
