use std::collections::BTreeMap;

use chrono::Utc;
use schoolhub_cache::RedisCache;
use schoolhub_core::AppError;
use schoolhub_core::grading::{grade_points, letter_grade, round2};
use schoolhub_db::PgPool;
use schoolhub_models::attendance::AttendanceCounts;
use schoolhub_models::courses::Course;
use schoolhub_models::ids::{SchoolId, SemesterId, StudentId};
use tracing::{debug, instrument};

use crate::modules::grades::GradeService;
use crate::modules::students::StudentService;

use super::model::{
    AttendanceReportRow, CourseAttendanceReport, CourseGradeReport, CourseGradeReportRow,
    DashboardStats, Transcript, TranscriptRow,
};

/// Letters in scale order with how many students landed on each.
fn grade_distribution(rows: &[CourseGradeReportRow]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for letter in rows.iter().filter_map(|r| r.letter_grade.as_deref()) {
        *counts.entry(letter).or_default() += 1;
    }
    let mut distribution: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(letter, n)| (letter.to_string(), n))
        .collect();
    distribution.sort_by(|a, b| grade_points(&b.0).total_cmp(&grade_points(&a.0)).then(a.0.cmp(&b.0)));
    distribution
}

fn build_grade_report(course: &Course, mut rows: Vec<CourseGradeReportRow>) -> CourseGradeReport {
    for row in &mut rows {
        row.weighted_average = row.weighted_average.map(round2);
        row.letter_grade = row.weighted_average.map(|avg| letter_grade(avg).to_string());
    }

    let averages: Vec<f64> = rows.iter().filter_map(|r| r.weighted_average).collect();
    let class_average = (!averages.is_empty())
        .then(|| round2(averages.iter().sum::<f64>() / averages.len() as f64));

    CourseGradeReport {
        course_id: course.id,
        course_code: course.code.clone(),
        course_name: course.name.clone(),
        class_average,
        highest: averages.iter().copied().reduce(f64::max),
        lowest: averages.iter().copied().reduce(f64::min),
        distribution: grade_distribution(&rows),
        students: rows,
    }
}

fn build_attendance_report(course: &Course, mut rows: Vec<AttendanceReportRow>) -> CourseAttendanceReport {
    let mut overall = AttendanceCounts::default();
    for row in &mut rows {
        row.attendance_rate = row.counts.rate();
        overall.present += row.counts.present;
        overall.absent += row.counts.absent;
        overall.late += row.counts.late;
        overall.excused += row.counts.excused;
    }

    CourseAttendanceReport {
        course_id: course.id,
        course_code: course.code.clone(),
        course_name: course.name.clone(),
        overall_rate: overall.rate(),
        students: rows,
    }
}

pub struct ReportService;

impl ReportService {
    /// Every enrollment the student has had, newest semester first, with the
    /// same GPA the grades endpoint reports.
    #[instrument(skip(db, cache))]
    pub async fn transcript(
        db: &PgPool,
        cache: Option<&RedisCache>,
        scope: Option<SchoolId>,
        student_id: StudentId,
    ) -> Result<Transcript, AppError> {
        let student = StudentService::get(db, cache, scope, student_id).await?;

        let mut courses = sqlx::query_as::<_, TranscriptRow>(
            r#"SELECT sem.name AS semester_name, c.code AS course_code, c.name AS course_name,
                      c.credit_hours, e.status, e.final_score, e.final_letter
               FROM enrollments e
               JOIN courses c ON c.id = e.course_id
               LEFT JOIN semesters sem ON sem.id = e.semester_id
               WHERE e.student_id = $1 AND e.is_deleted = FALSE
               ORDER BY sem.start_date DESC NULLS LAST, c.code"#,
        )
        .bind(student_id)
        .fetch_all(db)
        .await?;

        for row in &mut courses {
            row.grade_points = row.final_letter.as_deref().map(grade_points);
        }

        let gpa = GradeService::student_gpa(db, cache, student_id).await?;

        Ok(Transcript {
            student_id,
            student_number: student.student_number.clone(),
            student_name: student.full_name(),
            gpa: gpa.gpa,
            total_credits: gpa.total_credits,
            courses,
            generated_at: Utc::now(),
        })
    }

    #[instrument(skip(db, course), fields(course.id = %course.id))]
    pub async fn course_grades(db: &PgPool, course: &Course) -> Result<CourseGradeReport, AppError> {
        let rows = sqlx::query_as::<_, CourseGradeReportRow>(
            r#"SELECT s.id AS student_id, s.student_number,
                      u.first_name || ' ' || u.last_name AS student_name,
                      COUNT(g.id) AS grade_count,
                      CASE WHEN SUM(g.weight) > 0
                           THEN SUM(g.score * g.weight) / SUM(g.weight) END AS weighted_average
               FROM enrollments e
               JOIN students s ON s.id = e.student_id
               JOIN users u ON u.id = s.user_id
               LEFT JOIN grades g ON g.enrollment_id = e.id AND g.is_deleted = FALSE
               WHERE e.course_id = $1 AND e.is_deleted = FALSE
                 AND e.status IN ('active', 'completed')
               GROUP BY s.id, s.student_number, u.first_name, u.last_name
               ORDER BY u.last_name, u.first_name"#,
        )
        .bind(course.id)
        .fetch_all(db)
        .await?;

        debug!(students = rows.len(), "Grade report rows fetched");
        Ok(build_grade_report(course, rows))
    }

    #[instrument(skip(db, course), fields(course.id = %course.id))]
    pub async fn course_attendance(
        db: &PgPool,
        course: &Course,
    ) -> Result<CourseAttendanceReport, AppError> {
        let rows = sqlx::query_as::<_, AttendanceReportRow>(
            r#"SELECT s.id AS student_id, s.student_number,
                      u.first_name || ' ' || u.last_name AS student_name,
                      COUNT(a.id) FILTER (WHERE a.status = 'present') AS present,
                      COUNT(a.id) FILTER (WHERE a.status = 'absent') AS absent,
                      COUNT(a.id) FILTER (WHERE a.status = 'late') AS late,
                      COUNT(a.id) FILTER (WHERE a.status = 'excused') AS excused
               FROM enrollments e
               JOIN students s ON s.id = e.student_id
               JOIN users u ON u.id = s.user_id
               LEFT JOIN attendance a ON a.student_id = e.student_id AND a.course_id = e.course_id
               WHERE e.course_id = $1 AND e.is_deleted = FALSE
                 AND e.status IN ('active', 'completed')
               GROUP BY s.id, s.student_number, u.first_name, u.last_name
               ORDER BY u.last_name, u.first_name"#,
        )
        .bind(course.id)
        .fetch_all(db)
        .await?;

        Ok(build_attendance_report(course, rows))
    }

    /// Headline numbers for one school, or the whole platform when `scope`
    /// is `None`.
    #[instrument(skip(db))]
    pub async fn dashboard(db: &PgPool, scope: Option<SchoolId>) -> Result<DashboardStats, AppError> {
        let mut stats = sqlx::query_as::<_, DashboardStats>(
            r#"SELECT
                 (SELECT COUNT(*) FROM students
                   WHERE is_deleted = FALSE AND ($1::uuid IS NULL OR school_id = $1)) AS total_students,
                 (SELECT COUNT(*) FROM students
                   WHERE is_deleted = FALSE AND status = 'active'
                     AND ($1::uuid IS NULL OR school_id = $1)) AS active_students,
                 (SELECT COUNT(*) FROM teachers
                   WHERE is_deleted = FALSE AND ($1::uuid IS NULL OR school_id = $1)) AS total_teachers,
                 (SELECT COUNT(*) FROM courses
                   WHERE is_deleted = FALSE AND ($1::uuid IS NULL OR school_id = $1)) AS total_courses,
                 (SELECT COUNT(*) FROM enrollments e JOIN courses c ON c.id = e.course_id
                   WHERE e.is_deleted = FALSE AND e.status = 'active'
                     AND ($1::uuid IS NULL OR c.school_id = $1)) AS active_enrollments,
                 (SELECT COUNT(*) FROM departments
                   WHERE is_deleted = FALSE AND ($1::uuid IS NULL OR school_id = $1)) AS departments"#,
        )
        .bind(scope)
        .fetch_one(db)
        .await?;

        if scope.is_some() {
            stats.current_semester_id = sqlx::query_scalar::<_, SemesterId>(
                r#"SELECT id FROM semesters
                   WHERE school_id = $1 AND is_current = TRUE AND is_deleted = FALSE"#,
            )
            .bind(scope)
            .fetch_optional(db)
            .await?;
        }

        let counts = sqlx::query_as::<_, AttendanceCounts>(
            r#"SELECT COUNT(*) FILTER (WHERE status = 'present') AS present,
                      COUNT(*) FILTER (WHERE status = 'absent') AS absent,
                      COUNT(*) FILTER (WHERE status = 'late') AS late,
                      COUNT(*) FILTER (WHERE status = 'excused') AS excused
               FROM attendance WHERE ($1::uuid IS NULL OR school_id = $1)"#,
        )
        .bind(scope)
        .fetch_one(db)
        .await?;
        stats.average_attendance_rate = counts.rate();

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use schoolhub_models::ids::{CourseId, SchoolId, StudentId};

    use super::*;

    fn course() -> Course {
        Course {
            id: CourseId::new(),
            school_id: SchoolId::new(),
            department_id: None,
            teacher_id: None,
            semester_id: None,
            code: "MTH201".into(),
            name: "Linear Algebra".into(),
            description: None,
            credit_hours: 4,
            max_capacity: 30,
            is_active: true,
            enrolled_count: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn grade_row(average: Option<f64>) -> CourseGradeReportRow {
        CourseGradeReportRow {
            student_id: StudentId::new(),
            student_number: "S".into(),
            student_name: "Student".into(),
            grade_count: i64::from(average.is_some()),
            weighted_average: average,
            letter_grade: None,
        }
    }

    #[test]
    fn test_grade_report_ignores_students_without_grades() {
        let rows = vec![
            grade_row(Some(91.456)),
            grade_row(Some(72.0)),
            grade_row(None),
        ];

        let report = build_grade_report(&course(), rows);

        assert_eq!(report.class_average, Some(81.73));
        assert_eq!(report.highest, Some(91.46));
        assert_eq!(report.lowest, Some(72.0));
        assert_eq!(report.students[2].letter_grade, None);
        let total: usize = report.distribution.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_grade_report_without_any_grades() {
        let report = build_grade_report(&course(), vec![grade_row(None)]);
        assert_eq!(report.class_average, None);
        assert_eq!(report.highest, None);
        assert!(report.distribution.is_empty());
    }

    #[test]
    fn test_distribution_orders_best_letter_first() {
        let mut rows = vec![grade_row(None), grade_row(None), grade_row(None)];
        rows[0].letter_grade = Some("C".into());
        rows[1].letter_grade = Some("A".into());
        rows[2].letter_grade = Some("C".into());

        let distribution = grade_distribution(&rows);
        assert_eq!(distribution, vec![("A".to_string(), 1), ("C".to_string(), 2)]);
    }

    #[test]
    fn test_attendance_report_overall_rate() {
        let row = |present, absent| AttendanceReportRow {
            student_id: StudentId::new(),
            student_number: "S".into(),
            student_name: "Student".into(),
            counts: AttendanceCounts {
                present,
                absent,
                ..Default::default()
            },
            attendance_rate: 0.0,
        };

        let report = build_attendance_report(&course(), vec![row(3, 1), row(1, 3)]);
        assert_eq!(report.students[0].attendance_rate, 75.0);
        assert_eq!(report.students[1].attendance_rate, 25.0);
        assert_eq!(report.overall_rate, 50.0);
    }
}
