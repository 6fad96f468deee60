//! Courses and enrollments.

use rand::Rng;
use rand::seq::SliceRandom;
use schoolhub_models::ids::{CourseId, DepartmentId, SchoolId, SemesterId, StudentId, TeacherId};
use sqlx::PgPool;
use std::time::Instant;

use crate::CliResult;

const LEVELS: &[&str] = &["Foundations of", "Intermediate", "Advanced", "Topics in"];

pub struct CourseSeed {
    pub school_id: SchoolId,
    pub department_id: DepartmentId,
    pub teacher_id: Option<TeacherId>,
    pub semester_id: Option<SemesterId>,
    pub code: String,
    pub name: String,
    pub credit_hours: i32,
    pub max_capacity: i32,
}

pub fn generate_courses(
    departments: &[(SchoolId, DepartmentId)],
    teachers: &[(SchoolId, TeacherId)],
    semesters: &[(SchoolId, SemesterId)],
    per_department: usize,
) -> Vec<CourseSeed> {
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(departments.len() * per_department);

    for (dept_idx, &(school_id, department_id)) in departments.iter().enumerate() {
        let school_teachers: Vec<TeacherId> = teachers
            .iter()
            .filter(|(s, _)| *s == school_id)
            .map(|(_, t)| *t)
            .collect();
        let semester_id = semesters
            .iter()
            .find(|(s, _)| *s == school_id)
            .map(|(_, id)| *id);

        for i in 0..per_department {
            let level = LEVELS[i % LEVELS.len()];
            out.push(CourseSeed {
                school_id,
                department_id,
                teacher_id: school_teachers.choose(&mut rng).copied(),
                semester_id,
                code: format!("C{dept_idx:03}{}", 101 + i * 100),
                name: format!("{level} Subject {}", dept_idx * per_department + i + 1),
                credit_hours: rng.gen_range(1..=4),
                max_capacity: rng.gen_range(25..=60),
            });
        }
    }

    out
}

pub async fn seed_courses(
    db: &PgPool,
    courses: &[CourseSeed],
) -> CliResult<Vec<(SchoolId, CourseId, Option<SemesterId>, i32)>> {
    let start = Instant::now();
    println!("📘 Seeding {} courses...", courses.len());

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(courses.len());

    for course in courses {
        let id: CourseId = sqlx::query_scalar(
            r#"INSERT INTO courses
                 (school_id, department_id, teacher_id, semester_id, code, name, credit_hours, max_capacity)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id"#,
        )
        .bind(course.school_id)
        .bind(course.department_id)
        .bind(course.teacher_id)
        .bind(course.semester_id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(course.credit_hours)
        .bind(course.max_capacity)
        .fetch_one(&mut *tx)
        .await?;
        ids.push((course.school_id, id, course.semester_id, course.max_capacity));
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} courses in {:?}", ids.len(), start.elapsed());
    Ok(ids)
}

/// Enrolls each student in up to `per_student` random courses of their
/// school, skipping courses that are already full.
pub async fn seed_enrollments(
    db: &PgPool,
    students: &[(SchoolId, StudentId)],
    courses: &[(SchoolId, CourseId, Option<SemesterId>, i32)],
    per_student: usize,
) -> CliResult<u64> {
    let start = Instant::now();
    let mut rng = rand::thread_rng();
    let mut seats: std::collections::HashMap<CourseId, i32> =
        courses.iter().map(|(_, id, _, cap)| (*id, *cap)).collect();

    let mut tx = db.begin().await?;
    let mut inserted = 0u64;

    for &(school_id, student_id) in students {
        let mut options: Vec<_> = courses.iter().filter(|(s, ..)| *s == school_id).collect();
        options.shuffle(&mut rng);

        let mut taken = 0;
        for &&(_, course_id, semester_id, _) in &options {
            if taken == per_student {
                break;
            }
            let Some(left) = seats.get_mut(&course_id) else {
                continue;
            };
            if *left == 0 {
                continue;
            }

            sqlx::query(
                r#"INSERT INTO enrollments (school_id, student_id, course_id, semester_id)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(school_id)
            .bind(student_id)
            .bind(course_id)
            .bind(semester_id)
            .execute(&mut *tx)
            .await?;

            *left -= 1;
            taken += 1;
            inserted += 1;
        }
    }

    tx.commit().await?;
    println!("📝 Inserted {inserted} enrollments in {:?}", start.elapsed());
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_courses_stay_in_school_and_bounds() {
        let school = SchoolId::new();
        let other = SchoolId::new();
        let dept = DepartmentId::new();
        let teacher = TeacherId::new();
        let courses = generate_courses(
            &[(school, dept)],
            &[(school, teacher), (other, TeacherId::new())],
            &[(school, SemesterId::new())],
            3,
        );

        assert_eq!(courses.len(), 3);
        for c in &courses {
            assert_eq!(c.teacher_id, Some(teacher));
            assert!((1..=4).contains(&c.credit_hours));
            assert!(c.max_capacity >= 25);
            assert!(c.semester_id.is_some());
        }
        let mut codes: Vec<_> = courses.iter().map(|c| c.code.clone()).collect();
        codes.dedup();
        assert_eq!(codes.len(), 3);
    }
}
