//! Demo data seeding.
//!
//! Seeded schools are tagged by their code prefix so `clear_all` removes
//! exactly what was generated and never touches real tenants.

pub mod courses;
pub mod models;
pub mod schools;
pub mod users;

use schoolhub_core::hash_password;
use schoolhub_models::Role;
use sqlx::PgPool;
use std::time::Instant;

pub use models::{PerSchool, SEED_PASSWORD, SeedConfig};

use crate::CliResult;

pub async fn seed_all(db: &PgPool, config: SeedConfig) -> CliResult<()> {
    let start = Instant::now();
    let per = &config.per_school;
    println!("🌱 Seeding {} schools", config.num_schools);

    // one bcrypt hash for everyone; hashing per user dominates otherwise
    let password_hash = hash_password(SEED_PASSWORD).map_err(|e| e.to_string())?;

    let school_ids = schools::seed_schools(db, config.num_schools).await?;
    let departments = schools::seed_departments(db, &school_ids, per.departments).await?;
    let semesters = schools::seed_semesters(db, &school_ids).await?;

    let teacher_seeds = users::generate_people(&departments, &school_ids, per.teachers, Role::Teacher);
    let teachers = users::seed_teachers(db, &teacher_seeds, &password_hash).await?;

    let student_seeds = users::generate_people(&departments, &school_ids, per.students, Role::Student);
    let students = users::seed_students(db, &student_seeds, &password_hash).await?;

    let course_seeds =
        courses::generate_courses(&departments, &teachers, &semesters, per.courses_per_department);
    let course_ids = courses::seed_courses(db, &course_seeds).await?;
    courses::seed_enrollments(
        db,
        &students,
        &course_ids,
        config.effective_enrollments_per_student(),
    )
    .await?;

    println!("\n✅ Seeding complete in {:?}", start.elapsed());
    println!("   Every seeded account uses the password `{SEED_PASSWORD}`");
    Ok(())
}

pub async fn clear_all(db: &PgPool) -> CliResult<u64> {
    let removed = schools::clear_seeded_schools(db).await?;
    println!("\n✅ Seed data cleared");
    Ok(removed)
}
