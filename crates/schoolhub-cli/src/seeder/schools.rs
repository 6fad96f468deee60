//! Schools, departments, and semesters.

use chrono::{Datelike, NaiveDate, Utc};
use fake::Fake;
use fake::faker::address::en::*;
use fake::faker::phone_number::en::PhoneNumber;
use rayon::prelude::*;
use schoolhub_models::ids::{DepartmentId, SchoolId, SemesterId};
use sqlx::PgPool;
use std::time::Instant;

use super::models::{DepartmentSeed, SEED_CODE_PREFIX, SchoolSeed};
use crate::CliResult;

const DEPARTMENT_NAMES: &[(&str, &str)] = &[
    ("Mathematics", "MATH"),
    ("Sciences", "SCI"),
    ("Languages", "LANG"),
    ("Humanities", "HUM"),
    ("Arts", "ART"),
    ("Computing", "CS"),
    ("Physical Education", "PE"),
    ("Economics", "ECON"),
];

pub fn generate_schools(count: usize) -> Vec<SchoolSeed> {
    let run = Utc::now().timestamp() % 100_000;
    (0..count)
        .into_par_iter()
        .map(|i| {
            let city: String = CityName().fake();
            let street: String = StreetName().fake();
            let building: String = BuildingNumber().fake();
            let zip: String = ZipCode().fake();

            SchoolSeed {
                name: format!("{city} Academy"),
                code: format!("{SEED_CODE_PREFIX}{run}-{i:03}"),
                address: format!("{building} {street}, {city} {zip}"),
                phone: PhoneNumber().fake(),
            }
        })
        .collect()
}

pub fn generate_departments(school_ids: &[SchoolId], per_school: usize) -> Vec<DepartmentSeed> {
    school_ids
        .iter()
        .flat_map(|&school_id| {
            DEPARTMENT_NAMES
                .iter()
                .cycle()
                .take(per_school)
                .enumerate()
                .map(move |(i, (name, code))| DepartmentSeed {
                    school_id,
                    name: (*name).to_string(),
                    // cycling past the list needs distinct codes
                    code: if i < DEPARTMENT_NAMES.len() {
                        (*code).to_string()
                    } else {
                        format!("{code}{}", i / DEPARTMENT_NAMES.len() + 1)
                    },
                })
        })
        .collect()
}

pub async fn seed_schools(db: &PgPool, count: usize) -> CliResult<Vec<SchoolId>> {
    let start = Instant::now();
    println!("🏫 Seeding {count} schools...");

    let schools = generate_schools(count);
    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(schools.len());

    for school in &schools {
        let id: SchoolId = sqlx::query_scalar(
            "INSERT INTO schools (name, code, address, phone) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&school.name)
        .bind(&school.code)
        .bind(&school.address)
        .bind(&school.phone)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} schools in {:?}", ids.len(), start.elapsed());
    Ok(ids)
}

pub async fn seed_departments(
    db: &PgPool,
    school_ids: &[SchoolId],
    per_school: usize,
) -> CliResult<Vec<(SchoolId, DepartmentId)>> {
    let start = Instant::now();
    let departments = generate_departments(school_ids, per_school);
    println!("🏛️  Seeding {} departments...", departments.len());

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(departments.len());

    for dept in &departments {
        let id: DepartmentId = sqlx::query_scalar(
            "INSERT INTO departments (school_id, name, code) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(dept.school_id)
        .bind(&dept.name)
        .bind(&dept.code)
        .fetch_one(&mut *tx)
        .await?;
        ids.push((dept.school_id, id));
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} departments in {:?}", ids.len(), start.elapsed());
    Ok(ids)
}

/// One current semester per school, spanning the running half year.
pub async fn seed_semesters(
    db: &PgPool,
    school_ids: &[SchoolId],
) -> CliResult<Vec<(SchoolId, SemesterId)>> {
    let today = Utc::now().date_naive();
    let (name, start_date, end_date) = semester_bounds(today);

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(school_ids.len());

    for &school_id in school_ids {
        let id: SemesterId = sqlx::query_scalar(
            r#"INSERT INTO semesters (school_id, name, start_date, end_date, is_current)
               VALUES ($1, $2, $3, $4, TRUE) RETURNING id"#,
        )
        .bind(school_id)
        .bind(&name)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&mut *tx)
        .await?;
        ids.push((school_id, id));
    }

    tx.commit().await?;
    println!("📅 Inserted {} current semesters ({name})", ids.len());
    Ok(ids)
}

/// Spring runs January to June, Fall July to December.
pub fn semester_bounds(today: NaiveDate) -> (String, NaiveDate, NaiveDate) {
    let year = today.year();
    let (label, start, end) = if today.month() <= 6 {
        ("Spring", (1, 1), (6, 30))
    } else {
        ("Fall", (7, 1), (12, 31))
    };
    let date = |(m, d): (u32, u32)| NaiveDate::from_ymd_opt(year, m, d).unwrap_or(today);
    (format!("{label} {year}"), date(start), date(end))
}

/// Deletes every school whose code carries the seed prefix, with all rows
/// that hang off it. Returns the number of schools removed.
pub async fn clear_seeded_schools(db: &PgPool) -> CliResult<u64> {
    let start = Instant::now();
    println!("🗑️  Clearing seeded schools...");

    let pattern = format!("{SEED_CODE_PREFIX}%");
    let mut tx = db.begin().await?;

    // children before parents; no cascades are declared on tenant data
    const SCOPED_DELETES: &[&str] = &[
        "DELETE FROM assignment_submissions WHERE assignment_id IN (SELECT id FROM assignments WHERE school_id = ANY($1))",
        "DELETE FROM grades WHERE school_id = ANY($1)",
        "DELETE FROM attendance WHERE school_id = ANY($1)",
        "DELETE FROM assignments WHERE school_id = ANY($1)",
        "DELETE FROM schedules WHERE school_id = ANY($1)",
        "DELETE FROM enrollments WHERE school_id = ANY($1)",
        "DELETE FROM documents WHERE school_id = ANY($1)",
        "DELETE FROM courses WHERE school_id = ANY($1)",
        "UPDATE departments SET head_teacher_id = NULL WHERE school_id = ANY($1)",
        "DELETE FROM students WHERE school_id = ANY($1)",
        "DELETE FROM teachers WHERE school_id = ANY($1)",
        "DELETE FROM departments WHERE school_id = ANY($1)",
        "DELETE FROM semesters WHERE school_id = ANY($1)",
        "DELETE FROM notifications WHERE school_id = ANY($1)",
        "DELETE FROM audit_logs WHERE school_id = ANY($1)",
        "DELETE FROM system_settings WHERE school_id = ANY($1)",
        "DELETE FROM users WHERE school_id = ANY($1)",
        "DELETE FROM schools WHERE id = ANY($1)",
    ];

    let school_ids: Vec<SchoolId> =
        sqlx::query_scalar("SELECT id FROM schools WHERE code LIKE $1")
            .bind(&pattern)
            .fetch_all(&mut *tx)
            .await?;

    if school_ids.is_empty() {
        println!("   Nothing to clear");
        return Ok(0);
    }

    let mut removed = 0;
    for statement in SCOPED_DELETES {
        removed = sqlx::query(statement)
            .bind(&school_ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    tx.commit().await?;
    println!("   ✓ Deleted {removed} schools in {:?}", start.elapsed());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_unique_and_prefixed() {
        let schools = generate_schools(20);
        let mut codes: Vec<_> = schools.iter().map(|s| s.code.clone()).collect();
        assert!(codes.iter().all(|c| c.starts_with(SEED_CODE_PREFIX)));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 20);
    }

    #[test]
    fn test_department_codes_unique_within_school() {
        let school = SchoolId::new();
        let depts = generate_departments(&[school], DEPARTMENT_NAMES.len() + 3);
        let mut codes: Vec<_> = depts.iter().map(|d| d.code.clone()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), DEPARTMENT_NAMES.len() + 3);
    }

    #[test]
    fn test_semester_bounds() {
        let (name, start, end) = semester_bounds(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(name, "Fall 2026");
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }
}
