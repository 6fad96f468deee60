//! Teacher and student accounts with their profile rows.

use chrono::{Duration, NaiveDate};
use fake::Fake;
use fake::faker::name::en::*;
use rand::Rng;
use rayon::prelude::*;
use schoolhub_models::Role;
use schoolhub_models::ids::{DepartmentId, SchoolId, StudentId, TeacherId, UserId};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Instant;

use super::models::PersonSeed;
use crate::CliResult;

/// Generates `per_school` people for each school, spread over the school's
/// departments round-robin.
pub fn generate_people(
    departments: &[(SchoolId, DepartmentId)],
    school_ids: &[SchoolId],
    per_school: usize,
    role: Role,
) -> Vec<PersonSeed> {
    let prefix = match role {
        Role::Teacher => "T",
        _ => "S",
    };

    school_ids
        .par_iter()
        .enumerate()
        .flat_map(|(school_idx, &school_id)| {
            let school_depts: Vec<DepartmentId> = departments
                .iter()
                .filter(|(s, _)| *s == school_id)
                .map(|(_, d)| *d)
                .collect();
            let mut rng = rand::thread_rng();

            (0..per_school)
                .map(|i| {
                    let first_name: String = FirstName().fake();
                    let last_name: String = LastName().fake();
                    let seq = school_idx * 100_000 + i;
                    let date_of_birth = (role == Role::Student).then(|| {
                        NaiveDate::from_ymd_opt(2008, 1, 1).unwrap_or_default()
                            + Duration::days(rng.gen_range(0..1500))
                    });

                    PersonSeed {
                        school_id,
                        department_id: (!school_depts.is_empty())
                            .then(|| school_depts[i % school_depts.len()]),
                        email: format!(
                            "{}.{}+{}{}@example.com",
                            first_name.to_lowercase(),
                            last_name.to_lowercase(),
                            role.as_str(),
                            seq
                        ),
                        first_name,
                        last_name,
                        number: format!("{prefix}{seq:06}"),
                        date_of_birth,
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

async fn insert_user(
    tx: &mut Transaction<'_, Postgres>,
    person: &PersonSeed,
    role: Role,
    password_hash: &str,
) -> CliResult<UserId> {
    let id = sqlx::query_scalar::<_, UserId>(
        r#"INSERT INTO users (school_id, first_name, last_name, email, password, role)
           VALUES ($1, $2, $3, $4, $5, $6) RETURNING id"#,
    )
    .bind(person.school_id)
    .bind(&person.first_name)
    .bind(&person.last_name)
    .bind(&person.email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn seed_teachers(
    db: &PgPool,
    people: &[PersonSeed],
    password_hash: &str,
) -> CliResult<Vec<(SchoolId, TeacherId)>> {
    let start = Instant::now();
    println!("👩‍🏫 Seeding {} teachers...", people.len());

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(people.len());

    for person in people {
        let user_id = insert_user(&mut tx, person, Role::Teacher, password_hash).await?;
        let teacher_id: TeacherId = sqlx::query_scalar(
            r#"INSERT INTO teachers (user_id, school_id, employee_number, department_id)
               VALUES ($1, $2, $3, $4) RETURNING id"#,
        )
        .bind(user_id)
        .bind(person.school_id)
        .bind(&person.number)
        .bind(person.department_id)
        .fetch_one(&mut *tx)
        .await?;
        ids.push((person.school_id, teacher_id));
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} teachers in {:?}", ids.len(), start.elapsed());
    Ok(ids)
}

pub async fn seed_students(
    db: &PgPool,
    people: &[PersonSeed],
    password_hash: &str,
) -> CliResult<Vec<(SchoolId, StudentId)>> {
    let start = Instant::now();
    println!("🎓 Seeding {} students...", people.len());

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(people.len());

    for person in people {
        let user_id = insert_user(&mut tx, person, Role::Student, password_hash).await?;
        let student_id: StudentId = sqlx::query_scalar(
            r#"INSERT INTO students (user_id, school_id, student_number, department_id, date_of_birth)
               VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(user_id)
        .bind(person.school_id)
        .bind(&person.number)
        .bind(person.department_id)
        .bind(person.date_of_birth)
        .fetch_one(&mut *tx)
        .await?;
        ids.push((person.school_id, student_id));
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} students in {:?}", ids.len(), start.elapsed());
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_people_get_unique_numbers_and_emails() {
        let schools = [SchoolId::new(), SchoolId::new()];
        let depts = [(schools[0], DepartmentId::new()), (schools[1], DepartmentId::new())];
        let people = generate_people(&depts, &schools, 10, Role::Student);
        assert_eq!(people.len(), 20);

        let mut emails: Vec<_> = people.iter().map(|p| p.email.clone()).collect();
        emails.sort();
        emails.dedup();
        assert_eq!(emails.len(), 20);

        assert!(people.iter().all(|p| p.number.starts_with('S')));
        assert!(people.iter().all(|p| p.date_of_birth.is_some()));
        // departments stay within the person's school
        for p in &people {
            let dept = p.department_id.unwrap();
            assert!(depts.contains(&(p.school_id, dept)));
        }
    }

    #[test]
    fn test_teachers_have_no_birth_date() {
        let school = SchoolId::new();
        let people = generate_people(&[], &[school], 3, Role::Teacher);
        assert!(people.iter().all(|p| p.date_of_birth.is_none() && p.department_id.is_none()));
        assert!(people[0].number.starts_with('T'));
    }
}
