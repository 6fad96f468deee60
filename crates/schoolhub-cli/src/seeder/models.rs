//! Seeding configuration and the generated rows.

use chrono::NaiveDate;
use schoolhub_models::ids::{DepartmentId, SchoolId};

/// Every seeded school code starts with this, which is how `clear-seed`
/// finds what it created.
pub const SEED_CODE_PREFIX: &str = "SEED-";

/// Password shared by every seeded account.
pub const SEED_PASSWORD: &str = "password123";

pub struct SchoolSeed {
    pub name: String,
    pub code: String,
    pub address: String,
    pub phone: String,
}

pub struct DepartmentSeed {
    pub school_id: SchoolId,
    pub name: String,
    pub code: String,
}

/// A user account plus the profile row created for it.
pub struct PersonSeed {
    pub school_id: SchoolId,
    pub department_id: Option<DepartmentId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Student or employee number.
    pub number: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Clone, Debug)]
pub struct PerSchool {
    pub departments: usize,
    pub teachers: usize,
    pub students: usize,
    pub courses_per_department: usize,
    pub enrollments_per_student: usize,
}

impl Default for PerSchool {
    fn default() -> Self {
        Self {
            departments: 4,
            teachers: 8,
            students: 120,
            courses_per_department: 3,
            enrollments_per_student: 4,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SeedConfig {
    pub num_schools: usize,
    pub per_school: PerSchool,
}

impl SeedConfig {
    pub fn new(num_schools: usize) -> Self {
        Self {
            num_schools,
            ..Default::default()
        }
    }

    pub fn with_per_school(mut self, per_school: PerSchool) -> Self {
        self.per_school = per_school;
        self
    }

    pub fn courses_per_school(&self) -> usize {
        self.per_school.departments * self.per_school.courses_per_department
    }

    /// Enrollments can't exceed the courses a school offers.
    pub fn effective_enrollments_per_student(&self) -> usize {
        self.per_school
            .enrollments_per_student
            .min(self.courses_per_school())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollments_capped_by_course_count() {
        let config = SeedConfig::new(1).with_per_school(PerSchool {
            departments: 1,
            courses_per_department: 2,
            enrollments_per_student: 5,
            ..PerSchool::default()
        });
        assert_eq!(config.courses_per_school(), 2);
        assert_eq!(config.effective_enrollments_per_student(), 2);
    }
}
