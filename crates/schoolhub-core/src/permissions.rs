//! Permission strings and the fixed role to permission table.
//!
//! Access tokens carry the permission list of the user's role; handlers ask
//! for a permission through the `require_permission!` extractors rather than
//! comparing role names.

// Users
pub const USERS_CREATE: &str = "users:create";
pub const USERS_READ: &str = "users:read";
pub const USERS_UPDATE: &str = "users:update";
pub const USERS_DELETE: &str = "users:delete";

// Schools
pub const SCHOOLS_CREATE: &str = "schools:create";
pub const SCHOOLS_READ: &str = "schools:read";
pub const SCHOOLS_UPDATE: &str = "schools:update";
pub const SCHOOLS_DELETE: &str = "schools:delete";

// Students
pub const STUDENTS_CREATE: &str = "students:create";
pub const STUDENTS_READ: &str = "students:read";
pub const STUDENTS_UPDATE: &str = "students:update";
pub const STUDENTS_DELETE: &str = "students:delete";

// Teachers
pub const TEACHERS_CREATE: &str = "teachers:create";
pub const TEACHERS_READ: &str = "teachers:read";
pub const TEACHERS_UPDATE: &str = "teachers:update";
pub const TEACHERS_DELETE: &str = "teachers:delete";

// Departments
pub const DEPARTMENTS_CREATE: &str = "departments:create";
pub const DEPARTMENTS_READ: &str = "departments:read";
pub const DEPARTMENTS_UPDATE: &str = "departments:update";
pub const DEPARTMENTS_DELETE: &str = "departments:delete";

// Semesters
pub const SEMESTERS_CREATE: &str = "semesters:create";
pub const SEMESTERS_READ: &str = "semesters:read";
pub const SEMESTERS_UPDATE: &str = "semesters:update";
pub const SEMESTERS_DELETE: &str = "semesters:delete";

// Courses
pub const COURSES_CREATE: &str = "courses:create";
pub const COURSES_READ: &str = "courses:read";
pub const COURSES_UPDATE: &str = "courses:update";
pub const COURSES_DELETE: &str = "courses:delete";

// Enrollments
pub const ENROLLMENTS_CREATE: &str = "enrollments:create";
pub const ENROLLMENTS_READ: &str = "enrollments:read";
pub const ENROLLMENTS_UPDATE: &str = "enrollments:update";

// Grades
pub const GRADES_CREATE: &str = "grades:create";
pub const GRADES_READ: &str = "grades:read";
pub const GRADES_UPDATE: &str = "grades:update";
pub const GRADES_DELETE: &str = "grades:delete";

// Assignments and submissions
pub const ASSIGNMENTS_CREATE: &str = "assignments:create";
pub const ASSIGNMENTS_READ: &str = "assignments:read";
pub const ASSIGNMENTS_UPDATE: &str = "assignments:update";
pub const ASSIGNMENTS_DELETE: &str = "assignments:delete";
pub const SUBMISSIONS_CREATE: &str = "submissions:create";
pub const SUBMISSIONS_GRADE: &str = "submissions:grade";

// Attendance
pub const ATTENDANCE_RECORD: &str = "attendance:record";
pub const ATTENDANCE_READ: &str = "attendance:read";

// Schedules
pub const SCHEDULES_CREATE: &str = "schedules:create";
pub const SCHEDULES_READ: &str = "schedules:read";
pub const SCHEDULES_UPDATE: &str = "schedules:update";
pub const SCHEDULES_DELETE: &str = "schedules:delete";

// Documents
pub const DOCUMENTS_UPLOAD: &str = "documents:upload";
pub const DOCUMENTS_READ: &str = "documents:read";
pub const DOCUMENTS_DELETE: &str = "documents:delete";

// Notifications
pub const NOTIFICATIONS_SEND: &str = "notifications:send";

// Audit
pub const AUDIT_READ: &str = "audit:read";

// Reports
pub const REPORTS_VIEW: &str = "reports:view";
pub const REPORTS_EXPORT: &str = "reports:export";

// Settings
pub const SETTINGS_READ: &str = "settings:read";
pub const SETTINGS_UPDATE: &str = "settings:update";

pub const ALL: &[&str] = &[
    USERS_CREATE,
    USERS_READ,
    USERS_UPDATE,
    USERS_DELETE,
    SCHOOLS_CREATE,
    SCHOOLS_READ,
    SCHOOLS_UPDATE,
    SCHOOLS_DELETE,
    STUDENTS_CREATE,
    STUDENTS_READ,
    STUDENTS_UPDATE,
    STUDENTS_DELETE,
    TEACHERS_CREATE,
    TEACHERS_READ,
    TEACHERS_UPDATE,
    TEACHERS_DELETE,
    DEPARTMENTS_CREATE,
    DEPARTMENTS_READ,
    DEPARTMENTS_UPDATE,
    DEPARTMENTS_DELETE,
    SEMESTERS_CREATE,
    SEMESTERS_READ,
    SEMESTERS_UPDATE,
    SEMESTERS_DELETE,
    COURSES_CREATE,
    COURSES_READ,
    COURSES_UPDATE,
    COURSES_DELETE,
    ENROLLMENTS_CREATE,
    ENROLLMENTS_READ,
    ENROLLMENTS_UPDATE,
    GRADES_CREATE,
    GRADES_READ,
    GRADES_UPDATE,
    GRADES_DELETE,
    ASSIGNMENTS_CREATE,
    ASSIGNMENTS_READ,
    ASSIGNMENTS_UPDATE,
    ASSIGNMENTS_DELETE,
    SUBMISSIONS_CREATE,
    SUBMISSIONS_GRADE,
    ATTENDANCE_RECORD,
    ATTENDANCE_READ,
    SCHEDULES_CREATE,
    SCHEDULES_READ,
    SCHEDULES_UPDATE,
    SCHEDULES_DELETE,
    DOCUMENTS_UPLOAD,
    DOCUMENTS_READ,
    DOCUMENTS_DELETE,
    NOTIFICATIONS_SEND,
    AUDIT_READ,
    REPORTS_VIEW,
    REPORTS_EXPORT,
    SETTINGS_READ,
    SETTINGS_UPDATE,
];

const ADMIN_EXCLUDED: &[&str] = &[SCHOOLS_CREATE, SCHOOLS_DELETE];

const TEACHER: &[&str] = &[
    STUDENTS_READ,
    TEACHERS_READ,
    DEPARTMENTS_READ,
    SEMESTERS_READ,
    COURSES_READ,
    ENROLLMENTS_READ,
    GRADES_CREATE,
    GRADES_READ,
    GRADES_UPDATE,
    GRADES_DELETE,
    ASSIGNMENTS_CREATE,
    ASSIGNMENTS_READ,
    ASSIGNMENTS_UPDATE,
    ASSIGNMENTS_DELETE,
    SUBMISSIONS_GRADE,
    ATTENDANCE_RECORD,
    ATTENDANCE_READ,
    SCHEDULES_READ,
    DOCUMENTS_UPLOAD,
    DOCUMENTS_READ,
    NOTIFICATIONS_SEND,
    REPORTS_VIEW,
    REPORTS_EXPORT,
];

const STUDENT: &[&str] = &[
    STUDENTS_READ,
    DEPARTMENTS_READ,
    SEMESTERS_READ,
    COURSES_READ,
    ENROLLMENTS_CREATE,
    ENROLLMENTS_READ,
    GRADES_READ,
    ASSIGNMENTS_READ,
    SUBMISSIONS_CREATE,
    ATTENDANCE_READ,
    SCHEDULES_READ,
    DOCUMENTS_UPLOAD,
    DOCUMENTS_READ,
    REPORTS_VIEW,
];

/// Permissions granted to a role slug. Unknown roles get nothing.
pub fn for_role(role: &str) -> Vec<String> {
    let granted: Vec<&str> = match role {
        "system_admin" => ALL.to_vec(),
        "admin" => ALL
            .iter()
            .copied()
            .filter(|p| !ADMIN_EXCLUDED.contains(p))
            .collect(),
        "teacher" => TEACHER.to_vec(),
        "student" => STUDENT.to_vec(),
        _ => Vec::new(),
    };
    granted.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_admin_has_everything() {
        assert_eq!(for_role("system_admin").len(), ALL.len());
    }

    #[test]
    fn test_admin_cannot_create_or_delete_schools() {
        let perms = for_role("admin");
        assert!(!perms.contains(&SCHOOLS_CREATE.to_string()));
        assert!(!perms.contains(&SCHOOLS_DELETE.to_string()));
        assert!(perms.contains(&STUDENTS_CREATE.to_string()));
        assert!(perms.contains(&AUDIT_READ.to_string()));
    }

    #[test]
    fn test_teacher_grades_but_does_not_manage_students() {
        let perms = for_role("teacher");
        assert!(perms.contains(&GRADES_CREATE.to_string()));
        assert!(perms.contains(&ATTENDANCE_RECORD.to_string()));
        assert!(!perms.contains(&STUDENTS_CREATE.to_string()));
        assert!(!perms.contains(&AUDIT_READ.to_string()));
    }

    #[test]
    fn test_student_is_read_mostly() {
        let perms = for_role("student");
        assert!(perms.contains(&GRADES_READ.to_string()));
        assert!(perms.contains(&SUBMISSIONS_CREATE.to_string()));
        assert!(!perms.contains(&GRADES_CREATE.to_string()));
        assert!(!perms.contains(&USERS_READ.to_string()));
    }

    #[test]
    fn test_role_lists_only_contain_known_permissions() {
        for p in TEACHER.iter().chain(STUDENT.iter()) {
            assert!(ALL.contains(p), "{p} missing from ALL");
        }
    }

    #[test]
    fn test_unknown_role_has_no_permissions() {
        assert!(for_role("janitor").is_empty());
    }
}
