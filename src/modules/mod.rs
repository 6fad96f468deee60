pub mod assignments;
pub mod attendance;
pub mod audit_logs;
pub mod auth;
pub mod courses;
pub mod departments;
pub mod documents;
pub mod enrollments;
pub mod grades;
pub mod mfa;
pub mod notifications;
pub mod reports;
pub mod schedules;
pub mod schools;
pub mod semesters;
pub mod settings;
pub mod students;
pub mod teachers;
pub mod users;
