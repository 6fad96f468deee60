//! # SchoolHub Models
//!
//! Database entities, request DTOs with their validation rules, and response
//! shapes shared by the API and the CLI.
//!
//! Entities derive `sqlx::FromRow` and are read with runtime queries; DTOs
//! derive `validator::Validate` and are checked before any service call.

pub mod assignments;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod courses;
pub mod departments;
pub mod documents;
pub mod enrollments;
pub mod grades;
pub mod ids;
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

pub use auth::MessageResponse;
pub use users::{Role, User};
