//! # SchoolHub API
//!
//! Multi-tenant academic records service on Axum and PostgreSQL: schools,
//! departments, semesters, students, teachers, courses, enrollments, grades,
//! coursework, attendance, timetables, documents, notifications, audit
//! trail, settings and reports.
//!
//! ## Layout
//!
//! ```text
//! src/
//! ├── middleware/       # AuthUser extractor, permission extractors, rate limits
//! ├── modules/          # One directory per feature
//! │   └── <feature>/
//! │       ├── controller.rs   # HTTP handlers
//! │       ├── model.rs        # DTOs and rows
//! │       ├── router.rs       # Axum routes
//! │       └── service.rs      # Business rules and SQL
//! └── utils/            # Tenant scoping, database error mapping, email
//! ```
//!
//! Shared pieces live in the workspace crates: `schoolhub-core` (errors,
//! pagination, grading math, file storage), `schoolhub-config`,
//! `schoolhub-db`, `schoolhub-auth` (JWT and passwords), `schoolhub-models`
//! and `schoolhub-cache` (Redis).
//!
//! ## Tenancy
//!
//! | Role | Scope |
//! |------|-------|
//! | System admin | Every school; created with `schoolhub-cli create-sysadmin` |
//! | Admin | One school |
//! | Teacher | One school, own courses for grading and attendance |
//! | Student | One school, own records |
//!
//! Routes are served under `/api/v1`, with `/health` and the
//! `/notificationHub` WebSocket at the root.

pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod modules;
pub mod router;
pub mod state;
pub mod utils;
pub mod validator;

pub use schoolhub_auth;
pub use schoolhub_config;
pub use schoolhub_core;
pub use schoolhub_db;
pub use schoolhub_models;
