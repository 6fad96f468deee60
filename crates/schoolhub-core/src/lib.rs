//! # SchoolHub Core
//!
//! Foundational types shared by every SchoolHub crate:
//!
//! - [`errors`]: application error type with HTTP response conversion
//! - [`pagination`]: pagination parameters and response metadata
//! - [`password`]: bcrypt password hashing and verification
//! - [`permissions`]: permission constants and the role permission table
//! - [`grading`]: letter grades, grade points, and GPA arithmetic
//! - [`file_storage`]: storage backends for uploaded documents
//! - [`serde`]: custom serde helpers for query strings

pub mod errors;
pub mod file_storage;
pub mod grading;
pub mod pagination;
pub mod password;
pub mod permissions;
pub mod serde;

pub use errors::AppError;
pub use pagination::{Paginated, PaginationMeta, PaginationParams};
pub use password::{hash_password, verify_password};
