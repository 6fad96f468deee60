//! # SchoolHub Cache
//!
//! Redis read-through caching for hot reads (student profiles, course
//! details, computed GPAs, settings).
//!
//! The cache is optional: every helper takes `Option<&RedisCache>` and does
//! nothing when it is `None`, so the API behaves the same with Redis down or
//! disabled, only slower.
//!
//! ```ignore
//! let config = CacheConfig::from_env();
//! let cache = RedisCache::connect(&config).await?;
//!
//! let gpa = cached(Some(&cache), &keys::gpa::student(student_id), || async {
//!     GradeService::compute_gpa(&db, student_id).await
//! })
//! .await?;
//! ```

pub mod config;
pub mod keys;
pub mod redis;

pub use config::CacheConfig;
pub use keys::{hash_filters, invalidate};
pub use redis::{CacheError, RedisCache, cached};
