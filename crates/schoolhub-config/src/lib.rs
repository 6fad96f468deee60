//! # SchoolHub Config
//!
//! Configuration structures loaded from environment variables. Every
//! `from_env()` falls back to development defaults for unset or malformed
//! values.
//!
//! ```ignore
//! use schoolhub_config::{JwtConfig, SecurityConfig};
//!
//! let jwt = JwtConfig::from_env();
//! let security = SecurityConfig::from_env();
//! ```

pub mod cors;
pub mod email;
pub mod jwt;
pub mod rate_limit;
pub mod security;
pub mod storage;

pub use cors::CorsConfig;
pub use email::EmailConfig;
pub use jwt::JwtConfig;
pub use rate_limit::{KeyedLimiter, RateLimitConfig, prune_limiter};
pub use security::SecurityConfig;
pub use storage::StorageConfig;

/// Parses an environment variable, falling back to `default` when it is
/// missing or malformed.
pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}
