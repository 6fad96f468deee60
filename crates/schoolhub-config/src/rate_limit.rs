//! Rate limiting configuration.
//!
//! Limits are token buckets keyed by client IP, one bucket set for general
//! API traffic and a stricter one for authentication endpoints.
//!
//! - `RATE_LIMIT_ENABLED` (default: true)
//! - `RATE_LIMIT_GENERAL_PER_SECOND` (default: 20)
//! - `RATE_LIMIT_GENERAL_BURST_SIZE` (default: 60)
//! - `RATE_LIMIT_AUTH_PER_SECOND` (default: 2)
//! - `RATE_LIMIT_AUTH_BURST_SIZE` (default: 5)
//! - `RATE_LIMIT_TRUST_PROXY` (default: false): key on `X-Forwarded-For` /
//!   `X-Real-IP` instead of the socket peer. Only enable behind a proxy that
//!   overwrites those headers.
//! - `RATE_LIMIT_CLEANUP_INTERVAL_SECS` (default: 60)

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::{env_flag, env_or};

pub type KeyedLimiter = DefaultKeyedRateLimiter<String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub general_per_second: u32,
    pub general_burst_size: u32,
    pub auth_per_second: u32,
    pub auth_burst_size: u32,
    pub trust_proxy_headers: bool,
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            general_per_second: 20,
            general_burst_size: 60,
            auth_per_second: 2,
            auth_burst_size: 5,
            trust_proxy_headers: false,
            cleanup_interval_secs: 60,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("RATE_LIMIT_ENABLED", defaults.enabled),
            general_per_second: env_or("RATE_LIMIT_GENERAL_PER_SECOND", defaults.general_per_second),
            general_burst_size: env_or("RATE_LIMIT_GENERAL_BURST_SIZE", defaults.general_burst_size),
            auth_per_second: env_or("RATE_LIMIT_AUTH_PER_SECOND", defaults.auth_per_second),
            auth_burst_size: env_or("RATE_LIMIT_AUTH_BURST_SIZE", defaults.auth_burst_size),
            trust_proxy_headers: env_flag("RATE_LIMIT_TRUST_PROXY", defaults.trust_proxy_headers),
            cleanup_interval_secs: env_or(
                "RATE_LIMIT_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            ),
        }
    }

    pub fn general_quota(&self) -> Quota {
        quota(self.general_per_second, self.general_burst_size)
    }

    pub fn auth_quota(&self) -> Quota {
        quota(self.auth_per_second, self.auth_burst_size)
    }

    pub fn general_limiter(&self) -> Arc<KeyedLimiter> {
        Arc::new(RateLimiter::keyed(self.general_quota()))
    }

    /// Stricter limiter for login, refresh, and password reset routes.
    pub fn auth_limiter(&self) -> Arc<KeyedLimiter> {
        Arc::new(RateLimiter::keyed(self.auth_quota()))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Drops buckets that have refilled completely. Without this the keyed
/// state keeps one entry per client address ever seen.
pub fn prune_limiter(limiter: &KeyedLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

fn quota(per_second: u32, burst: u32) -> Quota {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::per_second(rate).allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert!(config.auth_burst_size < config.general_burst_size);
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn test_quota_burst_is_enforced_per_key() {
        let config = RateLimitConfig {
            auth_per_second: 1,
            auth_burst_size: 2,
            ..RateLimitConfig::default()
        };
        let limiter = config.auth_limiter();
        let ip = "10.0.0.1".to_string();

        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_err());
        // other clients have their own bucket
        assert!(limiter.check_key(&"10.0.0.2".to_string()).is_ok());
    }

    #[test]
    fn test_prune_drops_idle_buckets() {
        let config = RateLimitConfig {
            auth_per_second: 1000,
            auth_burst_size: 1,
            ..RateLimitConfig::default()
        };
        let limiter = config.auth_limiter();
        for i in 0..10 {
            assert!(limiter.check_key(&format!("10.0.1.{i}")).is_ok());
        }
        assert_eq!(limiter.len(), 10);

        std::thread::sleep(Duration::from_millis(20));
        prune_limiter(&limiter);
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_zero_values_fall_back_to_one() {
        let q = quota(0, 0);
        assert_eq!(q.burst_size().get(), 1);
    }
}
