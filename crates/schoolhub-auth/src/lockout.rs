//! Failed-login accounting.
//!
//! A wrong password increments the counter. When it reaches the configured
//! maximum the account is locked for the configured duration and the counter
//! starts over. A correct password clears both.

use chrono::{DateTime, Duration, Utc};

use schoolhub_config::SecurityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: i32,
    pub lockout_duration: Duration,
}

/// New counter state after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAttemptOutcome {
    /// Still below the threshold.
    Counted { failed_attempts: i32 },
    /// Threshold reached; the account is locked until the given instant.
    Locked { until: DateTime<Utc> },
}

impl LockoutPolicy {
    pub fn new(max_attempts: i32, lockout_duration: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout_duration,
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.max_failed_login_attempts,
            Duration::minutes(config.lockout_duration_minutes),
        )
    }

    pub fn is_locked(&self, locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        locked_until.is_some_and(|until| until > now)
    }

    pub fn register_failure(&self, previous_failures: i32, now: DateTime<Utc>) -> LoginAttemptOutcome {
        let failed_attempts = previous_failures.max(0) + 1;
        if failed_attempts >= self.max_attempts {
            LoginAttemptOutcome::Locked {
                until: now + self.lockout_duration,
            }
        } else {
            LoginAttemptOutcome::Counted { failed_attempts }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, Duration::minutes(15))
    }

    #[test]
    fn test_locks_on_fifth_failure() {
        let now = Utc::now();
        let p = policy();

        let mut failures = 0;
        for _ in 0..4 {
            match p.register_failure(failures, now) {
                LoginAttemptOutcome::Counted { failed_attempts } => failures = failed_attempts,
                other => panic!("locked too early: {other:?}"),
            }
        }
        assert_eq!(failures, 4);
        assert_eq!(
            p.register_failure(failures, now),
            LoginAttemptOutcome::Locked {
                until: now + Duration::minutes(15)
            }
        );
    }

    #[test]
    fn test_is_locked_only_before_deadline() {
        let now = Utc::now();
        let p = policy();
        assert!(!p.is_locked(None, now));
        assert!(p.is_locked(Some(now + Duration::seconds(1)), now));
        assert!(!p.is_locked(Some(now - Duration::seconds(1)), now));
        assert!(!p.is_locked(Some(now), now));
    }

    #[test]
    fn test_from_config() {
        let p = LockoutPolicy::from_config(&SecurityConfig::default());
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.lockout_duration, Duration::minutes(15));
    }

    #[test]
    fn test_max_attempts_has_floor_of_one() {
        let p = LockoutPolicy::new(0, Duration::minutes(1));
        assert!(matches!(
            p.register_failure(0, Utc::now()),
            LoginAttemptOutcome::Locked { .. }
        ));
    }
}
