//! Account protection settings.

use crate::env_or;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Consecutive failed logins before the account is locked.
    pub max_failed_login_attempts: i32,
    pub lockout_duration_minutes: i64,
    pub password_reset_expiry_minutes: i64,
    pub mfa_issuer: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_login_attempts: 5,
            lockout_duration_minutes: 15,
            password_reset_expiry_minutes: 60,
            mfa_issuer: "SchoolHub".to_string(),
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_failed_login_attempts: env_or(
                "MAX_FAILED_LOGIN_ATTEMPTS",
                defaults.max_failed_login_attempts,
            )
            .max(1),
            lockout_duration_minutes: env_or(
                "LOCKOUT_DURATION_MINUTES",
                defaults.lockout_duration_minutes,
            ),
            password_reset_expiry_minutes: env_or(
                "PASSWORD_RESET_EXPIRY_MINUTES",
                defaults.password_reset_expiry_minutes,
            ),
            mfa_issuer: std::env::var("MFA_ISSUER").unwrap_or(defaults.mfa_issuer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.max_failed_login_attempts, 5);
        assert_eq!(config.lockout_duration_minutes, 15);
        assert_eq!(config.password_reset_expiry_minutes, 60);
    }
}
