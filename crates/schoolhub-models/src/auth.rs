//! Authentication request and response shapes.
//!
//! A login either completes with a [`LoginResponse`] or, for accounts with
//! MFA enabled, stops at an [`MfaRequiredResponse`] whose temp token must be
//! exchanged together with a TOTP or recovery code.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::users::User;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MfaRequiredResponse {
    pub mfa_required: bool,
    pub temp_token: String,
}

/// Outcome of the password step.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginOutcome {
    Complete(Box<LoginResponse>),
    MfaRequired(MfaRequiredResponse),
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MfaVerifyLoginRequest {
    #[validate(length(min = 1))]
    pub temp_token: String,
    #[validate(length(equal = 6))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MfaRecoveryLoginRequest {
    #[validate(length(min = 1))]
    pub temp_token: String,
    #[validate(length(min = 8, max = 16))]
    pub recovery_code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_rejects_bad_email() {
        let req = LoginRequest {
            email: "nope".into(),
            password: "secret".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_mfa_required_outcome_serializes_flat() {
        let outcome = LoginOutcome::MfaRequired(MfaRequiredResponse {
            mfa_required: true,
            temp_token: "tmp".into(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["mfa_required"], true);
        assert_eq!(json["temp_token"], "tmp");
    }

    #[test]
    fn test_reset_password_requires_long_password() {
        let req = ResetPasswordRequest {
            token: "abc".into(),
            new_password: "short".into(),
        };
        assert!(req.validate().unwrap_err().field_errors().contains_key("new_password"));
    }
}
