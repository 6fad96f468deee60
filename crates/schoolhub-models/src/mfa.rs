//! MFA setup and management shapes.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct EnableMfaResponse {
    /// Base32 TOTP secret, also usable for manual entry.
    pub secret: String,
    pub qr_code_url: String,
    /// PNG, base64 encoded.
    pub qr_code_base64: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyMfaRequest {
    #[validate(length(equal = 6))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DisableMfaRequest {
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MfaStatusResponse {
    pub mfa_enabled: bool,
    pub recovery_codes_remaining: i64,
}

#[derive(Debug, Serialize)]
pub struct RecoveryCodesResponse {
    pub recovery_codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_request_needs_six_chars() {
        assert!(VerifyMfaRequest { code: "123456".into() }.validate().is_ok());
        assert!(VerifyMfaRequest { code: "1234".into() }.validate().is_err());
    }
}
