//! TOTP (RFC 6238) and recovery codes.
//!
//! Codes are SHA1, six digits, 30 second steps, and one step of clock skew is
//! tolerated in either direction.

use rand::{Rng, RngCore};
use schoolhub_core::AppError;
use totp_rs::{Algorithm, Secret, TOTP};

pub const RECOVERY_CODE_COUNT: usize = 10;
pub const RECOVERY_CODE_LENGTH: usize = 8;
const RECOVERY_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A fresh 160-bit secret, base32 encoded.
pub fn generate_secret() -> String {
    let mut bytes = vec![0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    Secret::Raw(bytes).to_encoded().to_string()
}

pub fn build_totp(secret: &str, issuer: &str, account: &str) -> Result<TOTP, AppError> {
    let secret_bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|e| AppError::internal_error(format!("Invalid MFA secret: {:?}", e)))?;

    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| AppError::internal_error(format!("Failed to create TOTP: {}", e)))
}

pub fn verify_code(secret: &str, issuer: &str, account: &str, code: &str) -> Result<bool, AppError> {
    let code = code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }

    build_totp(secret, issuer, account)?
        .check_current(code)
        .map_err(|e| AppError::internal_error(format!("Failed to verify TOTP: {}", e)))
}

pub fn generate_recovery_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..RECOVERY_CODE_COUNT)
        .map(|_| {
            (0..RECOVERY_CODE_LENGTH)
                .map(|_| RECOVERY_ALPHABET[rng.gen_range(0..RECOVERY_ALPHABET.len())] as char)
                .collect()
        })
        .collect()
}

/// Users type recovery codes with spaces, dashes, or lower case.
pub fn normalize_recovery_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secret_builds_totp() {
        let secret = generate_secret();
        let totp = build_totp(&secret, "SchoolHub", "ada@school.edu").unwrap();
        assert!(totp.get_url().starts_with("otpauth://totp/SchoolHub"));
    }

    #[test]
    fn test_current_code_verifies() {
        let secret = generate_secret();
        let code = build_totp(&secret, "SchoolHub", "ada@school.edu")
            .unwrap()
            .generate_current()
            .unwrap();
        assert!(verify_code(&secret, "SchoolHub", "ada@school.edu", &code).unwrap());
    }

    #[test]
    fn test_malformed_codes_are_rejected_without_error() {
        let secret = generate_secret();
        assert!(!verify_code(&secret, "SchoolHub", "a@b.c", "12345").unwrap());
        assert!(!verify_code(&secret, "SchoolHub", "a@b.c", "abcdef").unwrap());
    }

    #[test]
    fn test_invalid_secret_is_an_error() {
        assert!(build_totp("not base32 !!", "SchoolHub", "a@b.c").is_err());
    }

    #[test]
    fn test_recovery_codes_shape() {
        let codes = generate_recovery_codes();
        assert_eq!(codes.len(), RECOVERY_CODE_COUNT);
        for code in &codes {
            assert_eq!(code.len(), RECOVERY_CODE_LENGTH);
            assert!(code.bytes().all(|b| RECOVERY_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_normalize_recovery_code() {
        assert_eq!(normalize_recovery_code(" ab12-cd34 "), "AB12CD34");
    }
}
