//! # SchoolHub Auth
//!
//! Pure authentication building blocks. Nothing in here touches the database;
//! the HTTP services combine these with persisted state.
//!
//! - [`claims`]: JWT claim sets for access, refresh, and MFA temp tokens
//! - [`jwt`]: signing and verification
//! - [`tokens`]: opaque token generation and SHA-256 fingerprints
//! - [`lockout`]: failed-login accounting
//! - [`mfa`]: TOTP and recovery codes

pub mod claims;
pub mod jwt;
pub mod lockout;
pub mod mfa;
pub mod tokens;

pub use claims::{Claims, MfaTempClaims, RefreshTokenClaims};
pub use jwt::{
    create_access_token, create_mfa_temp_token, create_refresh_token, verify_mfa_temp_token,
    verify_refresh_token, verify_token,
};
pub use lockout::{LockoutPolicy, LoginAttemptOutcome};
