//! Token signing and verification (HS256).
//!
//! Three token kinds share the secret but have disjoint claim sets, so one
//! kind never deserializes as another:
//!
//! - access tokens carry role, permissions, and tenant scope
//! - refresh tokens carry a unique `jti`
//! - MFA temp tokens live for ten minutes and carry `mfa_pending`

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use schoolhub_config::JwtConfig;
use schoolhub_core::AppError;

use crate::claims::{Claims, MfaTempClaims, RefreshTokenClaims};

pub const MFA_TEMP_TOKEN_TTL_SECONDS: i64 = 600;

fn now() -> usize {
    Utc::now().timestamp() as usize
}

fn sign<T: Serialize>(claims: &T, jwt_config: &JwtConfig, kind: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal_error(format!("Failed to create {kind}: {e}")))
}

fn decode_claims<T: DeserializeOwned>(token: &str, jwt_config: &JwtConfig) -> Option<T> {
    let mut validation = Validation::default();
    validation.set_issuer(&[jwt_config.issuer.as_str()]);

    decode::<T>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    school_id: Option<Uuid>,
    role: &str,
    permissions: Vec<String>,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let iat = now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        school_id,
        role: role.to_string(),
        permissions,
        iss: jwt_config.issuer.clone(),
        exp: iat + jwt_config.access_token_expiry as usize,
        iat,
    };

    sign(&claims, jwt_config, "access token")
}

pub fn verify_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    decode_claims(token, jwt_config)
        .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))
}

pub fn create_mfa_temp_token(
    user_id: Uuid,
    email: &str,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let iat = now();
    let claims = MfaTempClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        mfa_pending: true,
        iss: jwt_config.issuer.clone(),
        exp: iat + MFA_TEMP_TOKEN_TTL_SECONDS as usize,
        iat,
    };

    sign(&claims, jwt_config, "temp token")
}

pub fn verify_mfa_temp_token(
    token: &str,
    jwt_config: &JwtConfig,
) -> Result<MfaTempClaims, AppError> {
    let claims: MfaTempClaims = decode_claims(token, jwt_config)
        .ok_or_else(|| AppError::unauthorized("Invalid or expired temp token"))?;

    if !claims.mfa_pending {
        return Err(AppError::unauthorized("Invalid MFA temp token"));
    }

    Ok(claims)
}

/// Returns the signed token and its claims; the caller persists the hash.
pub fn create_refresh_token(
    user_id: Uuid,
    email: &str,
    jwt_config: &JwtConfig,
) -> Result<(String, RefreshTokenClaims), AppError> {
    let iat = now();
    let claims = RefreshTokenClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        jti: Uuid::new_v4().to_string(),
        iss: jwt_config.issuer.clone(),
        exp: iat + jwt_config.refresh_token_expiry as usize,
        iat,
    };

    let token = sign(&claims, jwt_config, "refresh token")?;
    Ok((token, claims))
}

pub fn verify_refresh_token(
    token: &str,
    jwt_config: &JwtConfig,
) -> Result<RefreshTokenClaims, AppError> {
    decode_claims(token, jwt_config)
        .ok_or_else(|| AppError::unauthorized("Invalid or expired refresh token"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "schoolhub".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604_800,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = config();
        let user_id = Uuid::new_v4();
        let school_id = Uuid::new_v4();

        let token = create_access_token(
            user_id,
            "admin@school.edu",
            Some(school_id),
            "admin",
            vec!["students:create".into()],
            &config,
        )
        .unwrap();
        let claims = verify_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.school_id, Some(school_id));
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.permissions, vec!["students:create".to_string()]);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token =
            create_access_token(Uuid::new_v4(), "a@b.c", None, "system_admin", vec![], &config())
                .unwrap();
        let other = JwtConfig {
            secret: "a-completely-different-secret-value!!".into(),
            ..config()
        };
        let err = verify_token(&token, &other).unwrap_err();
        assert_eq!(err.status.as_u16(), 401);
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let token =
            create_access_token(Uuid::new_v4(), "a@b.c", None, "admin", vec![], &config()).unwrap();
        let other = JwtConfig {
            issuer: "someone-else".into(),
            ..config()
        };
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // expired well past the default 60s leeway
        let iat = now() - 7200;
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "a@b.c".into(),
            school_id: None,
            role: "admin".into(),
            permissions: vec![],
            iss: "schoolhub".into(),
            exp: iat + 60,
            iat,
        };
        let token = sign(&claims, &config(), "access token").unwrap();
        assert!(verify_token(&token, &config()).is_err());
    }

    #[test]
    fn test_refresh_tokens_are_unique_and_not_access_tokens() {
        let config = config();
        let user_id = Uuid::new_v4();
        let (a, claims_a) = create_refresh_token(user_id, "s@school.edu", &config).unwrap();
        let (b, claims_b) = create_refresh_token(user_id, "s@school.edu", &config).unwrap();

        assert_ne!(a, b);
        assert_ne!(claims_a.jti, claims_b.jti);
        assert_eq!(verify_refresh_token(&a, &config).unwrap().jti, claims_a.jti);
        assert!(verify_token(&a, &config).is_err());
    }

    #[test]
    fn test_mfa_temp_token_only_verifies_as_temp_token() {
        let config = config();
        let user_id = Uuid::new_v4();
        let temp = create_mfa_temp_token(user_id, "t@school.edu", &config).unwrap();

        let claims = verify_mfa_temp_token(&temp, &config).unwrap();
        assert!(claims.mfa_pending);
        assert_eq!(claims.exp - claims.iat, MFA_TEMP_TOKEN_TTL_SECONDS as usize);
        assert!(verify_token(&temp, &config).is_err());

        let access =
            create_access_token(user_id, "t@school.edu", None, "teacher", vec![], &config).unwrap();
        assert!(verify_mfa_temp_token(&access, &config).is_err());
    }
}
