//! JWT claim sets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token claims. Authorization decisions are made from these alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: String,
    /// Tenant scope; `None` only for system administrators
    pub school_id: Option<Uuid>,
    /// Role slug: `system_admin`, `admin`, `teacher` or `student`
    pub role: String,
    pub permissions: Vec<String>,
    pub iss: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn is_system_admin(&self) -> bool {
        self.role == "system_admin"
    }
}

/// Issued after a correct password when the account has MFA enabled. Only the
/// MFA completion endpoints accept it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaTempClaims {
    pub sub: String,
    pub email: String,
    pub mfa_pending: bool,
    pub iss: String,
    pub exp: usize,
    pub iat: usize,
}

/// Refresh token claims. `jti` makes every token unique so that its hash can
/// be tracked server side for rotation and revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub email: String,
    pub jti: String,
    pub iss: String,
    pub exp: usize,
    pub iat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_round_trip_through_json() {
        let school_id = Uuid::new_v4();
        let claims = Claims {
            sub: "u-1".into(),
            email: "teacher@school.edu".into(),
            school_id: Some(school_id),
            role: "teacher".into(),
            permissions: vec!["grades:create".into()],
            iss: "schoolhub".into(),
            exp: 2,
            iat: 1,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains(r#""role":"teacher""#));

        let back: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(back.school_id, Some(school_id));
        assert!(!back.is_system_admin());
    }

    #[test]
    fn test_refresh_claims_are_not_access_claims() {
        let json = r#"{"sub":"u","email":"e","jti":"j","iss":"schoolhub","exp":2,"iat":1}"#;
        assert!(serde_json::from_str::<RefreshTokenClaims>(json).is_ok());
        assert!(serde_json::from_str::<Claims>(json).is_err());
    }
}
