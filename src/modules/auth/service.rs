use anyhow::anyhow;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rayon::prelude::*;
use schoolhub_auth::mfa::{normalize_recovery_code, verify_code};
use schoolhub_auth::tokens::{fingerprint, generate_opaque_token};
use schoolhub_auth::{
    LockoutPolicy, LoginAttemptOutcome, create_access_token, create_mfa_temp_token,
    create_refresh_token, verify_mfa_temp_token, verify_refresh_token,
};
use schoolhub_config::{EmailConfig, JwtConfig, SecurityConfig};
use schoolhub_core::{AppError, hash_password, verify_password};
use schoolhub_db::PgPool;
use schoolhub_models::ids::UserId;
use schoolhub_models::users::{USER_COLUMNS, User, UserCredentials};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::metrics;
use crate::utils::email::EmailService;

use super::model::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginOutcome, LoginRequest, LoginResponse,
    MfaRecoveryLoginRequest, MfaRequiredResponse, MfaVerifyLoginRequest, ResetPasswordRequest,
    TokenPair,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn locked_error() -> AppError {
    AppError::unauthorized("Account is temporarily locked due to too many failed login attempts")
}

pub struct AuthService;

impl AuthService {
    #[instrument(skip(db, dto, jwt_config, security), fields(email = %dto.email))]
    pub async fn login(
        db: &PgPool,
        dto: LoginRequest,
        jwt_config: &JwtConfig,
        security: &SecurityConfig,
    ) -> Result<LoginOutcome, AppError> {
        let user = sqlx::query_as::<_, UserCredentials>(
            r#"SELECT id, school_id, email, password, role, is_active,
                      failed_login_attempts, locked_until, mfa_enabled
               FROM users
               WHERE LOWER(email) = LOWER($1) AND is_deleted = FALSE"#,
        )
        .bind(dto.email.trim())
        .fetch_optional(db)
        .await?;

        let Some(user) = user else {
            metrics::track_login_failure("unknown_user");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        let policy = LockoutPolicy::from_config(security);
        let now = Utc::now();

        if policy.is_locked(user.locked_until, now) {
            metrics::track_login_failure("locked");
            return Err(locked_error());
        }

        if !verify_password(&dto.password, &user.password)? {
            metrics::track_login_failure("bad_password");
            return Err(Self::record_failed_attempt(db, &policy, user.id, now).await?);
        }

        // Only reported to callers who know the password
        if !user.is_active {
            metrics::track_login_failure("inactive");
            return Err(AppError::unauthorized("Account is disabled"));
        }

        sqlx::query(
            r#"UPDATE users
               SET failed_login_attempts = 0, locked_until = NULL, last_login_at = NOW()
               WHERE id = $1"#,
        )
        .bind(user.id)
        .execute(db)
        .await?;

        if user.mfa_enabled {
            let temp_token = create_mfa_temp_token(user.id.into_inner(), &user.email, jwt_config)?;
            return Ok(LoginOutcome::MfaRequired(MfaRequiredResponse {
                mfa_required: true,
                temp_token,
            }));
        }

        let response = Self::issue_session(db, user.id, jwt_config).await?;
        Ok(LoginOutcome::Complete(Box::new(response)))
    }

    /// Bumps the failure counter, locking the account once the threshold is
    /// reached. Returns the error the caller should answer with.
    ///
    /// The counter is re-read under a row lock, so concurrent failures are
    /// all counted.
    async fn record_failed_attempt(
        db: &PgPool,
        policy: &LockoutPolicy,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<AppError, AppError> {
        let mut tx = db.begin().await?;

        let (failed, locked_until) = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(
            "SELECT failed_login_attempts, locked_until FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        // Another attempt locked it while this one checked the password
        if policy.is_locked(locked_until, now) {
            tx.commit().await?;
            return Ok(locked_error());
        }

        // An expired lock leaves a stale counter behind
        let previous = if locked_until.is_some() { 0 } else { failed };

        let outcome = match policy.register_failure(previous, now) {
            LoginAttemptOutcome::Counted { failed_attempts } => {
                sqlx::query(
                    "UPDATE users SET failed_login_attempts = $2, locked_until = NULL WHERE id = $1",
                )
                .bind(user_id)
                .bind(failed_attempts)
                .execute(&mut *tx)
                .await?;

                AppError::unauthorized(INVALID_CREDENTIALS)
            }
            LoginAttemptOutcome::Locked { until } => {
                sqlx::query(
                    "UPDATE users SET failed_login_attempts = 0, locked_until = $2 WHERE id = $1",
                )
                .bind(user_id)
                .bind(until)
                .execute(&mut *tx)
                .await?;

                metrics::track_account_locked();
                warn!(%user_id, %until, "Account locked after repeated failed logins");
                locked_error()
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    #[instrument(skip(db, dto, jwt_config, security))]
    pub async fn verify_mfa_login(
        db: &PgPool,
        dto: MfaVerifyLoginRequest,
        jwt_config: &JwtConfig,
        security: &SecurityConfig,
    ) -> Result<LoginResponse, AppError> {
        let claims = verify_mfa_temp_token(&dto.temp_token, jwt_config)?;
        let user_id = parse_subject(&claims.sub)?;

        #[derive(sqlx::FromRow)]
        struct UserMfa {
            email: String,
            mfa_enabled: bool,
            mfa_secret: Option<String>,
        }

        let user = sqlx::query_as::<_, UserMfa>(
            "SELECT email, mfa_enabled, mfa_secret FROM users WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid MFA temp token"))?;

        let secret = match (user.mfa_enabled, user.mfa_secret) {
            (true, Some(secret)) => secret,
            _ => return Err(AppError::bad_request(anyhow!("MFA is not enabled"))),
        };

        if !verify_code(&secret, &security.mfa_issuer, &user.email, &dto.code)? {
            metrics::track_login_failure("bad_mfa_code");
            return Err(AppError::unauthorized("Invalid MFA code"));
        }

        Self::issue_session(db, user_id, jwt_config).await
    }

    /// Completes an MFA login with a one-time recovery code.
    #[instrument(skip(db, dto, jwt_config))]
    pub async fn verify_mfa_recovery_login(
        db: &PgPool,
        dto: MfaRecoveryLoginRequest,
        jwt_config: &JwtConfig,
    ) -> Result<LoginResponse, AppError> {
        let claims = verify_mfa_temp_token(&dto.temp_token, jwt_config)?;
        let user_id = parse_subject(&claims.sub)?;

        #[derive(sqlx::FromRow)]
        struct RecoveryCode {
            id: Uuid,
            code_hash: String,
        }

        let codes = sqlx::query_as::<_, RecoveryCode>(
            "SELECT id, code_hash FROM mfa_recovery_codes WHERE user_id = $1 AND used = FALSE",
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        let code = normalize_recovery_code(&dto.recovery_code);
        let matched = tokio::task::spawn_blocking(move || {
            codes
                .par_iter()
                .find_any(|c| verify_password(&code, &c.code_hash).unwrap_or(false))
                .map(|c| c.id)
        })
        .await
        .map_err(|e| AppError::internal_error(format!("Task join error: {}", e)))?;

        let Some(code_id) = matched else {
            metrics::track_login_failure("bad_recovery_code");
            return Err(AppError::unauthorized("Invalid recovery code"));
        };

        // Guarded so two concurrent logins cannot spend the same code
        let spent = sqlx::query(
            "UPDATE mfa_recovery_codes SET used = TRUE, used_at = NOW() WHERE id = $1 AND used = FALSE",
        )
        .bind(code_id)
        .execute(db)
        .await?;

        if spent.rows_affected() != 1 {
            return Err(AppError::unauthorized("Invalid recovery code"));
        }

        info!(%user_id, "Recovery code used for login");
        Self::issue_session(db, user_id, jwt_config).await
    }

    /// Issues an access token and a tracked refresh token.
    #[instrument(skip(db, jwt_config))]
    pub async fn issue_session(
        db: &PgPool,
        user_id: UserId,
        jwt_config: &JwtConfig,
    ) -> Result<LoginResponse, AppError> {
        let user = Self::me(db, user_id).await?;
        let permissions = user.role.permissions();

        let tokens = Self::issue_tokens(db, &user, permissions.clone(), jwt_config).await?;
        metrics::track_login_success(user.role.as_str());

        Ok(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            user,
            permissions,
        })
    }

    async fn issue_tokens(
        db: &PgPool,
        user: &User,
        permissions: Vec<String>,
        jwt_config: &JwtConfig,
    ) -> Result<TokenPair, AppError> {
        let access_token = create_access_token(
            user.id.into_inner(),
            &user.email,
            user.school_id.map(Uuid::from),
            user.role.as_str(),
            permissions,
            jwt_config,
        )?;
        let refresh_token = Self::store_refresh_token(db, user, jwt_config).await?.0;
        metrics::track_jwt_issued();

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: jwt_config.access_token_expiry,
        })
    }

    async fn store_refresh_token<'e, E>(
        executor: E,
        user: &User,
        jwt_config: &JwtConfig,
    ) -> Result<(String, Uuid), AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let (token, claims) = create_refresh_token(user.id.into_inner(), &user.email, jwt_config)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .unwrap_or_else(|| Utc::now() + Duration::seconds(jwt_config.refresh_token_expiry));

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
               VALUES ($1, $2, $3)
               RETURNING id"#,
        )
        .bind(user.id)
        .bind(fingerprint(&token))
        .bind(expires_at)
        .fetch_one(executor)
        .await?;

        Ok((token, id))
    }

    /// Rotates a refresh token. Presenting a token that was already rotated
    /// or revoked revokes every session of its owner.
    #[instrument(skip(db, refresh_token, jwt_config))]
    pub async fn refresh(
        db: &PgPool,
        refresh_token: &str,
        jwt_config: &JwtConfig,
    ) -> Result<TokenPair, AppError> {
        let claims = verify_refresh_token(refresh_token, jwt_config)?;
        let user_id = parse_subject(&claims.sub)?;

        #[derive(sqlx::FromRow)]
        struct StoredToken {
            id: Uuid,
            user_id: UserId,
            expires_at: DateTime<Utc>,
            revoked_at: Option<DateTime<Utc>>,
        }

        let stored = sqlx::query_as::<_, StoredToken>(
            "SELECT id, user_id, expires_at, revoked_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(fingerprint(refresh_token))
        .fetch_optional(db)
        .await?
        .filter(|t| t.user_id == user_id)
        .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

        if stored.revoked_at.is_some() {
            Self::revoke_all_for_user(db, user_id).await?;
            warn!(%user_id, "Refresh token reuse detected, all sessions revoked");
            return Err(AppError::unauthorized("Refresh token has been revoked"));
        }

        if stored.expires_at <= Utc::now() {
            return Err(AppError::unauthorized("Refresh token has expired"));
        }

        let user = Self::me(db, user_id).await?;
        if !user.is_active {
            return Err(AppError::unauthorized("Account is disabled"));
        }

        let mut tx = db.begin().await?;

        let rotated = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(stored.id)
        .execute(&mut *tx)
        .await?;

        if rotated.rows_affected() != 1 {
            // Lost a race against another rotation of the same token
            tx.rollback().await?;
            Self::revoke_all_for_user(db, user_id).await?;
            warn!(%user_id, "Concurrent refresh token reuse, all sessions revoked");
            return Err(AppError::unauthorized("Refresh token has been revoked"));
        }

        let (new_token, new_id) = Self::store_refresh_token(&mut *tx, &user, jwt_config).await?;

        sqlx::query("UPDATE refresh_tokens SET replaced_by = $2 WHERE id = $1")
            .bind(stored.id)
            .bind(new_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let access_token = create_access_token(
            user.id.into_inner(),
            &user.email,
            user.school_id.map(Uuid::from),
            user.role.as_str(),
            user.role.permissions(),
            jwt_config,
        )?;
        metrics::track_jwt_issued();

        Ok(TokenPair {
            access_token,
            refresh_token: new_token,
            token_type: "Bearer",
            expires_in: jwt_config.access_token_expiry,
        })
    }

    /// Revokes one of the caller's refresh tokens. Unknown tokens are ignored.
    #[instrument(skip(db, refresh_token))]
    pub async fn logout(db: &PgPool, user_id: UserId, refresh_token: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE refresh_tokens SET revoked_at = NOW()
               WHERE token_hash = $1 AND user_id = $2 AND revoked_at IS NULL"#,
        )
        .bind(fingerprint(refresh_token))
        .bind(user_id)
        .execute(db)
        .await?;

        Ok(())
    }

    pub async fn revoke_all_for_user<'e, E>(executor: E, user_id: UserId) -> Result<u64, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Always succeeds so that callers cannot probe which emails exist.
    #[instrument(skip(db, dto, email_config, security))]
    pub async fn forgot_password(
        db: &PgPool,
        dto: ForgotPasswordRequest,
        email_config: &EmailConfig,
        security: &SecurityConfig,
    ) -> Result<(), AppError> {
        #[derive(sqlx::FromRow)]
        struct Recipient {
            id: UserId,
            first_name: String,
            email: String,
        }

        let recipient = sqlx::query_as::<_, Recipient>(
            r#"SELECT id, first_name, email FROM users
               WHERE LOWER(email) = LOWER($1) AND is_deleted = FALSE AND is_active = TRUE"#,
        )
        .bind(dto.email.trim())
        .fetch_optional(db)
        .await?;

        let Some(recipient) = recipient else {
            info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_opaque_token();
        let expires_at = Utc::now() + Duration::minutes(security.password_reset_expiry_minutes);

        sqlx::query(
            r#"INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
               VALUES ($1, $2, $3)"#,
        )
        .bind(recipient.id)
        .bind(fingerprint(&token))
        .bind(expires_at)
        .execute(db)
        .await?;

        let email_service = EmailService::new(email_config.clone());
        if let Err(e) = email_service
            .send_password_reset_email(
                &recipient.email,
                &recipient.first_name,
                &token,
                security.password_reset_expiry_minutes,
            )
            .await
        {
            warn!(user_id = %recipient.id, error = %e.error, "Failed to send password reset email");
        }

        Ok(())
    }

    /// Consumes a reset token, sets the new password, clears any lockout and
    /// signs the user out everywhere. Returns the affected user.
    #[instrument(skip(db, dto, email_config))]
    pub async fn reset_password(
        db: &PgPool,
        dto: ResetPasswordRequest,
        email_config: &EmailConfig,
    ) -> Result<UserId, AppError> {
        #[derive(sqlx::FromRow)]
        struct ResetToken {
            id: Uuid,
            user_id: UserId,
            expires_at: DateTime<Utc>,
            used_at: Option<DateTime<Utc>>,
        }

        let invalid = || AppError::bad_request(anyhow!("Invalid or expired reset token"));

        let mut tx = db.begin().await?;

        let token = sqlx::query_as::<_, ResetToken>(
            r#"SELECT id, user_id, expires_at, used_at FROM password_reset_tokens
               WHERE token_hash = $1
               FOR UPDATE"#,
        )
        .bind(fingerprint(dto.token.trim()))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(invalid)?;

        if token.used_at.is_some() || token.expires_at <= Utc::now() {
            return Err(invalid());
        }

        let hashed = hash_password(&dto.new_password)?;

        #[derive(sqlx::FromRow)]
        struct Recipient {
            first_name: String,
            email: String,
        }

        let recipient = sqlx::query_as::<_, Recipient>(
            r#"UPDATE users
               SET password = $2, failed_login_attempts = 0, locked_until = NULL, updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING first_name, email"#,
        )
        .bind(token.user_id)
        .bind(&hashed)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(invalid)?;

        sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1")
            .bind(token.id)
            .execute(&mut *tx)
            .await?;

        Self::revoke_all_for_user(&mut *tx, token.user_id).await?;

        tx.commit().await?;

        let email_service = EmailService::new(email_config.clone());
        if let Err(e) = email_service
            .send_password_changed_email(&recipient.email, &recipient.first_name)
            .await
        {
            warn!(user_id = %token.user_id, error = %e.error, "Failed to send password changed email");
        }

        Ok(token.user_id)
    }

    #[instrument(skip(db, dto))]
    pub async fn change_password(
        db: &PgPool,
        user_id: UserId,
        dto: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let current_hash = sqlx::query_scalar::<_, String>(
            "SELECT password FROM users WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))?;

        if !verify_password(&dto.current_password, &current_hash)? {
            return Err(AppError::bad_request(anyhow!("Current password is incorrect")));
        }

        if dto.current_password == dto.new_password {
            return Err(AppError::bad_request(anyhow!(
                "New password must differ from the current password"
            )));
        }

        let hashed = hash_password(&dto.new_password)?;

        let mut tx = db.begin().await?;
        sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(&hashed)
            .execute(&mut *tx)
            .await?;
        Self::revoke_all_for_user(&mut *tx, user_id).await?;
        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn me(db: &PgPool, user_id: UserId) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))
    }
}

fn parse_subject(sub: &str) -> Result<UserId, AppError> {
    sub.parse()
        .map_err(|_| AppError::unauthorized("Invalid user ID in token"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subject_rejects_garbage() {
        let id = Uuid::new_v4();
        assert_eq!(parse_subject(&id.to_string()).unwrap().into_inner(), id);

        let err = parse_subject("not-a-uuid").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }
}
