use anyhow::anyhow;
use rayon::prelude::*;
use schoolhub_auth::mfa::{build_totp, generate_recovery_codes, generate_secret, verify_code};
use schoolhub_core::{AppError, hash_password, verify_password};
use schoolhub_db::PgPool;
use schoolhub_models::ids::UserId;
use tracing::{info, instrument};

use super::model::{EnableMfaResponse, MfaStatusResponse, RecoveryCodesResponse};

#[derive(sqlx::FromRow)]
struct UserMfa {
    email: String,
    password: String,
    mfa_enabled: bool,
    mfa_secret: Option<String>,
}

pub struct MfaService;

impl MfaService {
    async fn load(db: &PgPool, user_id: UserId) -> Result<UserMfa, AppError> {
        sqlx::query_as::<_, UserMfa>(
            r#"SELECT email, password, mfa_enabled, mfa_secret
               FROM users WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    #[instrument(skip(db))]
    pub async fn status(db: &PgPool, user_id: UserId) -> Result<MfaStatusResponse, AppError> {
        let user = Self::load(db, user_id).await?;

        let remaining = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM mfa_recovery_codes WHERE user_id = $1 AND used = FALSE",
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;

        Ok(MfaStatusResponse {
            mfa_enabled: user.mfa_enabled,
            recovery_codes_remaining: remaining,
        })
    }

    /// Stores a pending secret. MFA stays off until a code from it verifies.
    #[instrument(skip(db))]
    pub async fn enable(
        db: &PgPool,
        user_id: UserId,
        issuer: &str,
    ) -> Result<EnableMfaResponse, AppError> {
        let user = Self::load(db, user_id).await?;
        if user.mfa_enabled {
            return Err(AppError::bad_request(anyhow!("MFA is already enabled")));
        }

        let secret = generate_secret();
        let totp = build_totp(&secret, issuer, &user.email)?;
        let qr_code_url = totp.get_url();
        let qr_code_base64 = totp
            .get_qr_base64()
            .map_err(|e| AppError::internal_error(format!("Failed to generate QR code: {}", e)))?;

        sqlx::query("UPDATE users SET mfa_secret = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(&secret)
            .execute(db)
            .await?;

        Ok(EnableMfaResponse {
            secret,
            qr_code_url,
            qr_code_base64,
        })
    }

    /// Confirms the pending secret and hands out the recovery codes. They
    /// are only ever shown here and on regeneration.
    #[instrument(skip(db, code))]
    pub async fn verify(
        db: &PgPool,
        user_id: UserId,
        issuer: &str,
        code: &str,
    ) -> Result<RecoveryCodesResponse, AppError> {
        let user = Self::load(db, user_id).await?;
        if user.mfa_enabled {
            return Err(AppError::bad_request(anyhow!("MFA is already enabled")));
        }

        let secret = user.mfa_secret.ok_or_else(|| {
            AppError::bad_request(anyhow!("MFA setup has not been started. Call /mfa/enable first"))
        })?;

        if !verify_code(&secret, issuer, &user.email, code)? {
            return Err(AppError::bad_request(anyhow!("Invalid TOTP code")));
        }

        let recovery_codes = generate_recovery_codes();
        let hashes = hash_codes(recovery_codes.clone()).await?;

        let mut tx = db.begin().await?;
        sqlx::query("UPDATE users SET mfa_enabled = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        replace_codes(&mut tx, user_id, &hashes).await?;
        tx.commit().await?;

        info!(%user_id, "MFA enabled");
        Ok(RecoveryCodesResponse { recovery_codes })
    }

    #[instrument(skip(db, password))]
    pub async fn disable(db: &PgPool, user_id: UserId, password: &str) -> Result<(), AppError> {
        let user = Self::load(db, user_id).await?;
        if !user.mfa_enabled {
            return Err(AppError::bad_request(anyhow!("MFA is not enabled")));
        }

        if !verify_password(password, &user.password)? {
            return Err(AppError::bad_request(anyhow!("Invalid password")));
        }

        let mut tx = db.begin().await?;
        sqlx::query(
            r#"UPDATE users SET mfa_enabled = FALSE, mfa_secret = NULL, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        replace_codes(&mut tx, user_id, &[]).await?;
        tx.commit().await?;

        info!(%user_id, "MFA disabled");
        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn regenerate_recovery_codes(
        db: &PgPool,
        user_id: UserId,
    ) -> Result<RecoveryCodesResponse, AppError> {
        let user = Self::load(db, user_id).await?;
        if !user.mfa_enabled {
            return Err(AppError::bad_request(anyhow!("MFA is not enabled")));
        }

        let recovery_codes = generate_recovery_codes();
        let hashes = hash_codes(recovery_codes.clone()).await?;

        let mut tx = db.begin().await?;
        replace_codes(&mut tx, user_id, &hashes).await?;
        tx.commit().await?;

        Ok(RecoveryCodesResponse { recovery_codes })
    }
}

/// bcrypt is slow on purpose, so the batch is hashed in parallel off the
/// async runtime.
async fn hash_codes(codes: Vec<String>) -> Result<Vec<String>, AppError> {
    tokio::task::spawn_blocking(move || {
        codes
            .par_iter()
            .map(|code| hash_password(code))
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| AppError::internal_error(format!("Task join error: {}", e)))?
}

async fn replace_codes(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
    hashes: &[String],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM mfa_recovery_codes WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    if hashes.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"INSERT INTO mfa_recovery_codes (user_id, code_hash)
           SELECT $1, unnest($2::text[])"#,
    )
    .bind(user_id)
    .bind(hashes)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
