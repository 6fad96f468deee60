//! System administrator bootstrap.

use schoolhub_core::hash_password;
use schoolhub_models::Role;
use schoolhub_models::ids::UserId;
use schoolhub_models::users::NewAccount;
use sqlx::PgPool;
use validator::Validate;

use crate::CliResult;

/// Creates a `system_admin` user (no school). Fails when the email is taken.
pub async fn create_system_admin(db: &PgPool, account: NewAccount) -> CliResult<UserId> {
    account.validate()?;

    let email = account.email.trim().to_lowercase();
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = $1 AND is_deleted = FALSE)",
    )
    .bind(&email)
    .fetch_one(db)
    .await?;

    if taken {
        return Err(format!("A user with email {email} already exists").into());
    }

    let password_hash = hash_password(&account.password).map_err(|e| e.to_string())?;

    let id = sqlx::query_scalar::<_, UserId>(
        r#"INSERT INTO users (first_name, last_name, email, password, role, phone, school_id)
           VALUES ($1, $2, $3, $4, $5, $6, NULL)
           RETURNING id"#,
    )
    .bind(account.first_name.trim())
    .bind(account.last_name.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(Role::SystemAdmin)
    .bind(&account.phone)
    .fetch_one(db)
    .await?;

    Ok(id)
}
