use anyhow::anyhow;
use schoolhub_core::{AppError, hash_password};
use schoolhub_db::PgPool;
use schoolhub_models::ids::{SchoolId, UserId};
use tracing::{info, instrument};

use crate::utils::db_errors::constraint_violation;

use super::model::{
    CreateUserDto, NewAccount, PaginatedUsers, Role, USER_COLUMNS, UpdateUserDto, User,
    UserFilterParams,
};

const USER_FILTER: &str = r#"
    WHERE is_deleted = FALSE
      AND ($1::uuid IS NULL OR school_id = $1)
      AND ($2::user_role IS NULL OR role = $2)
      AND ($3::text IS NULL OR first_name ILIKE $3 OR last_name ILIKE $3 OR email ILIKE $3)
"#;

pub struct UserService;

impl UserService {
    #[instrument(skip(db, dto), fields(user.email = %dto.email, user.role = %dto.role))]
    pub async fn create(
        db: &PgPool,
        school_id: SchoolId,
        dto: CreateUserDto,
    ) -> Result<User, AppError> {
        let hashed = hash_password(&dto.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (school_id, first_name, last_name, email, password, role, phone)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(dto.first_name.trim())
        .bind(dto.last_name.trim())
        .bind(dto.email.trim().to_lowercase())
        .bind(&hashed)
        .bind(dto.role)
        .bind(&dto.phone)
        .fetch_one(db)
        .await
        .map_err(constraint_violation("Email already exists"))?;

        info!(user.id = %user.id, "User created");
        Ok(user)
    }

    /// Login account behind a student or teacher profile. Runs inside the
    /// caller's transaction so the profile insert can roll it back.
    pub async fn insert_account(
        conn: &mut sqlx::PgConnection,
        school_id: SchoolId,
        account: &NewAccount,
        role: Role,
    ) -> Result<UserId, AppError> {
        let hashed = hash_password(&account.password)?;

        sqlx::query_scalar::<_, UserId>(
            r#"INSERT INTO users (school_id, first_name, last_name, email, password, role, phone)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id"#,
        )
        .bind(school_id)
        .bind(account.first_name.trim())
        .bind(account.last_name.trim())
        .bind(account.email.trim().to_lowercase())
        .bind(&hashed)
        .bind(role)
        .bind(&account.phone)
        .fetch_one(conn)
        .await
        .map_err(constraint_violation("Email already exists"))
    }

    /// Name and phone changes made through a student or teacher profile.
    pub async fn update_account(
        conn: &mut sqlx::PgConnection,
        id: UserId,
        first_name: Option<&str>,
        last_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   phone = COALESCE($4, phone),
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(first_name.map(str::trim))
        .bind(last_name.map(str::trim))
        .bind(phone)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Deactivates the account behind a deleted profile and ends its sessions.
    pub async fn deactivate_account(
        conn: &mut sqlx::PgConnection,
        id: UserId,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: UserFilterParams,
    ) -> Result<PaginatedUsers, AppError> {
        let pagination = &filters.pagination;
        let search = filters.search.as_deref().map(|s| format!("%{s}%"));

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users {USER_FILTER}"))
            .bind(scope)
            .bind(filters.role)
            .bind(&search)
            .fetch_one(db)
            .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users {USER_FILTER} \
             ORDER BY last_name, first_name LIMIT $4 OFFSET $5"
        ))
        .bind(scope)
        .bind(filters.role)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedUsers::new(users, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn get(db: &PgPool, scope: Option<SchoolId>, id: UserId) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: UserId,
        dto: UpdateUserDto,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET first_name = COALESCE($3, first_name),
                   last_name = COALESCE($4, last_name),
                   phone = COALESCE($5, phone),
                   is_active = COALESCE($6, is_active),
                   updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(scope)
        .bind(dto.first_name.as_deref().map(str::trim))
        .bind(dto.last_name.as_deref().map(str::trim))
        .bind(&dto.phone)
        .bind(dto.is_active)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    /// Soft delete. The account is deactivated and its sessions revoked.
    #[instrument(skip(db))]
    pub async fn delete(db: &PgPool, scope: Option<SchoolId>, id: UserId) -> Result<(), AppError> {
        let mut tx = db.begin().await?;

        let result = sqlx::query(
            r#"UPDATE users
               SET is_deleted = TRUE, deleted_at = NOW(), is_active = FALSE, updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#,
        )
        .bind(id)
        .bind(scope)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("User not found")));
        }

        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user.id = %id, "User deleted");
        Ok(())
    }

    /// Clears a lockout before it expires.
    #[instrument(skip(db))]
    pub async fn unlock(db: &PgPool, scope: Option<SchoolId>, id: UserId) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET failed_login_attempts = 0, locked_until = NULL, updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))?;

        info!(user.id = %id, "User unlocked");
        Ok(user)
    }
}

/// Which roles the caller may manage through this endpoint.
pub fn ensure_can_create(caller: Role, target: Role) -> Result<(), AppError> {
    if caller.can_create(target) {
        return Ok(());
    }
    Err(AppError::forbidden(format!(
        "A {} cannot create a {} account here",
        caller, target
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admin_roles_are_creatable() {
        assert!(ensure_can_create(Role::SystemAdmin, Role::Admin).is_ok());
        assert!(ensure_can_create(Role::Admin, Role::Admin).is_ok());

        let err = ensure_can_create(Role::Admin, Role::SystemAdmin).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
        assert!(ensure_can_create(Role::Teacher, Role::Admin).is_err());
    }
}
