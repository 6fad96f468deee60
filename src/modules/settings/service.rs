use anyhow::anyhow;
use schoolhub_cache::{RedisCache, cached, invalidate, keys};
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::{SchoolId, UserId};
use tracing::{info, instrument};

use super::model::{SETTING_COLUMNS, Setting, UpsertSettingDto, is_valid_key};

fn check_key(key: &str) -> Result<(), AppError> {
    if !is_valid_key(key) {
        return Err(AppError::bad_request(anyhow!(
            "Setting keys are lowercase letters, digits, '.', '_' or '-'"
        )));
    }
    Ok(())
}

pub struct SettingService;

impl SettingService {
    /// Effective settings for a school: its own rows plus the global rows it
    /// does not override. `None` lists the global rows only.
    #[instrument(skip(db, cache))]
    pub async fn list(
        db: &PgPool,
        cache: Option<&RedisCache>,
        school_id: Option<SchoolId>,
    ) -> Result<Vec<Setting>, AppError> {
        let key = keys::settings::scope(school_id.map(SchoolId::into_inner));
        cached(cache, &key, || async move {
            let settings = sqlx::query_as::<_, Setting>(&format!(
                r#"SELECT DISTINCT ON (key) {SETTING_COLUMNS}
                   FROM system_settings
                   WHERE school_id IS NULL OR school_id = $1
                   ORDER BY key, school_id NULLS LAST"#
            ))
            .bind(school_id)
            .fetch_all(db)
            .await?;
            Ok::<_, AppError>(settings)
        })
        .await
    }

    pub async fn get(
        db: &PgPool,
        cache: Option<&RedisCache>,
        school_id: Option<SchoolId>,
        key: &str,
    ) -> Result<Setting, AppError> {
        Self::list(db, cache, school_id)
            .await?
            .into_iter()
            .find(|s| s.key == key)
            .ok_or_else(|| AppError::not_found(anyhow!("Setting not found")))
    }

    #[instrument(skip(db, cache, dto))]
    pub async fn upsert(
        db: &PgPool,
        cache: Option<&RedisCache>,
        school_id: Option<SchoolId>,
        key: &str,
        updated_by: UserId,
        dto: UpsertSettingDto,
    ) -> Result<Setting, AppError> {
        check_key(key)?;

        let setting = sqlx::query_as::<_, Setting>(&format!(
            r#"INSERT INTO system_settings (school_id, key, value, description, updated_by)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (school_id, key) DO UPDATE
               SET value = EXCLUDED.value,
                   description = COALESCE(EXCLUDED.description, system_settings.description),
                   updated_by = EXCLUDED.updated_by,
                   updated_at = NOW()
               RETURNING {SETTING_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(key)
        .bind(&dto.value)
        .bind(&dto.description)
        .bind(updated_by)
        .fetch_one(db)
        .await?;

        invalidate::settings(cache, school_id.map(SchoolId::into_inner)).await;
        info!(setting.key = %key, "Setting saved");
        Ok(setting)
    }

    /// Removes the row at exactly this scope. A school row deleted this way
    /// falls back to the global default, if any.
    #[instrument(skip(db, cache))]
    pub async fn delete(
        db: &PgPool,
        cache: Option<&RedisCache>,
        school_id: Option<SchoolId>,
        key: &str,
    ) -> Result<Setting, AppError> {
        let deleted = sqlx::query_as::<_, Setting>(&format!(
            r#"DELETE FROM system_settings
               WHERE key = $1 AND school_id IS NOT DISTINCT FROM $2
               RETURNING {SETTING_COLUMNS}"#
        ))
        .bind(key)
        .bind(school_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Setting not found")))?;

        invalidate::settings(cache, school_id.map(SchoolId::into_inner)).await;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key_maps_to_bad_request() {
        assert!(check_key("grading.pass_mark").is_ok());
        let err = check_key("Bad Key").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
