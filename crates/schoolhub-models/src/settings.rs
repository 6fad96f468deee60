use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::serde::deserialize_optional_uuid;

use crate::ids::{SchoolId, SettingId, UserId};

/// A key/value setting. `school_id = None` marks a platform-wide default.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub id: SettingId,
    pub school_id: Option<SchoolId>,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const SETTING_COLUMNS: &str =
    "id, school_id, key, value, description, updated_by, created_at, updated_at";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertSettingDto {
    #[validate(length(max = 5000))]
    pub value: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Only system admins may write global rows (`global = true`).
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingScopeParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
}

/// Keys are lowercase dotted identifiers such as `grading.pass_mark`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 100
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert!(is_valid_key("grading.pass_mark"));
        assert!(is_valid_key("attendance.late-threshold"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("Grading.PassMark"));
        assert!(!is_valid_key("a b"));
    }
}
