use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::{deserialize_optional_string, deserialize_optional_uuid};

use crate::ids::{AuditLogId, SchoolId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub school_id: Option<SchoolId>,
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Verbs recorded in `audit_logs.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    Enroll,
    Drop,
    Complete,
    Unlock,
    PasswordReset,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Enroll => "enroll",
            Self::Drop => "drop",
            Self::Complete => "complete",
            Self::Unlock => "unlock",
            Self::PasswordReset => "password_reset",
        }
    }
}

/// A row to be written.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub school_id: Option<SchoolId>,
    pub actor_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction, entity_type: &'static str, entity_id: Option<Uuid>) -> Self {
        Self {
            school_id: None,
            actor_id: None,
            action,
            entity_type,
            entity_id,
            old_values: None,
            new_values: None,
            ip_address: None,
        }
    }

    pub fn actor(mut self, actor_id: UserId, school_id: Option<SchoolId>) -> Self {
        self.actor_id = Some(actor_id);
        self.school_id = school_id;
        self
    }

    pub fn old<T: Serialize>(mut self, value: &T) -> Self {
        self.old_values = serde_json::to_value(value).ok();
        self
    }

    pub fn new_values<T: Serialize>(mut self, value: &T) -> Self {
        self.new_values = serde_json::to_value(value).ok();
        self
    }

    pub fn ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub entity_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub actor_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_fields() {
        let actor = UserId::new();
        let entry = NewAuditEntry::new(AuditAction::Update, "course", None)
            .actor(actor, None)
            .new_values(&serde_json::json!({"name": "Algebra"}))
            .ip(Some("10.0.0.1".into()));
        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.action.as_str(), "update");
        assert_eq!(entry.new_values.unwrap()["name"], "Algebra");
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    }
}
