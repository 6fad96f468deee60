//! Persisted user notifications and the payload pushed over the hub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use schoolhub_core::PaginationParams;

use crate::ids::{CourseId, NotificationId, SchoolId, UserId};
use crate::users::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub school_id: Option<SchoolId>,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub const NOTIFICATION_COLUMNS: &str =
    "id, school_id, user_id, title, message, notification_type, link, is_read, read_at, created_at";

/// Who receives a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NotificationTarget {
    User(UserId),
    Role(Role),
    Course(CourseId),
}

impl NotificationTarget {
    /// Hub group that live connections for this target belong to.
    pub fn group(&self) -> String {
        match self {
            Self::User(id) => format!("user_{id}"),
            Self::Role(role) => format!("role_{}", role.as_str()),
            Self::Course(id) => format!("course_{id}"),
        }
    }
}

fn validate_target(target: &NotificationTarget) -> Result<(), ValidationError> {
    if matches!(target, NotificationTarget::Role(Role::SystemAdmin)) {
        return Err(ValidationError::new("target_role"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendNotificationDto {
    #[validate(custom(function = "validate_target"))]
    pub target: NotificationTarget,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    #[validate(length(min = 1, max = 50))]
    pub notification_type: Option<String>,
    #[validate(length(max = 500))]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendNotificationResponse {
    pub group: String,
    pub recipients: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationFilterParams {
    #[serde(default)]
    pub unread_only: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

impl NotificationFilterParams {
    pub fn unread_only(&self) -> bool {
        matches!(self.unread_only.as_deref(), Some("true" | "1"))
    }
}

/// Message pushed to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub group: String,
    pub notification_id: Option<NotificationId>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_target_groups() {
        let id = Uuid::new_v4();
        assert_eq!(
            NotificationTarget::User(UserId::from(id)).group(),
            format!("user_{id}")
        );
        assert_eq!(NotificationTarget::Role(Role::Teacher).group(), "role_teacher");
        assert_eq!(
            NotificationTarget::Course(CourseId::from(id)).group(),
            format!("course_{id}")
        );
    }

    #[test]
    fn test_target_deserializes_tagged() {
        let target: NotificationTarget =
            serde_json::from_str(r#"{"type":"role","id":"student"}"#).unwrap();
        assert_eq!(target, NotificationTarget::Role(Role::Student));
    }

    #[test]
    fn test_system_admin_role_target_rejected() {
        let dto = SendNotificationDto {
            target: NotificationTarget::Role(Role::SystemAdmin),
            title: "Hi".into(),
            message: "There".into(),
            notification_type: None,
            link: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_unread_only_flag() {
        let params: NotificationFilterParams =
            serde_json::from_value(serde_json::json!({"unread_only": "true"})).unwrap();
        assert!(params.unread_only());
    }
}
