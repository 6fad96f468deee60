use std::collections::HashSet;

use anyhow::anyhow;
use chrono::Utc;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::Role;
use schoolhub_models::ids::{CourseId, NotificationId, SchoolId, UserId};
use tracing::{info, instrument};

use crate::metrics;

use super::hub::{Membership, NotificationHub};
use super::model::{
    NOTIFICATION_COLUMNS, Notification, NotificationEvent, NotificationFilterParams,
    NotificationTarget, PaginatedNotifications, SendNotificationDto, SendNotificationResponse,
};

fn target_label(target: &NotificationTarget) -> &'static str {
    match target {
        NotificationTarget::User(_) => "user",
        NotificationTarget::Role(_) => "role",
        NotificationTarget::Course(_) => "course",
    }
}

pub struct NotificationService;

impl NotificationService {
    async fn recipients(
        db: &PgPool,
        school_id: SchoolId,
        target: &NotificationTarget,
    ) -> Result<Vec<UserId>, AppError> {
        let users = match target {
            NotificationTarget::User(user_id) => {
                let exists = sqlx::query_scalar::<_, bool>(
                    r#"SELECT EXISTS(SELECT 1 FROM users
                       WHERE id = $1 AND school_id = $2 AND is_deleted = FALSE)"#,
                )
                .bind(user_id)
                .bind(school_id)
                .fetch_one(db)
                .await?;
                if !exists {
                    return Err(AppError::not_found(anyhow!("User not found")));
                }
                vec![*user_id]
            }
            NotificationTarget::Role(role) => {
                sqlx::query_scalar::<_, UserId>(
                    r#"SELECT id FROM users
                       WHERE school_id = $1 AND role = $2
                         AND is_active = TRUE AND is_deleted = FALSE"#,
                )
                .bind(school_id)
                .bind(role)
                .fetch_all(db)
                .await?
            }
            NotificationTarget::Course(course_id) => {
                let exists = sqlx::query_scalar::<_, bool>(
                    r#"SELECT EXISTS(SELECT 1 FROM courses
                       WHERE id = $1 AND school_id = $2 AND is_deleted = FALSE)"#,
                )
                .bind(course_id)
                .bind(school_id)
                .fetch_one(db)
                .await?;
                if !exists {
                    return Err(AppError::not_found(anyhow!("Course not found")));
                }
                sqlx::query_scalar::<_, UserId>(
                    r#"SELECT s.user_id FROM enrollments e
                       JOIN students s ON s.id = e.student_id
                       WHERE e.course_id = $1 AND e.status = 'active'
                         AND e.is_deleted = FALSE AND s.is_deleted = FALSE"#,
                )
                .bind(course_id)
                .fetch_all(db)
                .await?
            }
        };
        Ok(users)
    }

    /// Persists one notification per recipient, then pushes a single event
    /// to the target's hub group.
    #[instrument(skip(db, hub, dto), fields(target = target_label(&dto.target)))]
    pub async fn send(
        db: &PgPool,
        hub: &NotificationHub,
        school_id: SchoolId,
        dto: SendNotificationDto,
    ) -> Result<SendNotificationResponse, AppError> {
        let recipients = Self::recipients(db, school_id, &dto.target).await?;
        let notification_type = dto
            .notification_type
            .clone()
            .unwrap_or_else(|| "general".to_string());

        let ids = sqlx::query_scalar::<_, NotificationId>(
            r#"INSERT INTO notifications (school_id, user_id, title, message, notification_type, link)
               SELECT $1, recipient, $3, $4, $5, $6 FROM UNNEST($2::uuid[]) AS recipient
               RETURNING id"#,
        )
        .bind(school_id)
        .bind(&recipients)
        .bind(dto.title.trim())
        .bind(&dto.message)
        .bind(&notification_type)
        .bind(&dto.link)
        .fetch_all(db)
        .await?;

        let group = dto.target.group();
        let notification_id = match dto.target {
            NotificationTarget::User(_) => ids.first().copied(),
            _ => None,
        };

        hub.publish(
            Some(school_id),
            NotificationEvent {
                group: group.clone(),
                notification_id,
                title: dto.title,
                message: dto.message,
                notification_type,
                link: dto.link,
                created_at: Utc::now(),
            },
        );

        metrics::track_notifications_sent(target_label(&dto.target), ids.len());
        info!(group = %group, recipients = ids.len(), "Notification sent");

        Ok(SendNotificationResponse {
            group,
            recipients: ids.len(),
        })
    }

    #[instrument(skip(db, filters))]
    pub async fn list_for_user(
        db: &PgPool,
        user_id: UserId,
        filters: NotificationFilterParams,
    ) -> Result<PaginatedNotifications, AppError> {
        let pagination = &filters.pagination;
        let unread_only = filters.unread_only();
        let filter = "WHERE user_id = $1 AND ($2 = FALSE OR is_read = FALSE)";

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM notifications {filter}"))
                .bind(user_id)
                .bind(unread_only)
                .fetch_one(db)
                .await?;

        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications {filter} \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedNotifications::new(notifications, pagination, total))
    }

    pub async fn unread_count(db: &PgPool, user_id: UserId) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    /// Only the recipient can mark a notification read.
    #[instrument(skip(db))]
    pub async fn mark_read(
        db: &PgPool,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Notification, AppError> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"UPDATE notifications
               SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
               WHERE id = $1 AND user_id = $2
               RETURNING {NOTIFICATION_COLUMNS}"#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Notification not found")))
    }

    #[instrument(skip(db))]
    pub async fn mark_all_read(db: &PgPool, user_id: UserId) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"UPDATE notifications SET is_read = TRUE, read_at = NOW()
               WHERE user_id = $1 AND is_read = FALSE"#,
        )
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Hub groups for a connecting user: their own group, their role, and
    /// every course they take or teach. Resolved once per connection.
    #[instrument(skip(db))]
    pub async fn membership(
        db: &PgPool,
        user_id: UserId,
        role: Role,
        school_id: Option<SchoolId>,
    ) -> Result<Membership, AppError> {
        let mut groups = HashSet::from([
            NotificationTarget::User(user_id).group(),
            NotificationTarget::Role(role).group(),
        ]);

        let courses = match role {
            Role::Student => {
                sqlx::query_scalar::<_, CourseId>(
                    r#"SELECT e.course_id FROM enrollments e
                       JOIN students s ON s.id = e.student_id
                       WHERE s.user_id = $1 AND e.status = 'active' AND e.is_deleted = FALSE"#,
                )
                .bind(user_id)
                .fetch_all(db)
                .await?
            }
            Role::Teacher => {
                sqlx::query_scalar::<_, CourseId>(
                    r#"SELECT c.id FROM courses c
                       JOIN teachers t ON t.id = c.teacher_id
                       WHERE t.user_id = $1 AND c.is_deleted = FALSE"#,
                )
                .bind(user_id)
                .fetch_all(db)
                .await?
            }
            Role::Admin | Role::SystemAdmin => Vec::new(),
        };
        groups.extend(
            courses
                .into_iter()
                .map(|id| NotificationTarget::Course(id).group()),
        );

        Ok(Membership { school_id, groups })
    }
}
