use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::QueryRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::Response,
};
use schoolhub_auth::verify_token;
use schoolhub_core::AppError;
use schoolhub_models::MessageResponse;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::{NotificationId, SchoolId};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::middleware::auth::{AuthUser, RequireNotificationsSend};
use crate::modules::audit_logs::AuditService;
use crate::modules::courses::CourseService;
use crate::state::AppState;
use crate::utils::auth_helpers::{ensure_course_staff, resource_scope, scoped_school_id};
use crate::validator::ValidatedJson;

use super::hub::{Membership, NotificationHub};
use super::model::{
    Notification, NotificationFilterParams, NotificationTarget, PaginatedNotifications,
    SendNotificationDto, SendNotificationResponse, UnreadCountResponse,
};
use super::service::NotificationService;

#[derive(Debug, Deserialize)]
pub struct SendQuery {
    pub school_id: Option<SchoolId>,
}

/// Teachers may message their own courses and individual users only.
pub async fn send_notification(
    State(state): State<AppState>,
    RequireNotificationsSend(auth_user): RequireNotificationsSend,
    headers: HeaderMap,
    Query(query): Query<SendQuery>,
    ValidatedJson(dto): ValidatedJson<SendNotificationDto>,
) -> Result<(StatusCode, Json<SendNotificationResponse>), AppError> {
    let school_id = scoped_school_id(&auth_user, query.school_id)?;

    if auth_user.is_teacher() {
        match dto.target {
            NotificationTarget::Role(_) => {
                return Err(AppError::forbidden("Teachers cannot broadcast to a role"));
            }
            NotificationTarget::Course(course_id) => {
                let scope = resource_scope(&auth_user)?;
                let course = CourseService::get(&state.db, state.cache(), scope, course_id).await?;
                ensure_course_staff(&state.db, &auth_user, course.teacher_id).await?;
            }
            NotificationTarget::User(_) => {}
        }
    }

    let target = dto.target;
    let response = NotificationService::send(&state.db, &state.hub, school_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(
            &auth_user,
            &headers,
            AuditAction::Create,
            "notification",
            school_id,
        )
        .new_values(&serde_json::json!({
            "target": target,
            "recipients": response.recipients,
        })),
    )
    .await;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_my_notifications(
    State(state): State<AppState>,
    auth_user: AuthUser,
    filters: Result<Query<NotificationFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedNotifications>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let notifications =
        NotificationService::list_for_user(&state.db, auth_user.user_id()?, filters).await?;
    Ok(Json(notifications))
}

pub async fn get_unread_count(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = NotificationService::unread_count(&state.db, auth_user.user_id()?).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<Json<Notification>, AppError> {
    let notification = NotificationService::mark_read(&state.db, auth_user.user_id()?, id).await?;
    Ok(Json(notification))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    let updated = NotificationService::mark_all_read(&state.db, auth_user.user_id()?).await?;
    Ok(Json(MessageResponse::new(format!(
        "{updated} notifications marked as read"
    ))))
}

#[derive(Debug, Deserialize)]
pub struct HubQuery {
    pub access_token: Option<String>,
}

/// WebSocket entry point. Browsers cannot set headers on the upgrade
/// request, so the JWT travels in `access_token`.
pub async fn notification_hub_handler(
    State(state): State<AppState>,
    Query(query): Query<HubQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = query
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing access token"))?;
    let auth_user = AuthUser(verify_token(&token, &state.jwt_config)?);

    let user_id = auth_user.user_id()?;
    let membership = NotificationService::membership(
        &state.db,
        user_id,
        auth_user.role()?,
        auth_user.school_id(),
    )
    .await?;

    info!(user.id = %user_id, groups = membership.groups.len(), "Hub connection accepted");
    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| serve_connection(socket, hub, membership)))
}

async fn serve_connection(mut socket: WebSocket, hub: NotificationHub, membership: Membership) {
    let mut events = hub.subscribe();

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(message) if membership.accepts(&message) => {
                    let payload = match serde_json::to_string(&message.event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode notification event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Hub connection lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Hub connection error");
                    break;
                }
            },
        }
    }

    debug!("Hub connection closed");
}
