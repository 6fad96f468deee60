use anyhow::anyhow;
use axum::http::HeaderMap;
use schoolhub_core::{AppError, PaginationParams};
use schoolhub_db::PgPool;
use schoolhub_models::ids::{AuditLogId, SchoolId};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::utils::auth_helpers::client_ip;

use super::model::{AuditAction, AuditLog, AuditLogFilterParams, NewAuditEntry, PaginatedAuditLogs};

const AUDIT_COLUMNS: &str = "id, school_id, actor_id, action, entity_type, entity_id, \
     old_values, new_values, ip_address, created_at";

const AUDIT_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR school_id = $1)
      AND ($2::text IS NULL OR entity_type = $2)
      AND ($3::uuid IS NULL OR entity_id = $3)
      AND ($4::uuid IS NULL OR actor_id = $4)
      AND ($5::text IS NULL OR action = $5)
      AND ($6::timestamptz IS NULL OR created_at >= $6)
      AND ($7::timestamptz IS NULL OR created_at <= $7)
"#;

pub struct AuditService;

impl AuditService {
    /// Entry attributed to the caller, with their address.
    pub fn entry(
        auth: &AuthUser,
        headers: &HeaderMap,
        action: AuditAction,
        entity_type: &'static str,
        entity_id: impl Into<Uuid>,
    ) -> NewAuditEntry {
        let entry = NewAuditEntry::new(action, entity_type, Some(entity_id.into()))
            .ip(client_ip(headers));
        match auth.user_id() {
            Ok(user_id) => entry.actor(user_id, auth.school_id()),
            Err(_) => entry,
        }
    }

    /// Persists an entry. Failures are logged and never reach the caller.
    #[instrument(skip(db, entry), fields(action = entry.action.as_str(), entity_type = entry.entity_type))]
    pub async fn record(db: &PgPool, entry: NewAuditEntry) {
        let result = sqlx::query(
            r#"INSERT INTO audit_logs
                 (school_id, actor_id, action, entity_type, entity_id, old_values, new_values, ip_address)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(entry.school_id)
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(&entry.ip_address)
        .execute(db)
        .await;

        if let Err(e) = result {
            warn!(error = %e, entity_id = ?entry.entity_id, "Failed to write audit log");
        }
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: AuditLogFilterParams,
    ) -> Result<PaginatedAuditLogs, AppError> {
        let pagination: &PaginationParams = &filters.pagination;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM audit_logs {AUDIT_FILTER}"
        ))
        .bind(scope)
        .bind(&filters.entity_type)
        .bind(filters.entity_id)
        .bind(filters.actor_id)
        .bind(&filters.action)
        .bind(filters.from)
        .bind(filters.to)
        .fetch_one(db)
        .await?;

        let logs = sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs {AUDIT_FILTER} \
             ORDER BY created_at DESC LIMIT $8 OFFSET $9"
        ))
        .bind(scope)
        .bind(&filters.entity_type)
        .bind(filters.entity_id)
        .bind(filters.actor_id)
        .bind(&filters.action)
        .bind(filters.from)
        .bind(filters.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedAuditLogs::new(logs, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: AuditLogId,
    ) -> Result<AuditLog, AppError> {
        sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs \
             WHERE id = $1 AND ($2::uuid IS NULL OR school_id = $2)"
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Audit log not found")))
    }
}
