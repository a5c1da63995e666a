//! Audit repository — append-only journal writes.

use sqlx::PgPool;
use uuid::Uuid;

use tezrelay_common::models::audit::AuditAction;

/// A journal entry to append.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub team_id: Option<Uuid>,
    pub actor_user_id: Uuid,
    pub action: AuditAction,
    pub target_type: &'static str,
    pub target_id: String,
    pub metadata: serde_json::Value,
}

/// Append one entry. The journal is insert-only; nothing in the relay ever
/// updates or deletes a row.
pub async fn record(pool: &PgPool, entry: NewAuditEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_entries (id, team_id, actor_user_id, action, target_type, target_id, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())",
    )
    .bind(Uuid::new_v4())
    .bind(entry.team_id)
    .bind(entry.actor_user_id)
    .bind(entry.action.as_str())
    .bind(entry.target_type)
    .bind(entry.target_id)
    .bind(entry.metadata)
    .execute(pool)
    .await?;
    Ok(())
}
