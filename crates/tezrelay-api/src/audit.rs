//! Audit sink — best-effort journal writes for non-admission operations.
//!
//! Admission paths (share, reply, inbound ingestion) write their journal
//! entry inside the admission transaction. Everything else — reads, team and
//! contact mutations, trust changes — records through this sink: a failed
//! journal write is logged and never fails the caller's operation.

use sqlx::PgPool;
use uuid::Uuid;

use tezrelay_common::models::audit::AuditAction;
use tezrelay_db::repository::audit::{self, NewAuditEntry};

#[derive(Clone)]
pub struct AuditSink {
    pool: PgPool,
}

impl AuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry, logging (not propagating) failures.
    pub async fn record(
        &self,
        team_id: Option<Uuid>,
        actor_user_id: Uuid,
        action: AuditAction,
        target_type: &'static str,
        target_id: String,
        metadata: serde_json::Value,
    ) {
        let entry = NewAuditEntry {
            team_id,
            actor_user_id,
            action,
            target_type,
            target_id,
            metadata,
        };
        if let Err(e) = audit::record(&self.pool, entry).await {
            tracing::warn!(action = %action, "audit journal write failed: {e}");
        }
    }
}
