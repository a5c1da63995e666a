//! Tez repository — admission, lookups, threads, and stream pagination.
//!
//! Admission is the one write path for tez rows. Whether the message arrives
//! from a local share, a reply, or a peer's bundle, the tez, its context
//! layers, its local recipient rows, any outbound queue entries, and the
//! journal entry land in a single transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tezrelay_common::models::tez::{
    ContextLayer, ContextSource, Tez, TezContext, TezRecipient, TezType, Urgency, Visibility,
};

/// A tez row to be inserted.
#[derive(Debug, Clone)]
pub struct NewTez {
    pub id: Uuid,
    pub team_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    /// Equal to `id` for roots; the parent's thread id for replies.
    pub thread_id: Uuid,
    pub parent_tez_id: Option<Uuid>,
    pub surface_text: String,
    pub tez_type: TezType,
    pub urgency: Urgency,
    pub action_requested: Option<String>,
    pub sender_user_id: Uuid,
    pub visibility: Visibility,
    /// Preserved from the bundle on federated ingestion; `None` stamps NOW().
    pub created_at: Option<DateTime<Utc>>,
}

/// A context layer to be inserted alongside its tez.
#[derive(Debug, Clone)]
pub struct NewContext {
    pub layer: ContextLayer,
    pub content: String,
    pub mime_type: Option<String>,
    pub confidence: Option<i32>,
    pub source: Option<ContextSource>,
    pub derived_from: Option<String>,
    pub created_by: String,
}

/// Journal entry written inside the admission transaction.
#[derive(Debug, Clone)]
pub struct AdmissionAudit {
    pub team_id: Option<Uuid>,
    pub actor_user_id: Uuid,
    /// Dotted action name (`tez.shared`, `tez.replied`, `tez.received`).
    pub action: &'static str,
    pub metadata: serde_json::Value,
}

/// Admit a tez: insert the row, its context layers (order preserved), one
/// recipient row per local user (`delivered_at = NOW()`), one outbound
/// delivery per remote host, and the journal entry — all in one transaction.
pub async fn admit(
    pool: &PgPool,
    tez: NewTez,
    context: &[NewContext],
    local_recipients: &[Uuid],
    outbound: &[(String, String)],
    audit: AdmissionAudit,
) -> Result<Tez, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, Tez>(
        r#"
        INSERT INTO tez (
            id, team_id, conversation_id, thread_id, parent_tez_id,
            surface_text, tez_type, urgency, action_requested,
            sender_user_id, visibility, status, created_at, updated_at
        )
        VALUES (
            $1, $2, $3, $4, $5,
            $6, $7, $8, $9,
            $10, $11, 'active', COALESCE($12, NOW()), NOW()
        )
        RETURNING *
        "#,
    )
    .bind(tez.id)
    .bind(tez.team_id)
    .bind(tez.conversation_id)
    .bind(tez.thread_id)
    .bind(tez.parent_tez_id)
    .bind(&tez.surface_text)
    .bind(tez.tez_type)
    .bind(tez.urgency)
    .bind(&tez.action_requested)
    .bind(tez.sender_user_id)
    .bind(tez.visibility)
    .bind(tez.created_at)
    .fetch_one(&mut *tx)
    .await?;

    for (position, layer) in context.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO tez_context (
                id, tez_id, layer, content, mime_type, confidence,
                source, derived_from, created_by, position, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tez.id)
        .bind(layer.layer)
        .bind(&layer.content)
        .bind(&layer.mime_type)
        .bind(layer.confidence)
        .bind(layer.source)
        .bind(&layer.derived_from)
        .bind(&layer.created_by)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    for user_id in local_recipients {
        sqlx::query(
            "INSERT INTO tez_recipients (tez_id, user_id, delivered_at) \
             VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING",
        )
        .bind(tez.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    for (target_host, bundle) in outbound {
        sqlx::query(
            "INSERT INTO outbound_deliveries (id, target_host, bundle, status, attempts, next_attempt_at, created_at) \
             VALUES ($1, $2, $3, 'queued', 0, NOW(), NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(target_host)
        .bind(bundle)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "INSERT INTO audit_entries (id, team_id, actor_user_id, action, target_type, target_id, metadata, created_at) \
         VALUES ($1, $2, $3, $4, 'tez', $5, $6, NOW())",
    )
    .bind(Uuid::new_v4())
    .bind(audit.team_id)
    .bind(audit.actor_user_id)
    .bind(audit.action)
    .bind(tez.id.to_string())
    .bind(&audit.metadata)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// Find a tez by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Tez>, sqlx::Error> {
    sqlx::query_as::<_, Tez>("SELECT * FROM tez WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Context layers of a tez, in insertion order.
pub async fn context_for(pool: &PgPool, tez_id: Uuid) -> Result<Vec<TezContext>, sqlx::Error> {
    sqlx::query_as::<_, TezContext>(
        "SELECT * FROM tez_context WHERE tez_id = $1 ORDER BY position ASC",
    )
    .bind(tez_id)
    .fetch_all(pool)
    .await
}

/// Whether a user is on the delivery roster of a tez.
pub async fn is_recipient(pool: &PgPool, tez_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM tez_recipients WHERE tez_id = $1 AND user_id = $2)",
    )
    .bind(tez_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Recipient roster of a tez.
pub async fn recipients_for(pool: &PgPool, tez_id: Uuid) -> Result<Vec<TezRecipient>, sqlx::Error> {
    sqlx::query_as::<_, TezRecipient>(
        "SELECT * FROM tez_recipients WHERE tez_id = $1 ORDER BY delivered_at ASC, user_id ASC",
    )
    .bind(tez_id)
    .fetch_all(pool)
    .await
}

/// All tez of a thread, ascending by creation time with id tiebreak — the
/// stable order admission races can only perturb at equal timestamps.
pub async fn thread(pool: &PgPool, thread_id: Uuid) -> Result<Vec<Tez>, sqlx::Error> {
    sqlx::query_as::<_, Tez>(
        "SELECT * FROM tez WHERE thread_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(thread_id)
    .fetch_all(pool)
    .await
}

/// Active tez of a team, newest first, cursored on `created_at`.
///
/// Callers pass `limit + 1` and pop the sentinel row to compute `hasMore`.
pub async fn stream_team(
    pool: &PgPool,
    team_id: Uuid,
    limit: i64,
    before: Option<DateTime<Utc>>,
) -> Result<Vec<Tez>, sqlx::Error> {
    if let Some(before) = before {
        sqlx::query_as::<_, Tez>(
            r#"
            SELECT * FROM tez
            WHERE team_id = $1 AND status = 'active' AND created_at < $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(team_id)
        .bind(before)
        .bind(limit)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, Tez>(
            r#"
            SELECT * FROM tez
            WHERE team_id = $1 AND status = 'active'
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

/// Active messages of a conversation, newest first, same cursor contract as
/// [`stream_team`].
pub async fn conversation_messages(
    pool: &PgPool,
    conversation_id: Uuid,
    limit: i64,
    before: Option<DateTime<Utc>>,
) -> Result<Vec<Tez>, sqlx::Error> {
    if let Some(before) = before {
        sqlx::query_as::<_, Tez>(
            r#"
            SELECT * FROM tez
            WHERE conversation_id = $1 AND status = 'active' AND created_at < $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(before)
        .bind(limit)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, Tez>(
            r#"
            SELECT * FROM tez
            WHERE conversation_id = $1 AND status = 'active'
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

/// Mark a recipient row read (if not already) and acknowledged.
pub async fn acknowledge(
    pool: &PgPool,
    tez_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TezRecipient>, sqlx::Error> {
    sqlx::query_as::<_, TezRecipient>(
        r#"
        UPDATE tez_recipients
        SET read_at = COALESCE(read_at, NOW()), acknowledged_at = NOW()
        WHERE tez_id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(tez_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Advance a recipient's read marker, leaving the ack timestamp alone.
pub async fn mark_recipient_read(
    pool: &PgPool,
    tez_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tez_recipients SET read_at = COALESCE(read_at, NOW()) \
         WHERE tez_id = $1 AND user_id = $2",
    )
    .bind(tez_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}
