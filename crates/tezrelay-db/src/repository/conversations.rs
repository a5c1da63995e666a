//! Conversation repository — DMs, groups, membership, and read cursors.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tezrelay_common::models::conversation::{dm_key, Conversation, ConversationMember};

/// Find-or-create a DM over an unordered user pair.
///
/// The sorted `dm_key` carries a unique index, so two racing creations for
/// the same pair converge on one row; the loser of the insert race reads the
/// winner's conversation back. Returns the conversation and whether this call
/// created it.
pub async fn find_or_create_dm(
    pool: &PgPool,
    id: Uuid,
    creator: Uuid,
    other: Uuid,
) -> Result<(Conversation, bool), sqlx::Error> {
    let key = dm_key(creator, other);
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (id, conversation_type, name, created_by, dm_key, created_at, updated_at)
        VALUES ($1, 'dm', NULL, $2, $3, NOW(), NOW())
        ON CONFLICT (dm_key) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(creator)
    .bind(&key)
    .fetch_optional(&mut *tx)
    .await?;

    let (conversation, created) = match inserted {
        Some(conv) => {
            for user in [creator, other] {
                sqlx::query(
                    "INSERT INTO conversation_members (conversation_id, user_id, joined_at) \
                     VALUES ($1, $2, NOW())",
                )
                .bind(conv.id)
                .bind(user)
                .execute(&mut *tx)
                .await?;
            }
            (conv, true)
        }
        None => {
            let conv = sqlx::query_as::<_, Conversation>(
                "SELECT * FROM conversations WHERE dm_key = $1",
            )
            .bind(&key)
            .fetch_one(&mut *tx)
            .await?;
            (conv, false)
        }
    };

    tx.commit().await?;
    Ok((conversation, created))
}

/// Create a group conversation with its members (creator included) atomically.
pub async fn create_group(
    pool: &PgPool,
    id: Uuid,
    creator: Uuid,
    name: &str,
    member_ids: &[Uuid],
) -> Result<Conversation, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let conversation = sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (id, conversation_type, name, created_by, dm_key, created_at, updated_at)
        VALUES ($1, 'group', $2, $3, NULL, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(creator)
    .fetch_one(&mut *tx)
    .await?;

    let mut all = member_ids.to_vec();
    if !all.contains(&creator) {
        all.push(creator);
    }
    for user in all {
        sqlx::query(
            "INSERT INTO conversation_members (conversation_id, user_id, joined_at) \
             VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(conversation)
}

/// Find a conversation by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Whether a user is a member of a conversation.
pub async fn is_member(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM conversation_members WHERE conversation_id = $1 AND user_id = $2)",
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Full membership rows for a conversation.
pub async fn members(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Vec<ConversationMember>, sqlx::Error> {
    sqlx::query_as::<_, ConversationMember>(
        "SELECT * FROM conversation_members WHERE conversation_id = $1 ORDER BY joined_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await
}

/// Member user ids only.
pub async fn member_ids(pool: &PgPool, conversation_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT user_id FROM conversation_members WHERE conversation_id = $1",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(u,)| u).collect())
}

/// Conversations the user belongs to, most recently updated first.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT c.* FROM conversations c
        JOIN conversation_members cm ON cm.conversation_id = c.id
        WHERE cm.user_id = $1
        ORDER BY c.updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// The newest message of a conversation, for list annotations.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: Uuid,
    pub surface_text: String,
    pub created_at: DateTime<Utc>,
    pub sender_user_id: Uuid,
}

pub async fn last_message(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Option<LastMessage>, sqlx::Error> {
    sqlx::query_as::<_, LastMessage>(
        r#"
        SELECT id, surface_text, created_at, sender_user_id FROM tez
        WHERE conversation_id = $1 AND status = 'active'
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(conversation_id)
    .fetch_optional(pool)
    .await
}

/// Messages newer than the member's read cursor, not authored by them. A null
/// cursor counts everything from others.
pub async fn unread_count(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM tez t
        JOIN conversation_members cm
          ON cm.conversation_id = t.conversation_id AND cm.user_id = $2
        WHERE t.conversation_id = $1
          AND t.status = 'active'
          AND t.sender_user_id <> $2
          AND (cm.last_read_at IS NULL OR t.created_at > cm.last_read_at)
        "#,
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Total unread across every conversation the user belongs to.
pub async fn unread_total(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM tez t
        JOIN conversation_members cm
          ON cm.conversation_id = t.conversation_id AND cm.user_id = $1
        WHERE t.status = 'active'
          AND t.sender_user_id <> $1
          AND (cm.last_read_at IS NULL OR t.created_at > cm.last_read_at)
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Advance the member's read cursor to now.
pub async fn mark_read(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE conversation_members SET last_read_at = NOW() \
         WHERE conversation_id = $1 AND user_id = $2",
    )
    .bind(conversation_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Bump `updated_at` so the conversation sorts to the top of listings.
pub async fn touch(pool: &PgPool, conversation_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
        .bind(conversation_id)
        .execute(pool)
        .await?;
    Ok(())
}
