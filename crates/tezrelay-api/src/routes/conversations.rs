//! Conversation routes — DMs, groups, messages, and read cursors.
//!
//! POST /conversations               — Create a DM (find-or-create) or group
//! GET  /conversations               — List with lastMessage + unreadCount
//! POST /conversations/:id/messages  — Send a tez into the conversation
//! GET  /conversations/:id/messages  — List messages, newest first
//! POST /conversations/:id/read      — Advance the caller's read cursor

use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use tezrelay_common::error::{RelayError, RelayResult};
use tezrelay_common::models::conversation::{Conversation, ConversationMember, ConversationType};
use tezrelay_common::models::tez::{Tez, TezType, Urgency, Visibility};
use tezrelay_db::repository::{conversations, tez as tez_repo};

use crate::middleware::AuthContext;
use crate::response::{created, ok, ok_with_meta, Envelope};
use crate::routes::tez::{admit_share, page_limit, ContextItemRequest};
use crate::{acl, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversations", get(list).post(create))
        .route("/conversations/{conversation_id}/messages", get(messages).post(send_message))
        .route("/conversations/{conversation_id}/read", post(mark_read))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

// ─── Create / list ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationRequest {
    #[serde(rename = "type")]
    conversation_type: ConversationType,
    member_ids: Vec<Uuid>,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationDetail {
    #[serde(flatten)]
    conversation: Conversation,
    members: Vec<ConversationMember>,
}

/// POST /conversations — a DM takes exactly one other member and is
/// find-or-create over the unordered pair; a group takes a name and at least
/// one other member, with the creator auto-included.
async fn create(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateConversationRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<Envelope<ConversationDetail>>)> {
    let conversation = match body.conversation_type {
        ConversationType::Dm => {
            let others: Vec<Uuid> =
                body.member_ids.iter().copied().filter(|id| *id != auth.user_id).collect();
            if others.len() != 1 {
                return Err(RelayError::Validation {
                    message: "a DM takes exactly one other member".into(),
                });
            }
            let (conversation, _created) = conversations::find_or_create_dm(
                &state.db.pool,
                Uuid::new_v4(),
                auth.user_id,
                others[0],
            )
            .await?;
            conversation
        }
        ConversationType::Group => {
            let name = body
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| RelayError::Validation {
                    message: "a group conversation requires a name".into(),
                })?;
            if body.member_ids.is_empty() {
                return Err(RelayError::Validation {
                    message: "a group conversation requires at least one member".into(),
                });
            }
            conversations::create_group(
                &state.db.pool,
                Uuid::new_v4(),
                auth.user_id,
                name,
                &body.member_ids,
            )
            .await?
        }
    };

    let members = conversations::members(&state.db.pool, conversation.id).await?;
    Ok(created(ConversationDetail { conversation, members }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationListItem {
    #[serde(flatten)]
    conversation: Conversation,
    last_message: Option<conversations::LastMessage>,
    unread_count: i64,
}

/// GET /conversations — the caller's conversations, annotated with the last
/// message and the unread count relative to their read cursor.
async fn list(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RelayResult<Json<Envelope<Vec<ConversationListItem>>>> {
    let rows = conversations::list_for_user(&state.db.pool, auth.user_id).await?;

    let mut items = Vec::with_capacity(rows.len());
    for conversation in rows {
        let last_message = conversations::last_message(&state.db.pool, conversation.id).await?;
        let unread_count =
            conversations::unread_count(&state.db.pool, conversation.id, auth.user_id).await?;
        items.push(ConversationListItem { conversation, last_message, unread_count });
    }

    Ok(ok(items))
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    surface_text: String,
    #[serde(rename = "type")]
    tez_type: Option<TezType>,
    urgency: Option<Urgency>,
    action_requested: Option<String>,
    #[serde(default)]
    context: Vec<ContextItemRequest>,
}

/// POST /conversations/:id/messages — a share scoped to the conversation,
/// addressed to every other member. Federation partitioning applies the same
/// as on `/tez/share`.
async fn send_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<Envelope<Tez>>)> {
    conversations::find_by_id(&state.db.pool, conversation_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Conversation".into() })?;
    acl::require_conversation_member(&state.db.pool, conversation_id, auth.user_id).await?;

    let recipients: Vec<String> = conversations::member_ids(&state.db.pool, conversation_id)
        .await?
        .into_iter()
        .filter(|id| *id != auth.user_id)
        .map(|id| id.to_string())
        .collect();

    let tez = admit_share(
        &state,
        auth.user_id,
        None,
        Some(conversation_id),
        None,
        body.surface_text,
        body.tez_type.unwrap_or(TezType::Note),
        body.urgency.unwrap_or(Urgency::Normal),
        body.action_requested,
        Visibility::Dm,
        &recipients,
        body.context,
    )
    .await?;

    conversations::touch(&state.db.pool, conversation_id).await?;

    Ok(created(tez))
}

#[derive(Debug, Deserialize)]
struct MessagesParams {
    limit: Option<i64>,
    before: Option<DateTime<Utc>>,
}

/// GET /conversations/:id/messages — newest first, same cursor contract as
/// the team stream.
async fn messages(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<MessagesParams>,
) -> RelayResult<Json<Envelope<Vec<Tez>>>> {
    conversations::find_by_id(&state.db.pool, conversation_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Conversation".into() })?;
    acl::require_conversation_member(&state.db.pool, conversation_id, auth.user_id).await?;

    let limit = page_limit(params.limit)?;
    let mut rows =
        tez_repo::conversation_messages(&state.db.pool, conversation_id, limit + 1, params.before)
            .await?;
    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);

    Ok(ok_with_meta(rows, json!({ "hasMore": has_more })))
}

/// POST /conversations/:id/read — set the caller's read cursor to now.
async fn mark_read(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> RelayResult<Json<Envelope<serde_json::Value>>> {
    conversations::find_by_id(&state.db.pool, conversation_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Conversation".into() })?;
    acl::require_conversation_member(&state.db.pool, conversation_id, auth.user_id).await?;

    conversations::mark_read(&state.db.pool, conversation_id, auth.user_id).await?;
    Ok(ok(json!({ "read": true })))
}
