//! Tez routes — share, stream, reply, read, thread, acknowledge.
//!
//! POST /tez/share       — Share a tez into a team, a conversation, or privately
//! GET  /tez/stream      — Team stream, newest first (teamId required)
//! POST /tez/:id/reply   — Reply within the parent's scope and thread
//! GET  /tez/:id         — Tez with context layers and recipient roster
//! GET  /tez/:id/thread  — Every tez of the thread, oldest first
//! POST /tez/:id/ack     — Recipient acknowledges delivery

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

use tezrelay_common::address::tez_address;
use tezrelay_common::error::{RelayError, RelayResult};
use tezrelay_common::models::audit::AuditAction;
use tezrelay_common::models::tez::{
    ContextLayer, ContextSource, Tez, TezContext, TezRecipient, TezType, Urgency, Visibility,
};
use tezrelay_common::validation::{validate_count, validate_surface_text};
use tezrelay_db::repository::tez as tez_repo;
use tezrelay_federation::bundle::{Bundle, BundleContext, BundleTez};
use tezrelay_federation::routing::partition_recipients;

use crate::middleware::AuthContext;
use crate::response::{created, ok, ok_with_meta, Envelope};
use crate::{acl, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tez/share", post(share))
        .route("/tez/stream", get(stream))
        .route("/tez/{tez_id}", get(get_tez))
        .route("/tez/{tez_id}/reply", post(reply))
        .route("/tez/{tez_id}/thread", get(thread))
        .route("/tez/{tez_id}/ack", post(acknowledge))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

// ─── Request / response shapes ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContextItemRequest {
    pub layer: ContextLayer,
    pub content: String,
    pub mime_type: Option<String>,
    pub confidence: Option<i32>,
    pub source: Option<ContextSource>,
    pub derived_from: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareRequest {
    team_id: Option<Uuid>,
    conversation_id: Option<Uuid>,
    surface_text: String,
    #[serde(rename = "type")]
    tez_type: Option<TezType>,
    urgency: Option<Urgency>,
    action_requested: Option<String>,
    visibility: Option<Visibility>,
    #[serde(default)]
    recipients: Vec<String>,
    #[serde(default)]
    context: Vec<ContextItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest {
    surface_text: String,
    #[serde(rename = "type")]
    tez_type: Option<TezType>,
    urgency: Option<Urgency>,
    action_requested: Option<String>,
    #[serde(default)]
    recipients: Vec<String>,
    #[serde(default)]
    context: Vec<ContextItemRequest>,
}

/// A tez with its attached layers and delivery roster, as returned by
/// `GET /tez/:id`.
#[derive(Debug, Serialize)]
pub(crate) struct TezDetail {
    #[serde(flatten)]
    pub tez: Tez,
    pub context: Vec<TezContext>,
    pub recipients: Vec<TezRecipient>,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// POST /tez/share
async fn share(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ShareRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<Envelope<Tez>>)> {
    if body.team_id.is_some() && body.conversation_id.is_some() {
        return Err(RelayError::Validation {
            message: "a tez is scoped to a team or a conversation, not both".into(),
        });
    }

    // ACL first: the actor must belong to the target scope.
    if let Some(team_id) = body.team_id {
        acl::require_team_member(&state.db.pool, team_id, auth.user_id).await?;
    }
    if let Some(conversation_id) = body.conversation_id {
        acl::require_conversation_member(&state.db.pool, conversation_id, auth.user_id).await?;
    }

    let visibility = body.visibility.unwrap_or(match (body.team_id, body.conversation_id) {
        (Some(_), _) => Visibility::Team,
        (_, Some(_)) => Visibility::Dm,
        _ => Visibility::Private,
    });

    let tez = admit_share(
        &state,
        auth.user_id,
        body.team_id,
        body.conversation_id,
        None,
        body.surface_text,
        body.tez_type.unwrap_or(TezType::Note),
        body.urgency.unwrap_or(Urgency::Normal),
        body.action_requested,
        visibility,
        &body.recipients,
        body.context,
    )
    .await?;

    Ok(created(tez))
}

/// POST /tez/:id/reply — the reply inherits scope, visibility, and thread
/// from its parent.
async fn reply(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(parent_id): Path<Uuid>,
    Json(body): Json<ReplyRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<Envelope<Tez>>)> {
    let parent = tez_repo::find_by_id(&state.db.pool, parent_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Tez".into() })?;

    acl::may_access_tez(&state.db.pool, auth.user_id, &parent).await?;

    let tez = admit_share(
        &state,
        auth.user_id,
        parent.team_id,
        parent.conversation_id,
        Some(&parent),
        body.surface_text,
        body.tez_type.unwrap_or(TezType::Note),
        body.urgency.unwrap_or(Urgency::Normal),
        body.action_requested,
        parent.visibility,
        &body.recipients,
        body.context,
    )
    .await?;

    Ok(created(tez))
}

/// GET /tez/:id — tez + ordered context + recipient roster. Reads by anyone
/// other than the sender land in the journal.
async fn get_tez(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(tez_id): Path<Uuid>,
) -> RelayResult<Json<Envelope<TezDetail>>> {
    let tez = tez_repo::find_by_id(&state.db.pool, tez_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Tez".into() })?;

    acl::may_access_tez(&state.db.pool, auth.user_id, &tez).await?;

    let context = tez_repo::context_for(&state.db.pool, tez_id).await?;
    let recipients = tez_repo::recipients_for(&state.db.pool, tez_id).await?;

    // Advance the reader's delivery cursor if they are on the roster.
    if recipients.iter().any(|r| r.user_id == auth.user_id) {
        tez_repo::mark_recipient_read(&state.db.pool, tez_id, auth.user_id).await?;
    }

    // Sender self-reads are not journaled to keep the read log actionable.
    if auth.user_id != tez.sender_user_id {
        state
            .audit
            .record(
                tez.team_id,
                auth.user_id,
                AuditAction::TezRead,
                "tez",
                tez_id.to_string(),
                json!({ "threadId": tez.thread_id }),
            )
            .await;
    }

    Ok(ok(TezDetail { tez, context, recipients }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreadResponse {
    thread_id: Uuid,
    root_tez_id: Uuid,
    message_count: usize,
    messages: Vec<Tez>,
}

/// GET /tez/:id/thread — the whole thread, ascending. One ACL check suffices:
/// every member of a thread shares the root's scope by construction.
async fn thread(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(tez_id): Path<Uuid>,
) -> RelayResult<Json<Envelope<ThreadResponse>>> {
    let tez = tez_repo::find_by_id(&state.db.pool, tez_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Tez".into() })?;

    acl::may_access_tez(&state.db.pool, auth.user_id, &tez).await?;

    let messages = tez_repo::thread(&state.db.pool, tez.thread_id).await?;
    Ok(ok(ThreadResponse {
        thread_id: tez.thread_id,
        root_tez_id: tez.thread_id,
        message_count: messages.len(),
        messages,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamParams {
    team_id: Option<Uuid>,
    limit: Option<i64>,
    before: Option<DateTime<Utc>>,
}

/// GET /tez/stream?teamId=&limit=&before= — team stream, newest first.
async fn stream(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> RelayResult<Json<Envelope<Vec<Tez>>>> {
    let team_id = params.team_id.ok_or(RelayError::MissingTeam)?;
    acl::require_team_member(&state.db.pool, team_id, auth.user_id).await?;

    let limit = page_limit(params.limit)?;
    let mut rows = tez_repo::stream_team(&state.db.pool, team_id, limit + 1, params.before).await?;
    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);

    Ok(ok_with_meta(rows, json!({ "hasMore": has_more })))
}

/// POST /tez/:id/ack — a recipient marks their delivery read + acknowledged.
async fn acknowledge(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(tez_id): Path<Uuid>,
) -> RelayResult<Json<Envelope<TezRecipient>>> {
    let tez = tez_repo::find_by_id(&state.db.pool, tez_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Tez".into() })?;

    acl::may_access_tez(&state.db.pool, auth.user_id, &tez).await?;

    let recipient = tez_repo::acknowledge(&state.db.pool, tez_id, auth.user_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Delivery".into() })?;

    state
        .audit
        .record(
            tez.team_id,
            auth.user_id,
            AuditAction::TezAcknowledged,
            "tez",
            tez_id.to_string(),
            json!({ "threadId": tez.thread_id }),
        )
        .await;

    Ok(ok(recipient))
}

// ─── Shared admission path ───────────────────────────────────────────────────

/// Validate, partition, bundle, and admit one tez. Used by `/tez/share`,
/// `/tez/:id/reply`, and conversation message sends — ACL is the caller's
/// responsibility, everything past the predicate happens here in one
/// transaction.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn admit_share(
    state: &AppState,
    actor: Uuid,
    team_id: Option<Uuid>,
    conversation_id: Option<Uuid>,
    parent: Option<&Tez>,
    surface_text: String,
    tez_type: TezType,
    urgency: Urgency,
    action_requested: Option<String>,
    visibility: Visibility,
    recipients: &[String],
    context: Vec<ContextItemRequest>,
) -> RelayResult<Tez> {
    let config = tezrelay_common::config::get();

    validate_surface_text(&surface_text, config.limits.max_tez_size_bytes)?;
    validate_count("context items", context.len(), config.limits.max_context_items)?;
    validate_count("recipients", recipients.len(), config.limits.max_recipients)?;
    for item in &context {
        if let Some(confidence) = item.confidence {
            if !(0..=100).contains(&confidence) {
                return Err(RelayError::Validation {
                    message: "confidence must be between 0 and 100".into(),
                });
            }
        }
    }

    let split = partition_recipients(recipients, &state.identity.host)?;

    let id = Uuid::new_v4();
    let new_tez = tez_repo::NewTez {
        id,
        team_id,
        conversation_id,
        thread_id: parent.map(|p| p.thread_id).unwrap_or(id),
        parent_tez_id: parent.map(|p| p.id),
        surface_text,
        tez_type,
        urgency,
        action_requested,
        sender_user_id: actor,
        visibility,
        created_at: None,
    };

    let new_context: Vec<tez_repo::NewContext> = context
        .iter()
        .map(|c| tez_repo::NewContext {
            layer: c.layer,
            content: c.content.clone(),
            mime_type: c.mime_type.clone(),
            confidence: c.confidence,
            source: c.source,
            derived_from: c.derived_from.clone(),
            created_by: actor.to_string(),
        })
        .collect();

    // One bundle per remote host, carrying only that host's recipient slice.
    let mut outbound = Vec::with_capacity(split.remote.len());
    let from = tez_address(actor, &state.identity.host);
    for (host, addresses) in &split.remote {
        let bundle = Bundle::build(
            &state.identity.host,
            BundleTez {
                id,
                thread_id: new_tez.thread_id,
                parent_tez_id: new_tez.parent_tez_id,
                surface_text: new_tez.surface_text.clone(),
                tez_type,
                urgency,
                action_requested: new_tez.action_requested.clone(),
                visibility,
                created_at: Utc::now(),
            },
            context
                .iter()
                .map(|c| BundleContext {
                    layer: c.layer,
                    content: c.content.clone(),
                    mime_type: c.mime_type.clone(),
                    confidence: c.confidence,
                    source: c.source,
                    derived_from: c.derived_from.clone(),
                })
                .collect(),
            from.clone(),
            addresses.clone(),
        )
        .map_err(RelayError::from)?;
        outbound.push((host.clone(), bundle.canonical_string().map_err(RelayError::from)?));
    }

    let (action, metadata) = match parent {
        Some(p) => (
            "tez.replied",
            json!({
                "parentTezId": p.id,
                "threadId": p.thread_id,
                "remoteHosts": split.remote.keys().collect::<Vec<_>>(),
            }),
        ),
        None => (
            "tez.shared",
            json!({
                "threadId": id,
                "localRecipients": split.local.len(),
                "remoteHosts": split.remote.keys().collect::<Vec<_>>(),
            }),
        ),
    };

    let audit = tez_repo::AdmissionAudit { team_id, actor_user_id: actor, action, metadata };

    let tez = tez_repo::admit(&state.db.pool, new_tez, &new_context, &split.local, &outbound, audit)
        .await?;

    Ok(tez)
}

/// Validate a page limit against configuration: default when absent, rejected
/// when above the hard cap.
pub(crate) fn page_limit(requested: Option<i64>) -> RelayResult<i64> {
    let config = tezrelay_common::config::get();
    match requested {
        None => Ok(config.limits.default_page_size),
        Some(limit) if limit < 1 => {
            Err(RelayError::Validation { message: "limit must be positive".into() })
        }
        Some(limit) if limit > config.limits.max_page_size => Err(RelayError::Validation {
            message: format!("limit cannot exceed {}", config.limits.max_page_size),
        }),
        Some(limit) => Ok(limit),
    }
}
