//! Admin federation routes — peer trust management and outbox visibility.
//!
//! GET    /admin/federation/servers        — List registered peers
//! POST   /admin/federation/servers        — Discover + register a peer by host
//! PATCH  /admin/federation/servers/:host  — Change a peer's trust level
//! DELETE /admin/federation/servers/:host  — Remove a peer
//! GET    /admin/federation/outbox         — Outbound queue state
//!
//! All of these require the caller to be in the configured admin user set.

use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use tezrelay_common::error::{RelayError, RelayResult};
use tezrelay_common::models::audit::AuditAction;
use tezrelay_common::models::peer::{DeliveryStatus, OutboundDelivery, Peer, TrustLevel};
use tezrelay_db::repository::{outbox, peers};

use crate::middleware::AuthContext;
use crate::response::{ok, Envelope};
use crate::{acl, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/federation/servers", get(list_servers).post(register_server))
        .route(
            "/admin/federation/servers/{host}",
            axum::routing::patch(update_server).delete(remove_server),
        )
        .route("/admin/federation/outbox", get(outbox_state))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// GET /admin/federation/servers
async fn list_servers(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RelayResult<Json<Envelope<Vec<Peer>>>> {
    acl::require_relay_admin(auth.user_id)?;
    let all = peers::list(&state.db.pool).await?;
    Ok(ok(all))
}

#[derive(Debug, Deserialize)]
struct RegisterServerRequest {
    host: String,
}

/// POST /admin/federation/servers — fetch the peer's self-description from
/// `https://<host>/federation/server-info` and register it. In allowlist mode
/// the peer still needs a PATCH to become trusted.
async fn register_server(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterServerRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<Envelope<Peer>>)> {
    acl::require_relay_admin(auth.user_id)?;

    let host = body.host.trim();
    if host.is_empty() {
        return Err(RelayError::Validation { message: "host is required".into() });
    }

    let doc = tezrelay_federation::client::fetch_server_info(host)
        .await
        .map_err(|e| RelayError::Validation {
            message: format!("could not verify '{host}': {e}"),
        })?;

    let config = tezrelay_common::config::get();
    let initial_trust = match config.federation.mode {
        tezrelay_common::config::FederationMode::Allowlist => TrustLevel::Pending,
        tezrelay_common::config::FederationMode::Open => TrustLevel::Trusted,
    };

    let (peer, _created) = peers::upsert(
        &state.db.pool,
        &doc.host,
        &doc.server_id,
        &doc.public_key,
        None,
        initial_trust,
    )
    .await?;

    Ok(crate::response::created(peer))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateServerRequest {
    trust_level: TrustLevel,
}

/// PATCH /admin/federation/servers/:host — apply a trust transition.
///
/// Legal transitions: `pending → trusted|blocked`, `trusted → blocked`,
/// `blocked → trusted` (explicit unblock). Nothing moves back to `pending`.
async fn update_server(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
    Json(body): Json<UpdateServerRequest>,
) -> RelayResult<Json<Envelope<Peer>>> {
    acl::require_relay_admin(auth.user_id)?;

    let current = peers::find_by_host(&state.db.pool, &host)
        .await?
        .ok_or(RelayError::NotFound { resource: "Peer".into() })?;

    let legal = matches!(
        (current.trust_level, body.trust_level),
        (TrustLevel::Pending, TrustLevel::Trusted)
            | (TrustLevel::Pending, TrustLevel::Blocked)
            | (TrustLevel::Trusted, TrustLevel::Blocked)
            | (TrustLevel::Blocked, TrustLevel::Trusted)
    );
    if !legal {
        return Err(RelayError::Validation {
            message: format!(
                "illegal trust transition {:?} -> {:?}",
                current.trust_level, body.trust_level
            ),
        });
    }

    let peer = peers::set_trust(&state.db.pool, &host, body.trust_level)
        .await?
        .ok_or(RelayError::NotFound { resource: "Peer".into() })?;

    let action = match body.trust_level {
        TrustLevel::Trusted => AuditAction::PeerTrusted,
        TrustLevel::Blocked => AuditAction::PeerBlocked,
        TrustLevel::Pending => unreachable!("transition legality forbids -> pending"),
    };
    state
        .audit
        .record(
            None,
            auth.user_id,
            action,
            "peer",
            peer.host.clone(),
            json!({ "serverId": peer.server_id, "from": current.trust_level }),
        )
        .await;

    Ok(ok(peer))
}

/// DELETE /admin/federation/servers/:host
async fn remove_server(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
) -> RelayResult<Json<Envelope<serde_json::Value>>> {
    acl::require_relay_admin(auth.user_id)?;

    if !peers::remove(&state.db.pool, &host).await? {
        return Err(RelayError::NotFound { resource: "Peer".into() });
    }

    state
        .audit
        .record(
            None,
            auth.user_id,
            AuditAction::PeerRemoved,
            "peer",
            host.clone(),
            json!({}),
        )
        .await;

    Ok(ok(json!({ "removed": true })))
}

#[derive(Debug, Deserialize)]
struct OutboxParams {
    status: Option<DeliveryStatus>,
    limit: Option<i64>,
}

#[derive(Debug, serde::Serialize)]
struct OutboxState {
    counts: serde_json::Value,
    deliveries: Vec<OutboundDelivery>,
}

/// GET /admin/federation/outbox — queue depth per status plus recent entries.
async fn outbox_state(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(params): Query<OutboxParams>,
) -> RelayResult<Json<Envelope<OutboxState>>> {
    acl::require_relay_admin(auth.user_id)?;

    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let counts = outbox::status_counts(&state.db.pool).await?;
    let deliveries = outbox::list(&state.db.pool, params.status, limit).await?;

    let mut counts_obj = serde_json::Map::new();
    for (status, count) in counts {
        let key = serde_json::to_value(status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        counts_obj.insert(key, json!(count));
    }

    Ok(ok(OutboxState { counts: counts_obj.into(), deliveries }))
}
