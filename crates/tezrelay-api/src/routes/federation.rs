//! Server-to-server federation routes.
//!
//! These endpoints are called by *peer relays*, not end-user clients.
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | POST | `/federation/inbox`       | HTTP signature (trusted peers only) |
//! | GET  | `/federation/server-info` | none (discovery) |
//! | POST | `/federation/verify`      | none (registers the peer for later trust) |
//!
//! The inbox runs the full admission pipeline in order — signature, trust,
//! bundle integrity, recipient resolution, transactional ingestion — and any
//! failure short-circuits with its specific status before the store is touched.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use tezrelay_common::address::TezAddress;
use tezrelay_common::error::{RelayError, RelayResult};
use tezrelay_common::models::audit::AuditAction;
use tezrelay_common::models::peer::TrustLevel;
use tezrelay_common::models::tez::SYSTEM_CREATED_BY;
use tezrelay_common::config::FederationMode;
use tezrelay_db::repository::{contacts, peers, tez as tez_repo};
use tezrelay_federation::bundle::Bundle;
use tezrelay_federation::identity::derive_server_id;
use tezrelay_federation::signatures::{verify_request, InboundSignature};
use tezrelay_federation::PROTOCOL_VERSION;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/federation/inbox", post(inbox))
        .route("/federation/server-info", get(server_info))
        .route("/federation/verify", post(verify_peer))
}

// ─── Inbox ───────────────────────────────────────────────────────────────────

/// `POST /federation/inbox` — receive one signed bundle from a peer.
async fn inbox(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> RelayResult<Response> {
    let config = tezrelay_common::config::get();
    if !config.federation.enabled {
        return Err(RelayError::Forbidden);
    }

    // 1. Signature. The peer is resolved by keyId first because its public
    //    key is needed to check the signature at all; a keyId with no
    //    registration is handled as a trust failure, like a pending peer.
    let sig = extract_signature(&headers)?;
    let key_id = sig.key_id().map_err(RelayError::from)?;

    let peer = peers::find_by_server_id(&state.db.pool, &key_id)
        .await?
        .ok_or(RelayError::ServerNotTrusted { host: key_id })?;

    verify_request(
        &sig,
        "POST",
        "/federation/inbox",
        &state.identity.host,
        &body,
        &peer.public_key,
    )
    .map_err(RelayError::from)?;

    // 2. Trust.
    match peer.trust_level {
        TrustLevel::Trusted => {}
        TrustLevel::Pending => {
            return Err(RelayError::ServerNotTrusted { host: peer.host })
        }
        TrustLevel::Blocked => return Err(RelayError::ServerBlocked { host: peer.host }),
    }

    // 3. Bundle integrity, over the raw JSON exactly as received.
    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| RelayError::InvalidBundle { reason: "body is not valid JSON".into() })?;
    let bundle = Bundle::validate(&raw).map_err(RelayError::from)?;

    if bundle.sender_server != peer.host {
        return Err(RelayError::InvalidBundle {
            reason: "sender_server does not match the authenticated peer".into(),
        });
    }

    let sender = TezAddress::parse(&bundle.from)
        .and_then(|a| a.local_user_id())
        .ok_or(RelayError::InvalidBundle { reason: "malformed from address".into() })?;

    // 4. Resolve recipients: not-ours are noted and ignored, unregistered
    //    locals are reported back as notFound.
    let mut local_ids: Vec<Uuid> = Vec::new();
    let mut not_found: Vec<String> = Vec::new();
    let mut ignored: Vec<String> = Vec::new();

    for raw_addr in &bundle.to {
        let Some(addr) = TezAddress::parse(raw_addr) else {
            not_found.push(raw_addr.clone());
            continue;
        };
        if !addr.is_local_to(&state.identity.host) {
            ignored.push(raw_addr.clone());
            continue;
        }
        match addr.local_user_id() {
            Some(user_id) if contacts::exists(&state.db.pool, user_id).await? => {
                if !local_ids.contains(&user_id) {
                    local_ids.push(user_id);
                }
            }
            _ => not_found.push(raw_addr.clone()),
        }
    }

    // 5–6. Ingest transactionally, preserving the sender's tez id for
    //      provenance. A re-delivered bundle (pump retry after a lost
    //      response) is acknowledged without re-inserting.
    let already = tez_repo::find_by_id(&state.db.pool, bundle.tez.id).await?;
    if already.is_none() && !local_ids.is_empty() {
        let new_tez = tez_repo::NewTez {
            id: bundle.tez.id,
            team_id: None,
            conversation_id: None,
            thread_id: bundle.tez.thread_id,
            parent_tez_id: bundle.tez.parent_tez_id,
            surface_text: bundle.tez.surface_text.clone(),
            tez_type: bundle.tez.tez_type,
            urgency: bundle.tez.urgency,
            action_requested: bundle.tez.action_requested.clone(),
            sender_user_id: sender,
            visibility: bundle.tez.visibility,
            created_at: Some(bundle.tez.created_at),
        };

        let context: Vec<tez_repo::NewContext> = bundle
            .context
            .iter()
            .map(|c| tez_repo::NewContext {
                layer: c.layer,
                content: c.content.clone(),
                mime_type: c.mime_type.clone(),
                confidence: c.confidence,
                source: c.source,
                derived_from: c.derived_from.clone(),
                created_by: SYSTEM_CREATED_BY.to_string(),
            })
            .collect();

        let audit = tez_repo::AdmissionAudit {
            team_id: None,
            actor_user_id: sender,
            action: "tez.received",
            metadata: json!({
                "bundleHash": bundle.bundle_hash,
                "senderServer": bundle.sender_server,
                "from": bundle.from,
            }),
        };

        tez_repo::admit(&state.db.pool, new_tez, &context, &local_ids, &[], audit).await?;
    }

    // 7. Per-recipient outcome: 207 when any addressee could not be resolved.
    let status =
        if not_found.is_empty() { StatusCode::OK } else { StatusCode::MULTI_STATUS };
    let local_tez_ids: Vec<Uuid> =
        if local_ids.is_empty() { vec![] } else { vec![bundle.tez.id] };

    Ok((
        status,
        Json(json!({
            "accepted": true,
            "localTezIds": local_tez_ids,
            "notFound": not_found,
            "ignored": ignored,
        })),
    )
        .into_response())
}

fn extract_signature(headers: &HeaderMap) -> Result<InboundSignature, RelayError> {
    let header = |name: &str| -> Result<String, RelayError> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or(RelayError::MissingSignature)
    };
    Ok(InboundSignature {
        date: header("date")?,
        digest: header("digest")?,
        signature: header("signature")?,
        signature_input: header("signature-input")?,
    })
}

// ─── Discovery ───────────────────────────────────────────────────────────────

/// `GET /federation/server-info` — this relay's self-description. Peers fetch
/// it once and register us via `/federation/verify`.
async fn server_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = tezrelay_common::config::get();
    Json(json!({
        "host": state.identity.host,
        "server_id": state.identity.server_id,
        "public_key": state.identity.public_key_base64(),
        "protocol_version": PROTOCOL_VERSION,
        "federation": {
            "enabled": config.federation.enabled,
            "inbox": "/federation/inbox",
        },
    }))
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    host: String,
    server_id: String,
    public_key: String,
    display_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    status: TrustLevel,
}

/// `POST /federation/verify` — a peer submits its self-description. The
/// server id must be derivable from the submitted key; admission mode decides
/// whether a new peer starts `pending` or `trusted`. Re-verification refreshes
/// key material but never changes an existing trust level.
async fn verify_peer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyRequest>,
) -> RelayResult<Json<VerifyResponse>> {
    let config = tezrelay_common::config::get();
    if !config.federation.enabled {
        return Err(RelayError::Forbidden);
    }

    if body.host.trim().is_empty() {
        return Err(RelayError::Validation { message: "host is required".into() });
    }
    if derive_server_id(&body.public_key) != body.server_id {
        return Err(RelayError::Validation {
            message: "server_id is not derived from the submitted public key".into(),
        });
    }

    let initial_trust = match config.federation.mode {
        FederationMode::Allowlist => TrustLevel::Pending,
        FederationMode::Open => TrustLevel::Trusted,
    };

    let (peer, created) = peers::upsert(
        &state.db.pool,
        body.host.trim(),
        &body.server_id,
        &body.public_key,
        body.display_name.as_deref(),
        initial_trust,
    )
    .await?;

    if created && peer.trust_level == TrustLevel::Trusted {
        // Open-mode auto-trust is a trust transition like any other; the
        // journal actor is the nil user since no local user drove it.
        state
            .audit
            .record(
                None,
                Uuid::nil(),
                AuditAction::PeerTrusted,
                "peer",
                peer.host.clone(),
                json!({ "serverId": peer.server_id, "mode": "open" }),
            )
            .await;
    }

    tracing::info!(host = %peer.host, trust = ?peer.trust_level, "peer verified");
    Ok(Json(VerifyResponse { status: peer.trust_level }))
}
