//! Contact routes — registration, profile lookup, and search.
//!
//! POST /contacts/register       — Register (or re-register) the caller
//! GET  /contacts/me             — The caller's own contact row
//! GET  /contacts/search?q=&limit= — Search registered contacts
//! GET  /contacts/:user_id       — Public profile (email omitted)

use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use tezrelay_common::address::tez_address;
use tezrelay_common::error::{RelayError, RelayResult};
use tezrelay_common::models::audit::AuditAction;
use tezrelay_common::models::contact::{Contact, ContactProfile};
use tezrelay_common::validation::validate_request;
use tezrelay_db::repository::contacts;

use crate::middleware::AuthContext;
use crate::response::{created, ok};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/contacts/register", post(register))
        .route("/contacts/me", get(me))
        .route("/contacts/search", get(search))
        .route("/contacts/{user_id}", get(profile))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[validate(length(min = 1, max = 128, message = "displayName must be 1-128 characters"))]
    display_name: String,
    #[validate(email(message = "email must be a valid address"))]
    email: Option<String>,
    avatar_url: Option<String>,
}

/// POST /contacts/register — upsert keyed on the caller's user id. Registering
/// twice updates the profile; the response is 201 either way.
async fn register(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<crate::response::Envelope<Contact>>)> {
    validate_request(&body)?;

    let config = tezrelay_common::config::get();
    let address = tez_address(auth.user_id, &config.server.relay_host);

    let (contact, was_new) = contacts::register(
        &state.db.pool,
        auth.user_id,
        body.display_name.trim(),
        body.email.as_deref(),
        body.avatar_url.as_deref(),
        &address,
    )
    .await?;

    let action = if was_new { AuditAction::ContactRegistered } else { AuditAction::ContactUpdated };
    state
        .audit
        .record(
            None,
            auth.user_id,
            action,
            "contact",
            contact.id.to_string(),
            json!({ "tez_address": contact.tez_address }),
        )
        .await;

    Ok(created(contact))
}

/// GET /contacts/me
async fn me(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RelayResult<Json<crate::response::Envelope<Contact>>> {
    let contact = contacts::find_by_id(&state.db.pool, auth.user_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Contact".into() })?;
    Ok(ok(contact))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<i64>,
}

/// GET /contacts/search?q=…&limit=… — `q` must be at least 2 characters.
async fn search(
    Extension(_auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> RelayResult<Json<crate::response::Envelope<Vec<ContactProfile>>>> {
    let q = params.q.trim();
    if q.chars().count() < 2 {
        return Err(RelayError::Validation {
            message: "search query must be at least 2 characters".into(),
        });
    }

    let config = tezrelay_common::config::get();
    let limit = params
        .limit
        .unwrap_or(config.limits.default_page_size)
        .clamp(1, config.limits.max_page_size);

    let results = contacts::search(&state.db.pool, q, limit).await?;
    Ok(ok(results.into_iter().map(ContactProfile::from).collect()))
}

/// GET /contacts/:user_id — public profile, email omitted.
async fn profile(
    Extension(_auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> RelayResult<Json<crate::response::Envelope<ContactProfile>>> {
    let contact = contacts::find_by_id(&state.db.pool, user_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Contact".into() })?;
    Ok(ok(contact.into()))
}
