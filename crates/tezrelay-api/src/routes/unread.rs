//! Unread summary — one call for badge counts.
//!
//! GET /unread — `{teams, conversations, total}` for the calling user.

use axum::{extract::{Extension, State}, middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use tezrelay_common::error::RelayResult;
use tezrelay_db::repository::{conversations, teams};

use crate::middleware::AuthContext;
use crate::response::{ok, Envelope};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/unread", get(unread))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

#[derive(Debug, Serialize)]
struct UnreadSummary {
    /// Team-scoped tez delivered to the user and not yet read.
    teams: i64,
    /// Conversation messages past the user's read cursors.
    conversations: i64,
    total: i64,
}

async fn unread(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RelayResult<Json<Envelope<UnreadSummary>>> {
    let teams = teams::unread_team_tez(&state.db.pool, auth.user_id).await?;
    let conversations = conversations::unread_total(&state.db.pool, auth.user_id).await?;

    Ok(ok(UnreadSummary { teams, conversations, total: teams + conversations }))
}
