//! Team routes — creation and membership management.
//!
//! POST   /teams                        — Create a team (creator becomes admin)
//! GET    /teams/:id/members            — List members
//! POST   /teams/:id/members            — Add a member (admin)
//! DELETE /teams/:id/members/:user_id   — Remove a member (admin, or self-leave)

use axum::{
    extract::{Extension, Path, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use tezrelay_common::error::{RelayError, RelayResult};
use tezrelay_common::models::audit::AuditAction;
use tezrelay_common::models::team::{Team, TeamMember, TeamRole};
use tezrelay_common::validation::validate_request;
use tezrelay_db::repository::teams;

use crate::middleware::AuthContext;
use crate::response::{created, ok};
use crate::{acl, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/teams", post(create_team))
        .route("/teams/{team_id}/members", get(list_members).post(add_member))
        .route("/teams/{team_id}/members/{user_id}", axum::routing::delete(remove_member))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateTeamRequest {
    #[validate(length(min = 1, max = 128, message = "team name must be 1-128 characters"))]
    name: String,
}

/// POST /teams — create a team; the creator becomes an admin atomically.
async fn create_team(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTeamRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<crate::response::Envelope<Team>>)> {
    validate_request(&body)?;

    let team = teams::create_team(&state.db.pool, Uuid::new_v4(), body.name.trim(), auth.user_id)
        .await?;

    state
        .audit
        .record(
            Some(team.id),
            auth.user_id,
            AuditAction::TeamCreated,
            "team",
            team.id.to_string(),
            json!({ "name": team.name }),
        )
        .await;

    Ok(created(team))
}

/// GET /teams/:id/members — list members (members only).
async fn list_members(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<Uuid>,
) -> RelayResult<Json<crate::response::Envelope<Vec<TeamMember>>>> {
    ensure_team_exists(&state, team_id).await?;
    acl::require_team_member(&state.db.pool, team_id, auth.user_id).await?;

    let members = teams::list_members(&state.db.pool, team_id).await?;
    Ok(ok(members))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberRequest {
    user_id: Uuid,
    role: Option<TeamRole>,
}

/// POST /teams/:id/members — add a member (admin only).
async fn add_member(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<AddMemberRequest>,
) -> RelayResult<(axum::http::StatusCode, Json<crate::response::Envelope<TeamMember>>)> {
    ensure_team_exists(&state, team_id).await?;
    acl::require_team_admin(&state.db.pool, team_id, auth.user_id).await?;

    let role = body.role.unwrap_or(TeamRole::Member);
    let member = teams::add_member(&state.db.pool, team_id, body.user_id, role).await?;

    state
        .audit
        .record(
            Some(team_id),
            auth.user_id,
            AuditAction::TeamMemberAdded,
            "team_member",
            body.user_id.to_string(),
            json!({ "role": role }),
        )
        .await;

    Ok(created(member))
}

/// DELETE /teams/:id/members/:user_id — admins remove anyone; members may
/// remove themselves. Removing the last admin is refused.
async fn remove_member(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> RelayResult<Json<crate::response::Envelope<serde_json::Value>>> {
    ensure_team_exists(&state, team_id).await?;
    if user_id == auth.user_id {
        acl::require_team_member(&state.db.pool, team_id, auth.user_id).await?;
    } else {
        acl::require_team_admin(&state.db.pool, team_id, auth.user_id).await?;
    }

    match teams::remove_member(&state.db.pool, team_id, user_id).await? {
        teams::RemoveOutcome::Removed => {}
        teams::RemoveOutcome::NotAMember => {
            return Err(RelayError::NotFound { resource: "Team member".into() })
        }
        teams::RemoveOutcome::LastAdmin => {
            return Err(RelayError::Validation {
                message: "cannot remove the last admin of a team".into(),
            })
        }
    }

    state
        .audit
        .record(
            Some(team_id),
            auth.user_id,
            AuditAction::TeamMemberRemoved,
            "team_member",
            user_id.to_string(),
            json!({ "self_leave": user_id == auth.user_id }),
        )
        .await;

    Ok(ok(json!({ "removed": true })))
}

async fn ensure_team_exists(state: &AppState, team_id: Uuid) -> RelayResult<()> {
    teams::find_by_id(&state.db.pool, team_id)
        .await?
        .ok_or(RelayError::NotFound { resource: "Team".into() })?;
    Ok(())
}
