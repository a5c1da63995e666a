//! The access predicate — every operation's single authorization gate.
//!
//! Access to a tez follows a fixed precedence:
//!
//! 1. The sender always sees their own tez.
//! 2. Team-scoped tez admit team members.
//! 3. Conversation-scoped tez admit conversation members.
//! 4. A user on the delivery roster is admitted — the direct-sender scope.
//!    Federated ingestion persists tez with no local team or conversation,
//!    so the roster is the only thing tying a delivery to its reader.
//! 5. Everyone else is denied.
//!
//! Scope-level operations degenerate to the matching membership check, and
//! admin-only operations additionally require the admin role (or, for
//! federation administration, membership in the configured admin user set).
//! Handlers call these at the top; none may return success past a denial.

use sqlx::PgPool;
use uuid::Uuid;

use tezrelay_common::error::{RelayError, RelayResult};
use tezrelay_common::models::team::TeamRole;
use tezrelay_common::models::tez::Tez;
use tezrelay_db::repository::{conversations, teams, tez as tez_repo};

/// May `actor` read or reply to this tez?
pub async fn may_access_tez(pool: &PgPool, actor: Uuid, tez: &Tez) -> RelayResult<()> {
    if actor == tez.sender_user_id {
        return Ok(());
    }
    if let Some(team_id) = tez.team_id {
        if teams::is_member(pool, team_id, actor).await? {
            return Ok(());
        }
    } else if let Some(conversation_id) = tez.conversation_id {
        if conversations::is_member(pool, conversation_id, actor).await? {
            return Ok(());
        }
    }
    // Direct-sender scope: an explicit delivery admits its recipient.
    if tez_repo::is_recipient(pool, tez.id, actor).await? {
        return Ok(());
    }
    Err(RelayError::Forbidden)
}

/// Team-scoped operations require membership.
pub async fn require_team_member(pool: &PgPool, team_id: Uuid, actor: Uuid) -> RelayResult<()> {
    if teams::is_member(pool, team_id, actor).await? {
        Ok(())
    } else {
        Err(RelayError::Forbidden)
    }
}

/// Membership-mutating team operations require the admin role.
pub async fn require_team_admin(pool: &PgPool, team_id: Uuid, actor: Uuid) -> RelayResult<()> {
    match teams::member_role(pool, team_id, actor).await? {
        Some(TeamRole::Admin) => Ok(()),
        _ => Err(RelayError::Forbidden),
    }
}

/// Conversation-scoped operations require membership.
pub async fn require_conversation_member(
    pool: &PgPool,
    conversation_id: Uuid,
    actor: Uuid,
) -> RelayResult<()> {
    if conversations::is_member(pool, conversation_id, actor).await? {
        Ok(())
    } else {
        Err(RelayError::Forbidden)
    }
}

/// Federation administration requires the configured admin user set.
pub fn require_relay_admin(actor: Uuid) -> RelayResult<()> {
    if tezrelay_common::config::get().is_admin(actor) {
        Ok(())
    } else {
        Err(RelayError::Forbidden)
    }
}
