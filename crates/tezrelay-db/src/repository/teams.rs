//! Team repository — teams and role-based membership.

use sqlx::PgPool;
use uuid::Uuid;

use tezrelay_common::models::team::{Team, TeamMember, TeamRole};

/// Create a team. The creator becomes an admin member in the same transaction.
pub async fn create_team(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    created_by: Uuid,
) -> Result<Team, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let team = sqlx::query_as::<_, Team>(
        "INSERT INTO teams (id, name, created_by, created_at, updated_at) \
         VALUES ($1, $2, $3, NOW(), NOW()) RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(created_by)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO team_members (team_id, user_id, role, joined_at) VALUES ($1, $2, 'admin', NOW())",
    )
    .bind(id)
    .bind(created_by)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(team)
}

/// Find a team by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List members of a team, admins first.
pub async fn list_members(pool: &PgPool, team_id: Uuid) -> Result<Vec<TeamMember>, sqlx::Error> {
    sqlx::query_as::<_, TeamMember>(
        "SELECT * FROM team_members WHERE team_id = $1 ORDER BY role ASC, joined_at ASC",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
}

/// Add (or re-role) a member.
pub async fn add_member(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
    role: TeamRole,
) -> Result<TeamMember, sqlx::Error> {
    sqlx::query_as::<_, TeamMember>(
        r#"
        INSERT INTO team_members (team_id, user_id, role, joined_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (team_id, user_id) DO UPDATE SET role = EXCLUDED.role
        RETURNING *
        "#,
    )
    .bind(team_id)
    .bind(user_id)
    .bind(role)
    .fetch_one(pool)
    .await
}

/// Outcome of a membership removal attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotAMember,
    /// Refused: a team with zero admins is invalid.
    LastAdmin,
}

/// Remove a member, refusing to remove the last admin. The admin count check
/// and the delete share one transaction so a racing removal cannot leave the
/// team admin-less.
pub async fn remove_member(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<RemoveOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let member = sqlx::query_as::<_, TeamMember>(
        "SELECT * FROM team_members WHERE team_id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(member) = member else {
        return Ok(RemoveOutcome::NotAMember);
    };

    if member.role == TeamRole::Admin {
        let (admins,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM team_members WHERE team_id = $1 AND role = 'admin'",
        )
        .bind(team_id)
        .fetch_one(&mut *tx)
        .await?;
        if admins <= 1 {
            return Ok(RemoveOutcome::LastAdmin);
        }
    }

    sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
        .bind(team_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(RemoveOutcome::Removed)
}

/// Whether a user belongs to a team.
pub async fn is_member(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM team_members WHERE team_id = $1 AND user_id = $2)",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// A user's role in a team, if any.
pub async fn member_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TeamRole>, sqlx::Error> {
    let row: Option<(TeamRole,)> = sqlx::query_as(
        "SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(r,)| r))
}

/// Count tez delivered to a user in any team scope that they have not read.
pub async fn unread_team_tez(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM tez_recipients r
        JOIN tez t ON t.id = r.tez_id
        WHERE r.user_id = $1 AND r.read_at IS NULL
          AND t.team_id IS NOT NULL AND t.status = 'active'
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
