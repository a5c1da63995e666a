//! Peer repository — the trust registry for remote relays.

use sqlx::PgPool;

use tezrelay_common::models::peer::{Peer, TrustLevel};

/// Insert or refresh a peer. Key material and display name are updated on
/// re-verification, but an existing trust level is preserved — verification
/// never silently promotes or demotes a peer. Returns the row plus whether it
/// was newly registered.
pub async fn upsert(
    pool: &PgPool,
    host: &str,
    server_id: &str,
    public_key: &str,
    display_name: Option<&str>,
    initial_trust: TrustLevel,
) -> Result<(Peer, bool), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (existed,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM peers WHERE host = $1)")
        .bind(host)
        .fetch_one(&mut *tx)
        .await?;

    let peer = sqlx::query_as::<_, Peer>(
        r#"
        INSERT INTO peers (host, server_id, public_key, display_name, trust_level, first_seen_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (host) DO UPDATE SET
            server_id = EXCLUDED.server_id,
            public_key = EXCLUDED.public_key,
            display_name = EXCLUDED.display_name
        RETURNING *
        "#,
    )
    .bind(host)
    .bind(server_id)
    .bind(public_key)
    .bind(display_name)
    .bind(initial_trust)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((peer, !existed))
}

/// Look up a peer by its 16-hex server id — the signature `keyId`.
pub async fn find_by_server_id(
    pool: &PgPool,
    server_id: &str,
) -> Result<Option<Peer>, sqlx::Error> {
    sqlx::query_as::<_, Peer>("SELECT * FROM peers WHERE server_id = $1")
        .bind(server_id)
        .fetch_optional(pool)
        .await
}

/// Look up a peer by host.
pub async fn find_by_host(pool: &PgPool, host: &str) -> Result<Option<Peer>, sqlx::Error> {
    sqlx::query_as::<_, Peer>("SELECT * FROM peers WHERE host = $1")
        .bind(host)
        .fetch_optional(pool)
        .await
}

/// All registered peers, oldest first.
pub async fn list(pool: &PgPool) -> Result<Vec<Peer>, sqlx::Error> {
    sqlx::query_as::<_, Peer>("SELECT * FROM peers ORDER BY first_seen_at ASC")
        .fetch_all(pool)
        .await
}

/// Transition a peer's trust level. Returns the updated row, or `None` for an
/// unknown host.
pub async fn set_trust(
    pool: &PgPool,
    host: &str,
    trust_level: TrustLevel,
) -> Result<Option<Peer>, sqlx::Error> {
    sqlx::query_as::<_, Peer>(
        "UPDATE peers SET trust_level = $2 WHERE host = $1 RETURNING *",
    )
    .bind(host)
    .bind(trust_level)
    .fetch_optional(pool)
    .await
}

/// Delete a peer registration.
pub async fn remove(pool: &PgPool, host: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM peers WHERE host = $1")
        .bind(host)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
