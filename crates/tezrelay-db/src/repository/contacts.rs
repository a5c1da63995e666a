//! Contact repository — local users addressable over federation.

use sqlx::PgPool;
use uuid::Uuid;

use tezrelay_common::models::contact::Contact;

/// Register or update a contact. Registration is an upsert keyed on the user
/// id, so registering twice updates the profile rather than duplicating it.
/// Returns the row plus whether it was newly created.
pub async fn register(
    pool: &PgPool,
    id: Uuid,
    display_name: &str,
    email: Option<&str>,
    avatar_url: Option<&str>,
    tez_address: &str,
) -> Result<(Contact, bool), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (existed,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM contacts WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    let contact = sqlx::query_as::<_, Contact>(
        r#"
        INSERT INTO contacts (id, display_name, email, avatar_url, tez_address, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 'active', NOW(), NOW())
        ON CONFLICT (id) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            email = EXCLUDED.email,
            avatar_url = EXCLUDED.avatar_url,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(email)
    .bind(avatar_url)
    .bind(tez_address)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((contact, !existed))
}

/// Find a contact by user id.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Whether a user id is a registered contact. Inbound federation uses this to
/// sort resolved recipients from `notFound` ones.
pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM contacts WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Case-insensitive substring search over display names and addresses.
pub async fn search(pool: &PgPool, q: &str, limit: i64) -> Result<Vec<Contact>, sqlx::Error> {
    let pattern = format!("%{}%", q.replace('%', "\\%").replace('_', "\\_"));
    sqlx::query_as::<_, Contact>(
        r#"
        SELECT * FROM contacts
        WHERE display_name ILIKE $1 OR tez_address ILIKE $1
        ORDER BY display_name ASC
        LIMIT $2
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
}
