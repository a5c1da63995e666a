//! Outbox repository — admin visibility into the outbound delivery queue.
//!
//! Enqueueing happens inside the tez admission transaction (`tez::admit`);
//! claiming and completing rows is the pump's job. This module only reads.

use sqlx::PgPool;

use tezrelay_common::models::peer::{DeliveryStatus, OutboundDelivery};

/// List queue entries, newest first, optionally filtered by status.
pub async fn list(
    pool: &PgPool,
    status: Option<DeliveryStatus>,
    limit: i64,
) -> Result<Vec<OutboundDelivery>, sqlx::Error> {
    if let Some(status) = status {
        sqlx::query_as::<_, OutboundDelivery>(
            "SELECT * FROM outbound_deliveries WHERE status = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, OutboundDelivery>(
            "SELECT * FROM outbound_deliveries ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

/// Queue depth per status, for the admin outbox view.
pub async fn status_counts(pool: &PgPool) -> Result<Vec<(DeliveryStatus, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (DeliveryStatus, i64)>(
        "SELECT status, COUNT(*) FROM outbound_deliveries GROUP BY status",
    )
    .fetch_all(pool)
    .await
}
