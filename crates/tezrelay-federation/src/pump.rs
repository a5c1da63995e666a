//! Outbound delivery pump — drains the outbound queue to peer inboxes.
//!
//! Each queued row carries the canonical bundle JSON for one target host. The
//! pump claims rows transactionally (`queued → in_flight`), POSTs the bundle
//! to `https://<host>/federation/inbox` with a signed request, and records the
//! outcome:
//!
//! - 200 / 207 → `sent`
//! - other 4xx → `failed` (permanent, no retry)
//! - anything else → back to `queued` with exponential backoff
//!
//! Delivery is FIFO per target host: a host whose head-of-line delivery fails
//! is skipped for the rest of the pass so later bundles never overtake it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use tezrelay_common::models::peer::OutboundDelivery;

use crate::error::FederationError;
use crate::identity::ServerIdentity;
use crate::signatures::sign_request;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Base delay for the exponential retry backoff.
const BACKOFF_BASE_SECS: u64 = 5;

/// Async worker that drains the outbound delivery queue.
pub struct DeliveryPump {
    pool: PgPool,
    identity: Arc<ServerIdentity>,
    http: Client,
    interval: Duration,
    max_backoff: Duration,
}

impl DeliveryPump {
    pub fn new(
        pool: PgPool,
        identity: Arc<ServerIdentity>,
        interval_secs: u64,
        max_backoff_secs: u64,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .user_agent(concat!("tezrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build outbound http client");

        Self {
            pool,
            identity,
            http,
            interval: Duration::from_secs(interval_secs),
            max_backoff: Duration::from_secs(max_backoff_secs),
        }
    }

    /// Run forever, draining the queue every `interval`.
    pub async fn run(self) {
        info!(interval = ?self.interval, "outbound delivery pump started");
        loop {
            if let Err(e) = self.tick().await {
                warn!("delivery pump pass failed: {e}");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One drain pass over every host with due deliveries.
    pub async fn tick(&self) -> Result<(), FederationError> {
        let hosts: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT target_host FROM outbound_deliveries \
             WHERE status = 'queued' AND next_attempt_at <= NOW()",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FederationError::Other(e.into()))?;

        for (host,) in hosts {
            self.drain_host(&host).await;
        }
        Ok(())
    }

    /// Deliver queued bundles to one host in FIFO order, stopping at the
    /// first transient failure so ordering is preserved.
    async fn drain_host(&self, host: &str) {
        loop {
            let delivery = match self.claim_next(host).await {
                Ok(Some(d)) => d,
                Ok(None) => return,
                Err(e) => {
                    warn!(host, "failed to claim delivery: {e}");
                    return;
                }
            };

            match self.deliver(&delivery).await {
                Outcome::Delivered => {
                    if let Err(e) = self.mark(&delivery, "sent").await {
                        warn!(host, id = %delivery.id, "failed to mark delivery sent: {e}");
                    }
                    debug!(host, id = %delivery.id, "bundle delivered");
                }
                Outcome::Permanent(detail) => {
                    warn!(host, id = %delivery.id, detail, "permanent delivery failure");
                    if let Err(e) = self.mark(&delivery, "failed").await {
                        warn!(host, id = %delivery.id, "failed to mark delivery failed: {e}");
                    }
                }
                Outcome::Transient(detail) => {
                    warn!(host, id = %delivery.id, detail, "transient delivery failure, will retry");
                    if let Err(e) = self.requeue_with_backoff(&delivery).await {
                        warn!(host, id = %delivery.id, "failed to requeue delivery: {e}");
                    }
                    // Head of line failed — leave the rest of this host's
                    // queue for a later pass.
                    return;
                }
            }
        }
    }

    /// Atomically claim the oldest due delivery for a host.
    async fn claim_next(&self, host: &str) -> Result<Option<OutboundDelivery>, sqlx::Error> {
        sqlx::query_as::<_, OutboundDelivery>(
            r#"
            UPDATE outbound_deliveries SET status = 'in_flight'
            WHERE id = (
                SELECT id FROM outbound_deliveries
                WHERE target_host = $1 AND status = 'queued' AND next_attempt_at <= NOW()
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(host)
        .fetch_optional(&self.pool)
        .await
    }

    async fn deliver(&self, delivery: &OutboundDelivery) -> Outcome {
        let path = "/federation/inbox";
        let body = delivery.bundle.as_bytes();
        let headers = sign_request(&self.identity, "POST", path, &delivery.target_host, body);
        let url = format!("https://{}{}", delivery.target_host, path);

        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Date", &headers.date)
            .header("Digest", &headers.digest)
            .header("Signature", &headers.signature)
            .header("Signature-Input", &headers.signature_input)
            .body(delivery.bundle.clone())
            .send()
            .await;

        match resp {
            Ok(r) if r.status().as_u16() == 200 || r.status().as_u16() == 207 => Outcome::Delivered,
            Ok(r) if r.status().is_client_error() => {
                Outcome::Permanent(format!("peer returned {}", r.status()))
            }
            Ok(r) => Outcome::Transient(format!("peer returned {}", r.status())),
            Err(e) => Outcome::Transient(e.to_string()),
        }
    }

    async fn mark(&self, delivery: &OutboundDelivery, status: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE outbound_deliveries SET status = $2::delivery_status WHERE id = $1")
            .bind(delivery.id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn requeue_with_backoff(&self, delivery: &OutboundDelivery) -> Result<(), sqlx::Error> {
        let attempts = delivery.attempts + 1;
        let delay = backoff_secs(attempts, self.max_backoff.as_secs());
        let next = Utc::now() + chrono::Duration::seconds(delay as i64);

        sqlx::query(
            "UPDATE outbound_deliveries \
             SET status = 'queued', attempts = $2, next_attempt_at = $3 \
             WHERE id = $1",
        )
        .bind(delivery.id)
        .bind(attempts)
        .bind(next)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

enum Outcome {
    Delivered,
    Permanent(String),
    Transient(String),
}

/// Exponential backoff: `base * 2^(attempts-1)`, capped at `max`.
fn backoff_secs(attempts: i32, max: u64) -> u64 {
    let exp = attempts.clamp(1, 32) as u32 - 1;
    BACKOFF_BASE_SECS.saturating_mul(1u64 << exp.min(30)).min(max)
}

#[cfg(test)]
mod tests {
    use super::backoff_secs;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_secs(1, 3600), 5);
        assert_eq!(backoff_secs(2, 3600), 10);
        assert_eq!(backoff_secs(3, 3600), 20);
        assert_eq!(backoff_secs(20, 3600), 3600);
    }
}
