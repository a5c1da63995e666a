//! Peer model — another relay instance known to this one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trust state of a peer relay.
///
/// `blocked` is terminal with respect to inbound delivery and always
/// overrides other states. Inbound admission requires `trusted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "trust_level", rename_all = "snake_case")]
pub enum TrustLevel {
    Pending,
    Trusted,
    Blocked,
}

/// A registered peer relay.
///
/// Identity is content-addressed: `server_id` is the first 16 hex characters
/// of sha256 over the peer's base64-encoded public key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub host: String,
    pub server_id: String,
    /// Base64-encoded Ed25519 verifying key.
    pub public_key: String,
    pub display_name: Option<String>,
    pub trust_level: TrustLevel,
    pub first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "delivery_status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    InFlight,
    Sent,
    Failed,
}

/// A queued outbound federation delivery — one bundle for one target host.
///
/// The pump claims rows transactionally (`queued → in_flight`) and preserves
/// FIFO order per target host.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OutboundDelivery {
    pub id: Uuid,
    pub target_host: String,
    /// Canonical JSON of the bundle, exactly as it will go on the wire.
    pub bundle: String,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
