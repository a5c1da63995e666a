//! Contact model — a local user registered to send and receive tez.
//!
//! A local user must be registered as a contact before they can receive
//! federated tez; inbound bundles addressed to unregistered users are
//! reported back to the sending relay as `notFound`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered local user. `id` equals the bearer token's subject.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    /// Canonical federated address: `"<userId>@<relayHost>"`. Unique.
    pub tez_address: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "contact_status", rename_all = "snake_case")]
pub enum ContactStatus {
    Active,
    Away,
    Busy,
    Offline,
}

/// Public view of a contact — omits email.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactProfile {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub tez_address: String,
    pub status: ContactStatus,
}

impl From<Contact> for ContactProfile {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            display_name: c.display_name,
            avatar_url: c.avatar_url,
            tez_address: c.tez_address,
            status: c.status,
        }
    }
}
