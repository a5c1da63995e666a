//! Conversation model — a persistent envelope for DMs and groups.
//!
//! Conversations are orthogonal to teams. DMs are unique over their unordered
//! member pair; creating the same DM twice returns the existing conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "conversation_type", rename_all = "snake_case")]
pub enum ConversationType {
    Dm,
    Group,
}

/// A DM or group conversation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    /// Null for DMs, required for groups.
    pub name: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a conversation. Primary key is `(conversation_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMember {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    /// Null until the user first marks the conversation read.
    pub last_read_at: Option<DateTime<Utc>>,
}

/// Build the uniqueness key for a DM over an unordered member pair.
///
/// The two ids are sorted so `dm_key(a, b) == dm_key(b, a)`; a unique index on
/// this key enforces at most one DM per pair.
pub fn dm_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dm_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dm_key(a, b), dm_key(b, a));
        assert_ne!(dm_key(a, b), dm_key(a, Uuid::new_v4()));
    }
}
