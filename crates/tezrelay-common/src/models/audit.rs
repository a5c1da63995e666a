//! Audit journal model — append-only record of every mutating operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enumerated journal actions. Stored as their dotted wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "tez.shared")]
    TezShared,
    #[serde(rename = "tez.replied")]
    TezReplied,
    #[serde(rename = "tez.read")]
    TezRead,
    #[serde(rename = "tez.received")]
    TezReceived,
    #[serde(rename = "tez.acknowledged")]
    TezAcknowledged,
    #[serde(rename = "tez.archived")]
    TezArchived,
    #[serde(rename = "tez.deleted")]
    TezDeleted,
    #[serde(rename = "team.created")]
    TeamCreated,
    #[serde(rename = "team.member_added")]
    TeamMemberAdded,
    #[serde(rename = "team.member_removed")]
    TeamMemberRemoved,
    #[serde(rename = "contact.registered")]
    ContactRegistered,
    #[serde(rename = "contact.updated")]
    ContactUpdated,
    #[serde(rename = "peer.trusted")]
    PeerTrusted,
    #[serde(rename = "peer.blocked")]
    PeerBlocked,
    #[serde(rename = "peer.removed")]
    PeerRemoved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TezShared => "tez.shared",
            Self::TezReplied => "tez.replied",
            Self::TezRead => "tez.read",
            Self::TezReceived => "tez.received",
            Self::TezAcknowledged => "tez.acknowledged",
            Self::TezArchived => "tez.archived",
            Self::TezDeleted => "tez.deleted",
            Self::TeamCreated => "team.created",
            Self::TeamMemberAdded => "team.member_added",
            Self::TeamMemberRemoved => "team.member_removed",
            Self::ContactRegistered => "contact.registered",
            Self::ContactUpdated => "contact.updated",
            Self::PeerTrusted => "peer.trusted",
            Self::PeerBlocked => "peer.blocked",
            Self::PeerRemoved => "peer.removed",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub team_id: Option<Uuid>,
    pub actor_user_id: Uuid,
    /// Dotted action name, e.g. `tez.shared`.
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serde_uses_dotted_names() {
        let json = serde_json::to_string(&AuditAction::TeamMemberAdded).unwrap();
        assert_eq!(json, "\"team.member_added\"");
        let back: AuditAction = serde_json::from_str("\"tez.received\"").unwrap();
        assert_eq!(back, AuditAction::TezReceived);
        assert_eq!(back.as_str(), "tez.received");
    }
}
