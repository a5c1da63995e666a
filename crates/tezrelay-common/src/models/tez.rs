//! Tez model — the core content unit.
//!
//! A tez is a short surface payload plus an ordered bag of typed context
//! layers, delivered end-to-end across relays. Tez, context layers, and
//! recipient rows are immutable after creation except for recipient read/ack
//! cursors and tez status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tez message.
///
/// Exactly one of `team_id` / `conversation_id` is set, or neither — in which
/// case the tez is visible only to its sender.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tez {
    pub id: Uuid,

    pub team_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,

    /// Root of the thread this tez belongs to. Equal to `id` on a root tez;
    /// inherited from the parent on replies. Never overwritten after insert.
    pub thread_id: Uuid,

    /// Direct parent for replies; null on thread roots.
    pub parent_tez_id: Option<Uuid>,

    /// Short human-readable payload. Non-empty, bounded by configuration.
    pub surface_text: String,

    pub tez_type: TezType,
    pub urgency: Urgency,

    /// Optional request for action from the recipients.
    pub action_requested: Option<String>,

    pub sender_user_id: Uuid,
    pub visibility: Visibility,
    pub status: TezStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "tez_type", rename_all = "snake_case")]
pub enum TezType {
    Note,
    Decision,
    Handoff,
    Question,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "urgency", rename_all = "snake_case")]
pub enum Urgency {
    Critical,
    High,
    Normal,
    Low,
    Fyi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "visibility", rename_all = "snake_case")]
pub enum Visibility {
    Team,
    Dm,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "tez_status", rename_all = "snake_case")]
pub enum TezStatus {
    Active,
    Archived,
    Deleted,
}

/// One context layer attached to a tez.
///
/// Layers travel with the message end-to-end; on federated ingestion they are
/// re-persisted with `created_by = "system"` since the authoring user is not
/// local.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TezContext {
    pub id: Uuid,
    pub tez_id: Uuid,
    pub layer: ContextLayer,
    pub content: String,
    pub mime_type: Option<String>,
    /// 0–100; only meaningful for `fact` layers.
    pub confidence: Option<i32>,
    pub source: Option<ContextSource>,
    /// Free-form provenance pointer (e.g. another tez or artifact id).
    pub derived_from: Option<String>,
    /// A userId, or the sentinel `"system"` for federated ingestion.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Sentinel `created_by` for context layers persisted by the relay itself.
pub const SYSTEM_CREATED_BY: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "context_layer", rename_all = "snake_case")]
pub enum ContextLayer {
    Background,
    Fact,
    Artifact,
    Relationship,
    Constraint,
    Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "context_source", rename_all = "snake_case")]
pub enum ContextSource {
    Stated,
    Inferred,
    Verified,
}

/// A delivery record for one local recipient of a tez.
///
/// `delivered_at` is stamped at admission time — local persistence for local
/// shares, inbound ingestion for federated ones.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TezRecipient {
    pub tez_id: Uuid,
    pub user_id: Uuid,
    pub delivered_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}
