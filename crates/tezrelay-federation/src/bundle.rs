//! Federation bundle — the content-addressed delivery envelope.
//!
//! A bundle binds a tez, its context layers, and its routing to the sending
//! relay. `bundle_hash` is hex(sha256) over the canonical JSON of the envelope
//! with the hash field removed, so a receiver can verify integrity end-to-end,
//! independent of the transport signature.
//!
//! Canonical JSON: object keys sorted lexicographically at every depth, array
//! order preserved, UTF-8 strings, no insignificant whitespace.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use tezrelay_common::models::tez::{ContextLayer, ContextSource, TezType, Urgency, Visibility};

use crate::error::FederationError;

/// Wire protocol version. Bumped only on incompatible envelope changes.
pub const PROTOCOL_VERSION: &str = "1.0";

/// The only bundle type this relay speaks.
pub const BUNDLE_TYPE: &str = "federation_delivery";

const REQUIRED_FIELDS: [&str; 9] = [
    "protocol_version",
    "bundle_type",
    "sender_server",
    "tez",
    "context",
    "from",
    "to",
    "created_at",
    "bundle_hash",
];

// ─── Envelope ────────────────────────────────────────────────────────────────

/// The tez as transmitted between relays — local state (team/conversation
/// scope, status) stays home; the id travels for end-to-end provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleTez {
    pub id: Uuid,
    pub thread_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_tez_id: Option<Uuid>,
    pub surface_text: String,
    #[serde(rename = "type")]
    pub tez_type: TezType,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_requested: Option<String>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// One context layer as transmitted. Order within the bundle is the order
/// the sender attached them, and is preserved on ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleContext {
    pub layer: ContextLayer,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ContextSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
}

/// A federation delivery envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub protocol_version: String,
    pub bundle_type: String,
    /// Host name of the sending relay.
    pub sender_server: String,
    pub tez: BundleTez,
    pub context: Vec<BundleContext>,
    /// `"<senderUserId>@<senderHost>"`.
    pub from: String,
    /// Recipient tez-addresses, one per `"<userId>@<host>"`.
    pub to: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// hex(sha256(canonical_json(bundle minus this field))).
    pub bundle_hash: String,
}

impl Bundle {
    /// Construct and seal a bundle: the hash is computed over the canonical
    /// form of everything else.
    pub fn build(
        sender_server: &str,
        tez: BundleTez,
        context: Vec<BundleContext>,
        from: String,
        to: Vec<String>,
    ) -> Result<Self, FederationError> {
        let mut bundle = Self {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            bundle_type: BUNDLE_TYPE.to_owned(),
            sender_server: sender_server.to_owned(),
            tez,
            context,
            from,
            to,
            created_at: Utc::now(),
            bundle_hash: String::new(),
        };
        bundle.bundle_hash = compute_hash(&serde_json::to_value(&bundle)?);
        Ok(bundle)
    }

    /// The canonical wire form of this bundle (hash included). This exact
    /// string is what gets queued, digested, and POSTed to the peer.
    pub fn canonical_string(&self) -> Result<String, FederationError> {
        Ok(canonical_json(&serde_json::to_value(self)?))
    }

    /// Validate a received envelope. Any deviation yields `InvalidBundle`
    /// naming the first failing check; the hash is recomputed over the JSON
    /// exactly as received, not over any re-serialization.
    pub fn validate(raw: &Value) -> Result<Self, FederationError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| FederationError::InvalidBundle("not a JSON object".into()))?;

        for field in REQUIRED_FIELDS {
            if !obj.contains_key(field) {
                return Err(FederationError::InvalidBundle(format!("missing field `{field}`")));
            }
        }

        let bundle: Bundle = serde_json::from_value(raw.clone())
            .map_err(|e| FederationError::InvalidBundle(format!("malformed envelope: {e}")))?;

        if bundle.bundle_type != BUNDLE_TYPE {
            return Err(FederationError::InvalidBundle(format!(
                "unsupported bundle_type `{}`",
                bundle.bundle_type
            )));
        }
        if bundle.protocol_version != PROTOCOL_VERSION {
            return Err(FederationError::InvalidBundle(format!(
                "unsupported protocol_version `{}`",
                bundle.protocol_version
            )));
        }
        if bundle.to.is_empty() {
            return Err(FederationError::InvalidBundle("empty recipient list".into()));
        }

        if compute_hash(raw) != bundle.bundle_hash {
            return Err(FederationError::InvalidBundle("hash mismatch".into()));
        }

        Ok(bundle)
    }
}

// ─── Canonical JSON ──────────────────────────────────────────────────────────

/// Produce canonical JSON: sorted keys at every depth, no extra whitespace.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

/// hex(sha256(canonical_json(value minus `bundle_hash`))).
pub fn compute_hash(value: &Value) -> String {
    let mut stripped = value.clone();
    if let Some(obj) = stripped.as_object_mut() {
        obj.remove("bundle_hash");
    }
    hex::encode(Sha256::digest(canonical_json(&stripped).as_bytes()))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect::<BTreeMap<_, _>>()
                .into_iter()
                .collect();
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_bundle() -> Bundle {
        let tez = BundleTez {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            parent_tez_id: None,
            surface_text: "Ship by Friday".into(),
            tez_type: TezType::Note,
            urgency: Urgency::Normal,
            action_requested: None,
            visibility: Visibility::Dm,
            created_at: Utc::now(),
        };
        let context = vec![
            BundleContext {
                layer: ContextLayer::Background,
                content: "release train context".into(),
                mime_type: None,
                confidence: None,
                source: None,
                derived_from: None,
            },
            BundleContext {
                layer: ContextLayer::Fact,
                content: "CI is green".into(),
                mime_type: None,
                confidence: Some(95),
                source: Some(ContextSource::Verified),
                derived_from: None,
            },
        ];
        Bundle::build(
            "relay-a.example",
            tez,
            context,
            "11111111-1111-1111-1111-111111111111@relay-a.example".into(),
            vec!["22222222-2222-2222-2222-222222222222@relay-b.example".into()],
        )
        .unwrap()
    }

    #[test]
    fn canonicalization_sorts_keys_and_is_stable() {
        let a = json!({"b": 1, "a": {"z": true, "m": [3, 1, 2]}});
        let b = json!({"a": {"m": [3, 1, 2], "z": true}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"m":[3,1,2],"z":true},"b":1}"#);
    }

    #[test]
    fn build_then_validate_round_trips() {
        let bundle = sample_bundle();
        let wire = bundle.canonical_string().unwrap();
        let raw: Value = serde_json::from_str(&wire).unwrap();
        let validated = Bundle::validate(&raw).unwrap();
        assert_eq!(validated.bundle_hash, bundle.bundle_hash);
        // Context order survives the wire.
        assert_eq!(validated.context[0].layer, ContextLayer::Background);
        assert_eq!(validated.context[1].confidence, Some(95));
    }

    #[test]
    fn tampered_payload_fails_with_hash_mismatch() {
        let bundle = sample_bundle();
        let mut raw: Value = serde_json::from_str(&bundle.canonical_string().unwrap()).unwrap();
        raw["tez"]["surface_text"] = json!("Ship by Monday");
        let err = Bundle::validate(&raw).unwrap_err();
        assert!(matches!(err, FederationError::InvalidBundle(ref m) if m == "hash mismatch"));
    }

    #[test]
    fn missing_field_is_named() {
        let bundle = sample_bundle();
        let mut raw: Value = serde_json::from_str(&bundle.canonical_string().unwrap()).unwrap();
        raw.as_object_mut().unwrap().remove("sender_server");
        let err = Bundle::validate(&raw).unwrap_err();
        assert!(matches!(err, FederationError::InvalidBundle(ref m) if m.contains("sender_server")));
    }

    #[test]
    fn wrong_protocol_version_is_rejected() {
        let bundle = sample_bundle();
        let mut raw: Value = serde_json::from_str(&bundle.canonical_string().unwrap()).unwrap();
        raw["protocol_version"] = json!("0.9");
        let err = Bundle::validate(&raw).unwrap_err();
        assert!(matches!(err, FederationError::InvalidBundle(ref m) if m.contains("protocol_version")));
    }

    #[test]
    fn hash_is_over_received_json_not_reserialization() {
        // A receiver must accept a bundle whose optional fields were encoded
        // differently than we would encode them, as long as the hash binds
        // what was actually sent.
        let bundle = sample_bundle();
        let mut raw: Value = serde_json::from_str(&bundle.canonical_string().unwrap()).unwrap();
        // Introduce an explicit null the sender chose to include, re-hash.
        raw["tez"]["action_requested"] = Value::Null;
        raw["bundle_hash"] = json!(compute_hash(&raw));
        assert!(Bundle::validate(&raw).is_ok());
    }
}
