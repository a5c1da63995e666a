//! Federation-specific error types.

use thiserror::Error;

/// Errors that can occur in federation operations.
#[derive(Debug, Error)]
pub enum FederationError {
    // ── Identity ────────────────────────────────────────────────────────────
    #[error("Failed to load server identity: {0}")]
    KeyLoad(String),

    #[error("Failed to persist server identity: {0}")]
    KeyStore(#[from] std::io::Error),

    // ── Signature verification ───────────────────────────────────────────────
    #[error("Missing `{0}` header on federated request")]
    MissingHeader(&'static str),

    #[error("Malformed Signature-Input header: {0}")]
    MalformedSignatureInput(String),

    #[error("Request body does not match its Digest header")]
    BodyModified,

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Request date skewed beyond ±{0} seconds")]
    ClockSkew(i64),

    // ── Bundle validation ─────────────────────────────────────────────────────
    #[error("{0}")]
    InvalidBundle(String),

    // ── Remote communication ─────────────────────────────────────────────────
    #[error("HTTP error communicating with '{host}': {detail}")]
    RemoteHttp { host: String, detail: String },

    // ── General ─────────────────────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for FederationError {
    fn from(e: reqwest::Error) -> Self {
        let host = e.url().and_then(|u| u.host_str().map(str::to_owned)).unwrap_or_default();
        FederationError::RemoteHttp { host, detail: e.to_string() }
    }
}

impl From<FederationError> for tezrelay_common::error::RelayError {
    fn from(e: FederationError) -> Self {
        use tezrelay_common::error::RelayError;
        match e {
            FederationError::MissingHeader(_) => RelayError::MissingSignature,
            FederationError::BodyModified => RelayError::BodyModified,
            FederationError::InvalidSignature
            | FederationError::MalformedSignatureInput(_)
            | FederationError::ClockSkew(_) => RelayError::InvalidSignature,
            FederationError::InvalidBundle(reason) => RelayError::InvalidBundle { reason },
            other => RelayError::Internal(other.into()),
        }
    }
}
