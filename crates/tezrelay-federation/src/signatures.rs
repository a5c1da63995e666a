//! Federation request signing and verification.
//!
//! Every server-to-server HTTP request carries four headers:
//!
//! ```text
//! Date: 2026-08-02T10:15:30Z
//! Digest: SHA-256=<base64(sha256(body))>
//! Signature: <base64(ed25519 signature)>
//! Signature-Input: sig1=("@method" "@path" "host" "date" "digest");keyid="3f9a2c0d1e2b4a6c";alg="ed25519"
//! ```
//!
//! The signed content is the canonical signing string — the five covered
//! components rendered as `<token>: <value>` lines joined by single newlines:
//!
//! ```text
//! @method: POST
//! @path: /federation/inbox
//! host: relay-b.example
//! date: 2026-08-02T10:15:30Z
//! digest: SHA-256=...
//! ```
//!
//! Verification reconstructs the signing string from the inbound headers; the
//! digest is recomputed from the raw body bytes and matched verbatim against
//! the `Digest` header, so no parsed representation of the body is trusted.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sha2::{Digest as _, Sha256};

use crate::error::FederationError;
use crate::identity::{verify_signature, ServerIdentity};

/// Maximum allowed clock skew between relays (5 minutes).
pub const MAX_SKEW_SECS: i64 = 300;

/// The covered components, in signing order.
const COMPONENTS: [&str; 5] = ["@method", "@path", "host", "date", "digest"];

// ─── Signing ─────────────────────────────────────────────────────────────────

/// The four authentication headers emitted on an outbound signed request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub date: String,
    pub digest: String,
    pub signature: String,
    pub signature_input: String,
}

/// Compute the `Digest` header value for a request body.
pub fn body_digest(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    format!("SHA-256={}", base64::engine::general_purpose::STANDARD.encode(hash))
}

/// Sign an outbound federation request.
///
/// * `identity` — this relay's signing identity
/// * `method`   — HTTP method, uppercase (e.g. `"POST"`)
/// * `path`     — request path (e.g. `"/federation/inbox"`)
/// * `host`     — the *target* host the request is addressed to
/// * `body`     — raw request body bytes
pub fn sign_request(
    identity: &ServerIdentity,
    method: &str,
    path: &str,
    host: &str,
    body: &[u8],
) -> SignedHeaders {
    let date = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let digest = body_digest(body);
    let signing = signing_string(method, path, host, &date, &digest);
    let signature = identity.sign_bytes(signing.as_bytes());

    let components = COMPONENTS.map(|c| format!("\"{c}\"")).join(" ");
    let signature_input =
        format!("sig1=({components});keyid=\"{}\";alg=\"ed25519\"", identity.server_id);

    SignedHeaders { date, digest, signature, signature_input }
}

// ─── Verification ────────────────────────────────────────────────────────────

/// The authentication headers as received on an inbound request. The route
/// layer extracts these (raising `MissingHeader` for any absent one) before
/// handing off to [`verify_request`].
#[derive(Debug, Clone)]
pub struct InboundSignature {
    pub date: String,
    pub digest: String,
    pub signature: String,
    pub signature_input: String,
}

impl InboundSignature {
    /// Extract the `keyid` from the `Signature-Input` header, so the caller
    /// can resolve the sending peer before full verification.
    pub fn key_id(&self) -> Result<String, FederationError> {
        parse_key_id(&self.signature_input)
    }
}

/// Verify an inbound federation request.
///
/// Order of checks: digest binding (raw bytes vs `Digest` header), covered
/// component list, date skew, then the Ed25519 signature itself.
pub fn verify_request(
    sig: &InboundSignature,
    method: &str,
    path: &str,
    host: &str,
    body: &[u8],
    peer_public_key_b64: &str,
) -> Result<(), FederationError> {
    // Digest must be recomputed from the raw bytes and matched verbatim.
    if body_digest(body) != sig.digest {
        return Err(FederationError::BodyModified);
    }

    let covered = parse_components(&sig.signature_input)?;
    if covered != COMPONENTS {
        return Err(FederationError::MalformedSignatureInput(format!(
            "unexpected component list: {}",
            covered.join(" ")
        )));
    }

    check_date_skew(&sig.date, Utc::now())?;

    let signing = signing_string(method, path, host, &sig.date, &sig.digest);
    verify_signature(peer_public_key_b64, &sig.signature, signing.as_bytes())
}

/// Reject dates skewed more than [`MAX_SKEW_SECS`] from `now`.
fn check_date_skew(date: &str, now: DateTime<Utc>) -> Result<(), FederationError> {
    let parsed = DateTime::parse_from_rfc3339(date)
        .map_err(|_| FederationError::MalformedSignatureInput(format!("bad date: {date}")))?
        .with_timezone(&Utc);
    let skew = (now - parsed).num_seconds().abs();
    if skew > MAX_SKEW_SECS {
        return Err(FederationError::ClockSkew(MAX_SKEW_SECS));
    }
    Ok(())
}

// ─── Internals ───────────────────────────────────────────────────────────────

/// Build the canonical signing string for the covered components.
fn signing_string(method: &str, path: &str, host: &str, date: &str, digest: &str) -> String {
    format!(
        "@method: {}\n@path: {}\nhost: {}\ndate: {}\ndigest: {}",
        method.to_uppercase(),
        path,
        host,
        date,
        digest,
    )
}

fn parse_key_id(signature_input: &str) -> Result<String, FederationError> {
    for param in signature_input.split(';') {
        if let Some(v) = param.trim().strip_prefix("keyid=\"").and_then(|s| s.strip_suffix('"')) {
            return Ok(v.to_owned());
        }
    }
    Err(FederationError::MalformedSignatureInput("missing 'keyid'".into()))
}

fn parse_components(signature_input: &str) -> Result<Vec<String>, FederationError> {
    let open = signature_input
        .find('(')
        .ok_or_else(|| FederationError::MalformedSignatureInput("missing component list".into()))?;
    let close = signature_input[open..]
        .find(')')
        .map(|i| open + i)
        .ok_or_else(|| FederationError::MalformedSignatureInput("unterminated component list".into()))?;

    Ok(signature_input[open + 1..close]
        .split_whitespace()
        .map(|c| c.trim_matches('"').to_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ServerIdentity;
    use chrono::Duration;

    fn test_identity() -> ServerIdentity {
        let dir = std::env::temp_dir().join(format!("tez-sig-{}", uuid::Uuid::new_v4()));
        let id = ServerIdentity::load_or_generate(dir.to_str().unwrap(), "a.example").unwrap();
        std::fs::remove_dir_all(&dir).ok();
        id
    }

    fn inbound(h: &SignedHeaders) -> InboundSignature {
        InboundSignature {
            date: h.date.clone(),
            digest: h.digest.clone(),
            signature: h.signature.clone(),
            signature_input: h.signature_input.clone(),
        }
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let id = test_identity();
        let body = br#"{"hello":"world"}"#;
        let headers = sign_request(&id, "POST", "/federation/inbox", "b.example", body);

        verify_request(
            &inbound(&headers),
            "POST",
            "/federation/inbox",
            "b.example",
            body,
            &id.public_key_base64(),
        )
        .expect("round trip should verify");
    }

    #[test]
    fn any_single_change_breaks_verification() {
        let id = test_identity();
        let body = br#"{"hello":"world"}"#.to_vec();
        let headers = sign_request(&id, "POST", "/federation/inbox", "b.example", &body);
        let pubkey = id.public_key_base64();

        // Tampered body → digest mismatch.
        let mut tampered = body.clone();
        tampered[2] ^= 1;
        assert!(matches!(
            verify_request(&inbound(&headers), "POST", "/federation/inbox", "b.example", &tampered, &pubkey),
            Err(FederationError::BodyModified)
        ));

        // Different method, path, or host → bad signature.
        for (m, p, h) in [
            ("PUT", "/federation/inbox", "b.example"),
            ("POST", "/federation/outbox", "b.example"),
            ("POST", "/federation/inbox", "c.example"),
        ] {
            assert!(matches!(
                verify_request(&inbound(&headers), m, p, h, &body, &pubkey),
                Err(FederationError::InvalidSignature)
            ));
        }

        // Altered date → signature over a different string.
        let mut stale = inbound(&headers);
        stale.date = (Utc::now() - Duration::seconds(30))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        assert!(verify_request(&stale, "POST", "/federation/inbox", "b.example", &body, &pubkey).is_err());
    }

    #[test]
    fn stale_date_is_rejected() {
        assert!(check_date_skew(
            &(Utc::now() - Duration::minutes(6)).to_rfc3339(),
            Utc::now()
        )
        .is_err());
        assert!(check_date_skew(
            &(Utc::now() + Duration::minutes(6)).to_rfc3339(),
            Utc::now()
        )
        .is_err());
        assert!(check_date_skew(&(Utc::now() - Duration::minutes(4)).to_rfc3339(), Utc::now()).is_ok());
    }

    #[test]
    fn key_id_extraction() {
        let id = test_identity();
        let headers = sign_request(&id, "POST", "/federation/inbox", "b.example", b"{}");
        assert_eq!(inbound(&headers).key_id().unwrap(), id.server_id);
    }

    #[test]
    fn rejects_reordered_component_list() {
        let id = test_identity();
        let headers = sign_request(&id, "POST", "/federation/inbox", "b.example", b"{}");
        let mut sig = inbound(&headers);
        sig.signature_input =
            format!("sig1=(\"@path\" \"@method\" \"host\" \"date\" \"digest\");keyid=\"{}\"", id.server_id);
        assert!(matches!(
            verify_request(&sig, "POST", "/federation/inbox", "b.example", b"{}", &id.public_key_base64()),
            Err(FederationError::MalformedSignatureInput(_))
        ));
    }
}
