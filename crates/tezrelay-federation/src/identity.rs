//! Server identity — the relay's long-lived Ed25519 key pair.
//!
//! On first start the relay generates a key pair and persists it as two files
//! under `<data_dir>/identity/`: `server.key` (base64 of the 32-byte seed,
//! mode 0600 on unix) and `server.pub` (base64 of the verifying key).
//! Subsequent starts load the same identity.
//!
//! # Server IDs
//! The stable server id is the first 16 hex characters of sha256 over the
//! base64-encoded public key — the same string peers store in their registry
//! and use as the signature `keyId`.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::error::FederationError;

const KEY_FILE: &str = "server.key";
const PUB_FILE: &str = "server.pub";

/// This relay's signing identity. The single source of truth for all
/// outbound federation signatures. Immutable after startup.
pub struct ServerIdentity {
    /// Public host name from configuration (e.g. `relay.example.com`).
    pub host: String,
    /// First 16 hex chars of sha256 over the base64 public key.
    pub server_id: String,
    signing_key: SigningKey,
}

impl ServerIdentity {
    /// Load the identity from `<data_dir>/identity/`, generating and
    /// persisting a fresh key pair if none exists yet.
    pub fn load_or_generate(data_dir: &str, host: &str) -> Result<Self, FederationError> {
        let dir = Path::new(data_dir).join("identity");
        let key_path = dir.join(KEY_FILE);

        if key_path.exists() {
            let kp = Self::load(&key_path, host)?;
            tracing::info!(server_id = %kp.server_id, "loaded server identity");
            return Ok(kp);
        }

        tracing::warn!("no server identity found — generating a new Ed25519 key pair");
        let signing_key = SigningKey::generate(&mut OsRng);
        let identity = Self::from_signing_key(signing_key, host);
        identity.persist(&dir)?;
        tracing::info!(server_id = %identity.server_id, "generated and persisted server identity");
        Ok(identity)
    }

    fn load(key_path: &PathBuf, host: &str) -> Result<Self, FederationError> {
        let encoded = std::fs::read_to_string(key_path)?;
        let seed = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| FederationError::KeyLoad(format!("bad base64 in {KEY_FILE}: {e}")))?;
        let bytes: [u8; 32] = seed
            .as_slice()
            .try_into()
            .map_err(|_| FederationError::KeyLoad("seed must be exactly 32 bytes".into()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes), host))
    }

    fn from_signing_key(signing_key: SigningKey, host: &str) -> Self {
        let public_b64 = base64::engine::general_purpose::STANDARD
            .encode(signing_key.verifying_key().as_bytes());
        Self {
            host: host.to_owned(),
            server_id: derive_server_id(&public_b64),
            signing_key,
        }
    }

    fn persist(&self, dir: &Path) -> Result<(), FederationError> {
        std::fs::create_dir_all(dir)?;
        let seed_b64 =
            base64::engine::general_purpose::STANDARD.encode(self.signing_key.to_bytes());
        let key_path = dir.join(KEY_FILE);
        std::fs::write(&key_path, &seed_b64)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::write(dir.join(PUB_FILE), self.public_key_base64())?;
        Ok(())
    }

    /// Return the public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Return the public key as a base64-encoded string, as advertised to peers.
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Sign arbitrary bytes and return the base64-encoded signature.
    pub fn sign_bytes(&self, bytes: &[u8]) -> String {
        let sig = self.signing_key.sign(bytes);
        base64::engine::general_purpose::STANDARD.encode(sig.to_bytes())
    }
}

/// Derive a stable 16-hex server id from a base64-encoded public key.
pub fn derive_server_id(public_key_b64: &str) -> String {
    let digest = Sha256::digest(public_key_b64.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Verify an Ed25519 signature.
///
/// * `public_key_b64` — base64-encoded 32-byte verifying key
/// * `sig_b64`        — base64-encoded 64-byte signature
/// * `message`        — original signed bytes
pub fn verify_signature(
    public_key_b64: &str,
    sig_b64: &str,
    message: &[u8],
) -> Result<(), FederationError> {
    use ed25519_dalek::Verifier;

    let pubkey_bytes = base64::engine::general_purpose::STANDARD
        .decode(public_key_b64)
        .map_err(|_| FederationError::InvalidSignature)?;

    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| FederationError::InvalidSignature)?;

    let verifying_key = VerifyingKey::from_bytes(
        pubkey_bytes
            .as_slice()
            .try_into()
            .map_err(|_| FederationError::InvalidSignature)?,
    )
    .map_err(|_| FederationError::InvalidSignature)?;

    let signature = ed25519_dalek::Signature::from_bytes(
        sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| FederationError::InvalidSignature)?,
    );

    verifying_key.verify(message, &signature).map_err(|_| FederationError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_sign_verify() {
        let dir = std::env::temp_dir().join(format!("tez-id-{}", uuid::Uuid::new_v4()));
        let id = ServerIdentity::load_or_generate(dir.to_str().unwrap(), "a.example").unwrap();
        let msg = b"hello federation";
        let sig = id.sign_bytes(msg);
        verify_signature(&id.public_key_base64(), &sig, msg).expect("signature should verify");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reload_is_stable() {
        let dir = std::env::temp_dir().join(format!("tez-id-{}", uuid::Uuid::new_v4()));
        let first = ServerIdentity::load_or_generate(dir.to_str().unwrap(), "a.example").unwrap();
        let second = ServerIdentity::load_or_generate(dir.to_str().unwrap(), "a.example").unwrap();
        assert_eq!(first.server_id, second.server_id);
        assert_eq!(first.public_key_base64(), second.public_key_base64());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn server_id_is_16_hex() {
        let id = derive_server_id("c29tZSBwdWJsaWMga2V5");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic for the same key.
        assert_eq!(id, derive_server_id("c29tZSBwdWJsaWMga2V5"));
    }
}
