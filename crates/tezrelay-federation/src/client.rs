//! Outbound discovery client — fetches a peer's self-description.
//!
//! Registration is pull-based: an operator points this relay at a host, we
//! fetch `https://<host>/federation/server-info`, check that the advertised
//! server id is actually derived from the advertised key, and hand the result
//! to the trust registry.

use std::time::Duration;

use serde::Deserialize;

use crate::error::FederationError;
use crate::identity::derive_server_id;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// A peer's `/federation/server-info` document.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfoDoc {
    pub host: String,
    pub server_id: String,
    pub public_key: String,
    pub protocol_version: String,
    pub federation: FederationInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FederationInfo {
    pub enabled: bool,
    pub inbox: String,
}

/// Fetch and sanity-check a peer's self-description. The discovery fetch is
/// unauthenticated; trust comes later, from the operator or admission mode.
pub async fn fetch_server_info(host: &str) -> Result<ServerInfoDoc, FederationError> {
    let http = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(TOTAL_TIMEOUT)
        .user_agent(concat!("tezrelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build discovery http client");

    let url = format!("https://{host}/federation/server-info");
    tracing::debug!("fetching server info from {url}");

    let doc: ServerInfoDoc = http
        .get(&url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| FederationError::RemoteHttp { host: host.to_owned(), detail: e.to_string() })?
        .json()
        .await?;

    if derive_server_id(&doc.public_key) != doc.server_id {
        return Err(FederationError::InvalidSignature);
    }

    Ok(doc)
}
