//! # tezrelay-federation
//!
//! Server-to-server federation layer for the Tez relay.
//!
//! ## Architecture
//!
//! Federation lets relays deliver tez to users hosted elsewhere. A share whose
//! recipient list names remote addresses is partitioned by host, wrapped in a
//! content-addressed bundle per host, queued, and pushed to each peer's inbox
//! over a signed HTTP request.
//!
//! ```text
//!  relay-a.example              relay-b.example
//!       │                             │
//!       ├── POST /federation/inbox ─► │   (signed request + hashed bundle)
//!       │◄─ 200 {accepted, ...} ───── │
//! ```
//!
//! ## Key concepts
//!
//! - **Server identity** (`identity.rs`): each relay holds an Ed25519 key pair
//!   persisted under its data directory. The 16-hex `server_id` is derived
//!   from the public key and doubles as the signature `keyId`.
//! - **Signed requests** (`signatures.rs`): every S2S request carries `Date`,
//!   `Digest`, `Signature`, and `Signature-Input` headers over a canonical
//!   signing string; the digest binds the raw body bytes.
//! - **Bundles** (`bundle.rs`): the delivery envelope is canonical JSON with a
//!   self-certifying `bundle_hash`, verified independently of the transport
//!   signature.
//! - **Routing** (`routing.rs`): splits recipient addresses into local ids and
//!   per-host remote groups.
//! - **Delivery pump** (`pump.rs`): drains the outbound queue, FIFO per host,
//!   with exponential backoff on transient failures.

pub mod bundle;
pub mod client;
pub mod error;
pub mod identity;
pub mod pump;
pub mod routing;
pub mod signatures;

pub use bundle::{Bundle, PROTOCOL_VERSION};
pub use error::FederationError;
pub use identity::ServerIdentity;
pub use pump::DeliveryPump;
pub use routing::RecipientSplit;
