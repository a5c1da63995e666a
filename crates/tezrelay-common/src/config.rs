//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;
use uuid::Uuid;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG.get().expect("Config not initialized. Call tezrelay_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.port", 8420)?
        .set_default("server.relay_host", "localhost")?
        .set_default("server.data_dir", "./data")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 5)?
        .set_default("auth.jwt_issuer", "tezrelay")?
        .set_default("limits.max_tez_size_bytes", 1_048_576)? // 1 MiB
        .set_default("limits.max_context_items", 50)?
        .set_default("limits.max_recipients", 100)?
        .set_default("limits.default_page_size", 20)?
        .set_default("limits.max_page_size", 100)?
        .set_default("federation.enabled", true)?
        .set_default("federation.mode", "allowlist")?
        .set_default("federation.pump_interval_secs", 5)?
        .set_default("federation.max_backoff_secs", 3600)?
        .set_default("admin_user_ids", Vec::<String>::new())?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (RELAY_SERVER__RELAY_HOST, RELAY_DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("RELAY")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("admin_user_ids"),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    pub federation: FederationConfig,
    /// Users allowed to call the `/admin/federation/*` endpoints.
    #[serde(default)]
    pub admin_user_ids: Vec<Uuid>,
}

impl AppConfig {
    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Public host name of this relay, as it appears in tez-addresses
    /// (e.g. "relay.example.com"). Immutable at runtime.
    pub relay_host: String,
    /// Directory holding the server identity key files.
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256) — should be 256+ bits of entropy
    pub jwt_secret: String,
    /// Expected `iss` claim on inbound bearer tokens.
    pub jwt_issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Upper bound on `surfaceText` length in bytes.
    pub max_tez_size_bytes: usize,
    /// Maximum context layers attached to a single tez.
    pub max_context_items: usize,
    /// Maximum recipients per share.
    pub max_recipients: usize,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

/// Peer admission mode for newly discovered relays.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FederationMode {
    /// New peers land in `pending` and need operator action to be trusted.
    Allowlist,
    /// New peers are trusted automatically.
    Open,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationConfig {
    pub enabled: bool,
    pub mode: FederationMode,
    /// Seconds between outbound queue drain passes.
    pub pump_interval_secs: u64,
    /// Ceiling on exponential retry backoff.
    pub max_backoff_secs: u64,
}
