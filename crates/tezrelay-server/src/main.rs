//! # Tez Relay Server
//!
//! Main binary. Boots configuration, tracing, the database, the server
//! identity, the outbound delivery pump, and the HTTP API — user routes and
//! federation routes on one port.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;

use tezrelay_api::{build_router, AppState};
use tezrelay_db::Database;
use tezrelay_federation::{DeliveryPump, ServerIdentity};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "tezrelay",
    about = "Server-to-server relay for context-rich messages",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the relay server.
    Serve {
        /// HTTP port override (default from config: 8420).
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Print this relay's identity (host, server id, public key) and exit.
    Identity,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port } => run_server(port).await,
        Command::Identity => print_identity(),
    }
}

// ── Server startup ────────────────────────────────────────────────────────────

async fn run_server(port_override: Option<u16>) -> anyhow::Result<()> {
    // ── Configuration ─────────────────────────────────────────────────────────
    let config = tezrelay_common::config::init()?;

    // ── Tracing ───────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tezrelay=info,tower_http=info".into()),
        )
        .with_thread_ids(false)
        .init();

    tracing::info!("Starting tezrelay v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ──────────────────────────────────────────────────────────────
    let db = Database::connect(config).await?;
    db.migrate().await?;
    tracing::info!("Database ready");

    // ── Server identity ───────────────────────────────────────────────────────
    let identity = Arc::new(ServerIdentity::load_or_generate(
        &config.server.data_dir,
        &config.server.relay_host,
    )?);
    tracing::info!(
        host = %identity.host,
        server_id = %identity.server_id,
        "Server identity ready"
    );

    // ── Outbound delivery pump ────────────────────────────────────────────────
    if config.federation.enabled {
        let pump = DeliveryPump::new(
            db.pool.clone(),
            identity.clone(),
            config.federation.pump_interval_secs,
            config.federation.max_backoff_secs,
        );
        tokio::spawn(pump.run());
    } else {
        tracing::info!("Federation disabled — outbound pump not started");
    }

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let state = AppState::new(db, identity);
    let router = build_router(state);

    let port = port_override.unwrap_or(config.server.port);
    let addr = SocketAddr::new("0.0.0.0".parse()?, port);
    tracing::info!("Relay listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

// ── Identity inspection ───────────────────────────────────────────────────────

fn print_identity() -> anyhow::Result<()> {
    let config = tezrelay_common::config::init()?;
    let identity =
        ServerIdentity::load_or_generate(&config.server.data_dir, &config.server.relay_host)?;
    println!("host:       {}", identity.host);
    println!("server_id:  {}", identity.server_id);
    println!("public_key: {}", identity.public_key_base64());
    Ok(())
}
