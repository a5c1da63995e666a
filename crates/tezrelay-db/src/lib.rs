//! # tezrelay-db
//!
//! Database layer for the relay. One PostgreSQL database holds every entity:
//! teams, contacts, conversations, tez (with context and recipients), peers,
//! the outbound delivery queue, and the append-only audit journal.
//!
//! Repository functions are free `async fn`s over `&PgPool`; multi-row
//! admission writes open their own transaction so no observer ever sees a
//! partially formed tez.

pub mod repository;

use anyhow::Result;
use sqlx::PgPool;

/// Shared database handle passed through Axum state.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL.
    pub async fn connect(config: &tezrelay_common::config::AppConfig) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }
}

/// Cheap connectivity probe for the health endpoint.
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
