//! # tezrelay-api
//!
//! HTTP layer for the relay. Provides the bearer-authenticated user API, the
//! signature-authenticated server-to-server federation API, and the admin
//! surface for peer trust management.

pub mod acl;
pub mod audit;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tezrelay_db::Database;
use tezrelay_federation::ServerIdentity;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// This relay's signing identity — immutable after startup.
    pub identity: Arc<ServerIdentity>,
    /// Best-effort journal writer for non-admission mutations and reads.
    pub audit: audit::AuditSink,
}

impl AppState {
    pub fn new(db: Database, identity: Arc<ServerIdentity>) -> Self {
        let audit = audit::AuditSink::new(db.pool.clone());
        Self { db, identity, audit }
    }
}

/// Build the complete router: user API, federation API, admin API.
pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .merge(routes::teams::router())
        .merge(routes::contacts::router())
        .merge(routes::conversations::router())
        .merge(routes::tez::router())
        .merge(routes::unread::router())
        .merge(routes::admin::router());

    Router::new()
        .merge(user_routes)
        .merge(routes::federation::router())
        .merge(routes::health::router())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}
