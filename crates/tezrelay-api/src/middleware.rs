//! Middleware — bearer-token authentication for the user API.
//!
//! Token issuance is external to the relay; we only validate the credential
//! and surface its subject as the acting user id.

use axum::{extract::Request, http::header, middleware::Next, response::Response};
use tezrelay_common::error::RelayError;

/// Authentication context extracted from the Authorization header.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: uuid::Uuid,
}

/// Extract and validate the JWT from the `Authorization: Bearer <token>` header.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, RelayError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(RelayError::Unauthorized)?;

    let token = auth_header.strip_prefix("Bearer ").ok_or(RelayError::Unauthorized)?;

    let config = tezrelay_common::config::get();
    let claims =
        tezrelay_common::auth::validate_token(token, &config.auth.jwt_secret, &config.auth.jwt_issuer)
            .map_err(|_| RelayError::InvalidToken)?;

    let user_id = claims.sub.parse::<uuid::Uuid>().map_err(|_| RelayError::InvalidToken)?;

    // Insert auth context into request extensions for handlers to use
    request.extensions_mut().insert(AuthContext { user_id });

    Ok(next.run(request).await)
}
