//! Shared JWT authentication utilities.
//!
//! The relay does not issue tokens — an external identity provider does. We
//! only validate inbound bearer tokens and extract the acting user id from
//! the `sub` claim. Claims and validation live here so both the API layer
//! and tooling can use them without circular dependencies.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims expected on inbound bearer tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as string)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Validate and decode a JWT token, checking signature, expiry, and issuer.
pub fn validate_token(
    token: &str,
    secret: &str,
    issuer: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[issuer]);
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(secret: &str, iss: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            iss: iss.to_string(),
            iat: now,
            exp: now + exp_offset,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let token = mint("s3cret", "tezrelay", 600);
        let claims = validate_token(&token, "s3cret", "tezrelay").unwrap();
        assert_eq!(claims.iss, "tezrelay");
    }

    #[test]
    fn rejects_wrong_secret_and_wrong_issuer() {
        let token = mint("s3cret", "tezrelay", 600);
        assert!(validate_token(&token, "other", "tezrelay").is_err());
        assert!(validate_token(&token, "s3cret", "someone-else").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = mint("s3cret", "tezrelay", -600);
        assert!(validate_token(&token, "s3cret", "tezrelay").is_err());
    }
}
