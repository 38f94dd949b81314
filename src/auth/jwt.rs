//! JWT access tokens.
//!
//! Stateless HS256 validation: no database lookup, no cached session.
//! Expired or malformed tokens resolve to anonymous rather than
//! erroring — unauthenticated access to approved content is allowed.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::IdentityResolver;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to generate access token")]
    TokenGeneration,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    /// Issued at (Unix epoch seconds).
    pub iat: i64,
    /// Expiration (Unix epoch seconds).
    pub exp: i64,
    /// Issuer.
    pub iss: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub token_ttl: Duration,
    pub issuer: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl: Duration::hours(1),
            issuer: "study-share".to_string(),
        }
    }
}

/// HS256 token issuer/validator.
#[derive(Clone)]
pub struct JwtIdentity {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtIdentity {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue an access token for a user.
    pub fn issue(&self, user_id: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.config.token_ttl).timestamp(),
            iss: self.config.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGeneration)
    }

    fn validate(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.validate_aud = false;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .ok()
    }
}

impl IdentityResolver for JwtIdentity {
    fn resolve(&self, token: &str) -> Option<String> {
        self.validate(token).map(|claims| claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> JwtIdentity {
        JwtIdentity::new(JwtConfig::new("test-secret"))
    }

    #[test]
    fn issue_and_resolve() {
        let jwt = identity();
        let token = jwt.issue("u1").unwrap();
        assert_eq!(jwt.resolve(&token), Some("u1".to_string()));
    }

    #[test]
    fn garbage_resolves_to_anonymous() {
        let jwt = identity();
        assert_eq!(jwt.resolve("not-a-token"), None);
        assert_eq!(jwt.resolve(""), None);
    }

    #[test]
    fn wrong_secret_resolves_to_anonymous() {
        let token = identity().issue("u1").unwrap();
        let other = JwtIdentity::new(JwtConfig::new("other-secret"));
        assert_eq!(other.resolve(&token), None);
    }

    #[test]
    fn expired_token_resolves_to_anonymous() {
        let mut config = JwtConfig::new("test-secret");
        config.token_ttl = Duration::seconds(-120);
        let jwt = JwtIdentity::new(config);
        let token = jwt.issue("u1").unwrap();
        // Resolution must not error; the caller is simply anonymous.
        assert_eq!(identity().resolve(&token), None);
    }
}
