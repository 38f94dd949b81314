//! Identity resolution for bearer credentials.
//!
//! The service never keeps a session: every request carries (or omits)
//! a bearer token, and resolution is a pure `token -> Option<user id>`
//! lookup. The trait boundary lets tests substitute a static resolver.

pub mod jwt;

pub use jwt::{JwtConfig, JwtIdentity};

use axum::http::{HeaderMap, header};

/// Resolves a bearer credential to a user id.
///
/// Returning `None` means the caller is anonymous; that is not an
/// error, it simply fails the ownership predicate downstream.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<String>;
}

/// Extract the bearer token from an `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }
}
