//! Time-limited signed URLs for file reads.
//!
//! Every read of a payload goes through a URL carrying an expiry
//! timestamp and a signature over `bucket/path/expiry`. URLs are minted
//! per request and never stored.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::models::record::Bucket;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignError {
    #[error("signed url has expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
}

/// A minted signed URL. Ephemeral: consumed by the client within its
/// validity window and never persisted server-side.
#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub bucket: Bucket,
    pub path: String,
    pub expires_at: DateTime<Utc>,
    pub signature: String,
}

impl SignedUrl {
    /// Render the URL against the service's public base.
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}/files/{}/{}?token={}&expires={}",
            base_url,
            self.bucket,
            self.path,
            self.signature,
            self.expires_at.timestamp()
        )
    }
}

/// Signs and verifies file-access URLs.
pub struct UrlSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl UrlSigner {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            secret: secret.to_vec(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Mint a signed URL for `path` in `bucket`, expiring after the
    /// configured TTL.
    pub fn sign(&self, bucket: Bucket, path: &str) -> SignedUrl {
        let expires_at = Utc::now() + self.ttl;
        let signature = self.digest(bucket, path, expires_at.timestamp());
        SignedUrl {
            bucket,
            path: path.to_string(),
            expires_at,
            signature,
        }
    }

    /// Check expiry, then the signature, for an incoming read request.
    pub fn verify(
        &self,
        bucket: Bucket,
        path: &str,
        expires_ts: i64,
        token: &str,
    ) -> Result<(), SignError> {
        if Utc::now().timestamp() > expires_ts {
            return Err(SignError::Expired);
        }
        let expected = self.digest(bucket, path, expires_ts);
        if expected.as_bytes().ct_eq(token.as_bytes()).into() {
            Ok(())
        } else {
            Err(SignError::InvalidSignature)
        }
    }

    fn digest(&self, bucket: Bucket, path: &str, expires_ts: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(format!("{}/{}/{}", bucket, path, expires_ts).as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new(b"test-secret", 3600)
    }

    #[test]
    fn sign_and_verify() {
        let s = signer();
        let signed = s.sign(Bucket::Papers, "u1/123_exam.pdf");
        assert!(!signed.signature.is_empty());
        assert!(
            s.verify(
                Bucket::Papers,
                "u1/123_exam.pdf",
                signed.expires_at.timestamp(),
                &signed.signature,
            )
            .is_ok()
        );
    }

    #[test]
    fn expired_url_is_rejected() {
        let s = signer();
        let past = Utc::now().timestamp() - 10;
        let token = s.digest(Bucket::Papers, "u1/file.pdf", past);
        assert_eq!(
            s.verify(Bucket::Papers, "u1/file.pdf", past, &token),
            Err(SignError::Expired)
        );
    }

    #[test]
    fn tampered_path_is_rejected() {
        let s = signer();
        let signed = s.sign(Bucket::Papers, "u1/file.pdf");
        assert_eq!(
            s.verify(
                Bucket::Papers,
                "u1/other.pdf",
                signed.expires_at.timestamp(),
                &signed.signature,
            ),
            Err(SignError::InvalidSignature)
        );
    }

    #[test]
    fn bucket_is_part_of_the_signature() {
        let s = signer();
        let signed = s.sign(Bucket::Papers, "u1/file.pdf");
        assert_eq!(
            s.verify(
                Bucket::Notes,
                "u1/file.pdf",
                signed.expires_at.timestamp(),
                &signed.signature,
            ),
            Err(SignError::InvalidSignature)
        );
    }

    #[test]
    fn url_shape() {
        let s = signer();
        let signed = s.sign(Bucket::Notes, "u2/notes.pdf");
        let url = signed.to_url("http://127.0.0.1:3000");
        assert!(url.starts_with("http://127.0.0.1:3000/files/notes/u2/notes.pdf?token="));
        assert!(url.contains("&expires="));
    }
}
