//! AccessService — gates every read of stored files.
//!
//! Given a bucket, a file path, and a record id, it verifies that the
//! record exists, that the supplied path equals the stored one, and
//! that the caller is either the owner or the record is approved; only
//! then does it mint a short-lived signed URL. No permanent or
//! owner-agnostic URL ever reaches a client, and this path performs no
//! database writes.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::IdentityResolver;
use crate::models::record::{Bucket, RecordStatus};
use crate::services::record_service::{RecordError, RecordService};
use crate::services::signed_url::UrlSigner;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Missing required parameters: bucket, filePath, itemId")]
    MissingParams,
    #[error("Invalid bucket. Must be 'papers' or 'notes'")]
    InvalidBucket,
    #[error("Item not found")]
    ItemNotFound,
    #[error("File path mismatch")]
    PathMismatch,
    #[error("This file is not available for public access")]
    NotAccessible,
    #[error("Failed to generate download URL")]
    Upstream(#[source] RecordError),
}

#[derive(Clone)]
pub struct AccessService {
    records: RecordService,
    identity: Arc<dyn IdentityResolver>,
    signer: Arc<UrlSigner>,
    public_base_url: String,
}

impl AccessService {
    pub fn new(
        records: RecordService,
        identity: Arc<dyn IdentityResolver>,
        signer: Arc<UrlSigner>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            records,
            identity,
            signer,
            public_base_url: public_base_url.into(),
        }
    }

    /// Authorize a file access request and mint a signed URL.
    ///
    /// Single-shot decision: no retries, no writes. Every failure maps
    /// to a structured error the HTTP layer renders verbatim.
    pub async fn issue_signed_url(
        &self,
        bucket: Option<&str>,
        file_path: Option<&str>,
        item_id: Option<&str>,
        bearer: Option<&str>,
    ) -> Result<String, AccessError> {
        let (bucket_raw, file_path, item_id) = match (bucket, file_path, item_id) {
            (Some(b), Some(f), Some(i)) if !b.is_empty() && !f.is_empty() && !i.is_empty() => {
                (b, f, i)
            }
            _ => return Err(AccessError::MissingParams),
        };

        // Bucket membership is checked before any lookup.
        let bucket = Bucket::parse(bucket_raw).ok_or(AccessError::InvalidBucket)?;

        let record = self
            .records
            .fetch(bucket, item_id)
            .await
            .map_err(|err| match err {
                RecordError::NotFound => AccessError::ItemNotFound,
                other => AccessError::Upstream(other),
            })?;

        // The caller cannot reach an arbitrary path by pairing it with a
        // valid record id for a different file.
        if record.file_path != file_path {
            debug!(
                "path mismatch for {} item {}: requested {}",
                bucket, item_id, file_path
            );
            return Err(AccessError::PathMismatch);
        }

        // Absent or invalid credentials mean an anonymous caller, not an
        // error; anonymous reads of approved content are allowed.
        let caller = bearer.and_then(|token| self.identity.resolve(token));

        let is_approved = record.status == RecordStatus::Approved;
        let is_owner = caller.as_deref() == Some(record.owner_id.as_str());

        if !is_approved && !is_owner {
            debug!(
                "access denied for {} item {}: status={} owner match={}",
                bucket, item_id, record.status, is_owner
            );
            return Err(AccessError::NotAccessible);
        }

        info!(
            "access granted for {} item {}: approved={} owner={}",
            bucket, item_id, is_approved, is_owner
        );

        let signed = self.signer.sign(bucket, file_path);
        Ok(signed.to_url(&self.public_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record_service::RecordService;
    use crate::validation::ValidatedUpload;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Fixed-table identity: token "tok-<id>" resolves to "<id>".
    struct StubIdentity;

    impl IdentityResolver for StubIdentity {
        fn resolve(&self, token: &str) -> Option<String> {
            token.strip_prefix("tok-").map(str::to_string)
        }
    }

    async fn fixture() -> (AccessService, RecordService) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let sql = include_str!("../../migrations/0001_init.sql");
        for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        let records = RecordService::new(Arc::new(pool));
        let access = AccessService::new(
            records.clone(),
            Arc::new(StubIdentity),
            Arc::new(UrlSigner::new(b"test-secret", 3600)),
            "http://127.0.0.1:3000",
        );
        (access, records)
    }

    async fn seed(records: &RecordService, owner: &str, path: &str) -> String {
        records
            .create(
                Bucket::Papers,
                owner,
                ValidatedUpload {
                    title: "Exam".into(),
                    subject: "Mathematics".into(),
                    level: "Undergraduate".into(),
                    university: None,
                    year: None,
                    description: None,
                    chapter_topic: None,
                    file_path: path.into(),
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn owner_can_access_pending_record() {
        let (access, records) = fixture().await;
        let id = seed(&records, "u1", "u1/123_exam.pdf").await;

        let url = access
            .issue_signed_url(
                Some("papers"),
                Some("u1/123_exam.pdf"),
                Some(&id),
                Some("tok-u1"),
            )
            .await
            .unwrap();
        assert!(url.contains("/files/papers/u1/123_exam.pdf?token="));
    }

    #[tokio::test]
    async fn non_owner_is_denied_on_pending_record() {
        let (access, records) = fixture().await;
        let id = seed(&records, "u1", "u1/123_exam.pdf").await;

        let err = access
            .issue_signed_url(
                Some("papers"),
                Some("u1/123_exam.pdf"),
                Some(&id),
                Some("tok-u2"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotAccessible));
    }

    #[tokio::test]
    async fn anonymous_can_access_approved_record() {
        let (access, records) = fixture().await;
        let id = seed(&records, "u1", "u1/123_exam.pdf").await;
        records
            .set_status(Bucket::Papers, &id, RecordStatus::Approved)
            .await
            .unwrap();

        let url = access
            .issue_signed_url(Some("papers"), Some("u1/123_exam.pdf"), Some(&id), None)
            .await
            .unwrap();
        assert!(url.contains("token="));
    }

    #[tokio::test]
    async fn invalid_credential_counts_as_anonymous() {
        let (access, records) = fixture().await;
        let id = seed(&records, "u1", "u1/123_exam.pdf").await;

        // Garbage token on a pending record: anonymous, hence denied.
        let err = access
            .issue_signed_url(
                Some("papers"),
                Some("u1/123_exam.pdf"),
                Some(&id),
                Some("garbage"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotAccessible));
    }

    #[tokio::test]
    async fn path_mismatch_beats_ownership_and_status() {
        let (access, records) = fixture().await;
        let id = seed(&records, "u1", "u1/123_exam.pdf").await;
        records
            .set_status(Bucket::Papers, &id, RecordStatus::Approved)
            .await
            .unwrap();

        let err = access
            .issue_signed_url(
                Some("papers"),
                Some("u1/other.pdf"),
                Some(&id),
                Some("tok-u1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::PathMismatch));
    }

    #[tokio::test]
    async fn unknown_bucket_fails_before_lookup() {
        let (access, _records) = fixture().await;
        let err = access
            .issue_signed_url(Some("videos"), Some("u1/a.pdf"), Some("p1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidBucket));
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let (access, _records) = fixture().await;
        for (b, f, i) in [
            (None, Some("u1/a.pdf"), Some("p1")),
            (Some("papers"), None, Some("p1")),
            (Some("papers"), Some("u1/a.pdf"), None),
            (Some(""), Some("u1/a.pdf"), Some("p1")),
        ] {
            let err = access.issue_signed_url(b, f, i, None).await.unwrap_err();
            assert!(matches!(err, AccessError::MissingParams));
        }
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (access, _records) = fixture().await;
        let err = access
            .issue_signed_url(Some("papers"), Some("u1/a.pdf"), Some("nope"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::ItemNotFound));
    }
}
