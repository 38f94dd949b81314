//! Metadata for a stored payload (the bytes behind a record).

use crate::models::record::Bucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata row for one object payload on disk.
///
/// The payload itself lives under the storage root; this row carries
/// what the read path needs to answer with correct headers.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    pub bucket: Bucket,

    /// Path within the bucket (e.g. `u1/1712000000_exam.pdf`).
    pub path: String,

    /// Content type supplied at upload, if any.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum computed while streaming the upload.
    pub etag: Option<String>,

    pub created_at: DateTime<Utc>,
}
