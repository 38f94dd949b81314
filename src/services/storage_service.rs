//! StorageService — file payloads on local disk with metadata rows in
//! SQLite. Payloads are sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{path}` to keep per-directory
//! file counts bounded. The buckets are the fixed pair backing papers
//! and notes; nothing else is ever created.

use crate::models::{object::StoredObject, record::Bucket};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file `{path}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: Bucket, path: String },
    #[error("invalid file path")]
    InvalidObjectPath,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

const MAX_OBJECT_PATH_LEN: usize = 1024;

/// Disk-backed object store for uploaded files.
///
/// - Upload streams bytes to disk and upserts a metadata row.
/// - Reads return metadata plus an open file handle for streaming out.
/// - Delete removes the row, the payload, and any emptied shard dirs.
#[derive(Clone)]
pub struct StorageService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

impl StorageService {
    /// Create a new StorageService backed by the provided SQLite pool and
    /// using `base_path` as the root directory for payloads.
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Basic path validation to avoid trivial traversal vectors.
    ///
    /// Rejects paths that are empty, oversized, begin with `/`, or
    /// contain `..`, control bytes, or backslashes.
    fn ensure_path_safe(&self, path: &str) -> StorageResult<()> {
        if path.is_empty() || path.len() > MAX_OBJECT_PATH_LEN {
            return Err(StorageError::InvalidObjectPath);
        }
        if path.starts_with('/') || path.contains("..") {
            return Err(StorageError::InvalidObjectPath);
        }
        if path
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectPath);
        }
        Ok(())
    }

    fn bucket_root(&self, bucket: Bucket) -> PathBuf {
        self.base_path.join(bucket.as_str())
    }

    /// Generate two-level shard identifiers for an object path.
    ///
    /// Uses MD5(bucket/path) and returns the first two bytes as
    /// lowercase hex. Reduces file count per directory.
    fn object_shards(bucket: Bucket, path: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, path));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path: base/bucket/{shard}/{shard}/{path}.
    fn object_path(&self, bucket: Bucket, path: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, path);
        let mut full = self.bucket_root(bucket);
        full.push(shard_a);
        full.push(shard_b);
        full.push(path);
        full
    }

    async fn fetch_meta(&self, bucket: Bucket, path: &str) -> StorageResult<StoredObject> {
        sqlx::query_as::<_, StoredObject>(
            "SELECT bucket, path, content_type, size_bytes, etag, created_at
             FROM objects WHERE bucket = ? AND path = ?",
        )
        .bind(bucket)
        .bind(path)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ObjectNotFound {
                bucket,
                path: path.to_string(),
            },
            other => StorageError::Sqlx(other),
        })
    }

    /// Stream-upload a payload to disk and upsert its metadata.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5/etag and size while streaming.
    /// - Atomically renames into final location.
    ///
    /// Ensures durable writes (fsync) and cleans up temp files on errors.
    pub async fn put_object_stream<S>(
        &self,
        bucket: Bucket,
        path: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<StoredObject>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        self.ensure_path_safe(path)?;

        let file_path = self.object_path(bucket, path);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("payload path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = md5::Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        let created_at = Utc::now();
        let etag = format!("{:x}", digest.compute());

        let insert_result = sqlx::query_as::<_, StoredObject>(
            r#"
            INSERT INTO objects (bucket, path, content_type, size_bytes, etag, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket, path) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                created_at = excluded.created_at
            RETURNING bucket, path, content_type, size_bytes, etag, created_at
            "#,
        )
        .bind(bucket)
        .bind(path)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(created_at)
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(obj) => Ok(obj),
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StorageError::Sqlx(err))
            }
        }
    }

    /// Fetch a payload for reading.
    ///
    /// Returns metadata and an opened File handle ready for streaming
    /// out. Returns ObjectNotFound if metadata exists but the physical
    /// file is missing.
    pub async fn open_reader(&self, bucket: Bucket, path: &str) -> StorageResult<(StoredObject, File)> {
        self.ensure_path_safe(path)?;
        let meta = self.fetch_meta(bucket, path).await?;

        let file_path = self.object_path(bucket, path);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket,
                    path: path.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok((meta, file))
    }

    /// Delete a payload and its metadata row.
    ///
    /// Removing the physical file is best-effort once the row is gone;
    /// emptied shard directories are pruned afterwards.
    pub async fn delete_object(&self, bucket: Bucket, path: &str) -> StorageResult<()> {
        self.ensure_path_safe(path)?;

        let result = sqlx::query("DELETE FROM objects WHERE bucket = ? AND path = ?")
            .bind(bucket)
            .bind(path)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ObjectNotFound {
                bucket,
                path: path.to_string(),
            });
        }

        let file_path = self.object_path(bucket, path);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("payload {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(())
    }

    /// Recursively remove empty directories up to the bucket root.
    ///
    /// Stops when a directory is not empty, not found, or the root is
    /// reached.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::io::AsyncReadExt;

    async fn service() -> (StorageService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("meta.db");
        std::fs::File::create(&db_path).unwrap();
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE objects (
                bucket TEXT NOT NULL,
                path TEXT NOT NULL,
                content_type TEXT,
                size_bytes INTEGER NOT NULL,
                etag TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (bucket, path)
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        (
            StorageService::new(Arc::new(pool), dir.path().join("files")),
            dir,
        )
    }

    fn byte_stream(chunks: Vec<&'static [u8]>) -> impl Stream<Item = io::Result<Bytes>> + Send {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))))
    }

    #[tokio::test]
    async fn put_then_read_back() {
        let (svc, _dir) = service().await;
        let meta = svc
            .put_object_stream(
                Bucket::Papers,
                "u1/123_exam.pdf",
                Some("application/pdf".into()),
                byte_stream(vec![b"%PDF-", b"1.7 content"]),
            )
            .await
            .unwrap();
        assert_eq!(meta.size_bytes, 16);
        assert_eq!(meta.content_type.as_deref(), Some("application/pdf"));

        let (meta, mut file) = svc.open_reader(Bucket::Papers, "u1/123_exam.pdf").await.unwrap();
        assert_eq!(meta.size_bytes, 16);
        let mut body = Vec::new();
        file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"%PDF-1.7 content");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (svc, _dir) = service().await;
        let err = svc.open_reader(Bucket::Notes, "u1/none.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let (svc, _dir) = service().await;
        for bad in ["", "/abs.pdf", "a/../b.pdf", "a\\b.pdf"] {
            let err = svc.open_reader(Bucket::Papers, bad).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidObjectPath), "path {bad:?}");
        }
    }

    #[tokio::test]
    async fn delete_removes_payload_and_row() {
        let (svc, _dir) = service().await;
        svc.put_object_stream(Bucket::Notes, "u2/n.pdf", None, byte_stream(vec![b"data"]))
            .await
            .unwrap();
        svc.delete_object(Bucket::Notes, "u2/n.pdf").await.unwrap();

        let err = svc.open_reader(Bucket::Notes, "u2/n.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));

        // A second delete reports not-found.
        let err = svc.delete_object(Bucket::Notes, "u2/n.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }
}
