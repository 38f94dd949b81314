//! RecordService — the relational side of Study Share: paper and note
//! rows, moderation status, download counters, profiles, and roles.
//! One table per resource kind, selected via [`Bucket`].

use crate::models::{
    profile::Profile,
    record::{Bucket, RecordStatus, ResourceRecord},
};
use crate::validation::ValidatedUpload;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Item not found")]
    NotFound,
    #[error("cannot move a {from} item to {to}")]
    InvalidTransition { from: RecordStatus, to: RecordStatus },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Points granted per accepted upload.
pub const PAPER_UPLOAD_POINTS: i64 = 20;
pub const NOTE_UPLOAD_POINTS: i64 = 50;

/// Optional filters for public listings.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Case-insensitive title substring.
    pub q: Option<String>,
    pub subject: Option<String>,
    pub level: Option<String>,
}

/// Column list shared by every record SELECT. Papers have no
/// description/chapter_topic columns, so those are padded with NULLs to
/// keep a single row shape.
fn select_columns(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Papers => {
            "id, owner_id, title, subject, level, university, year,
             NULL AS description, NULL AS chapter_topic,
             file_path, status, downloads, created_at"
        }
        Bucket::Notes => {
            "id, owner_id, title, subject, level, university, year,
             description, chapter_topic,
             file_path, status, downloads, created_at"
        }
    }
}

#[derive(Clone)]
pub struct RecordService {
    pub db: Arc<SqlitePool>,
}

impl RecordService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Look up a record by id in the table matching `bucket`.
    pub async fn fetch(&self, bucket: Bucket, id: &str) -> RecordResult<ResourceRecord> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            select_columns(bucket),
            bucket.table()
        );
        sqlx::query_as::<_, ResourceRecord>(&sql)
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => RecordError::NotFound,
                other => RecordError::Sqlx(other),
            })
    }

    /// Insert a new record in `pending` state and award upload points
    /// to the owner's profile (best-effort).
    pub async fn create(
        &self,
        bucket: Bucket,
        owner_id: &str,
        upload: ValidatedUpload,
    ) -> RecordResult<ResourceRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let sql = match bucket {
            Bucket::Papers => {
                "INSERT INTO papers
                 (id, owner_id, title, subject, level, university, year,
                  file_path, status, downloads, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?)"
            }
            Bucket::Notes => {
                "INSERT INTO notes
                 (id, owner_id, title, subject, level, university, year,
                  description, chapter_topic,
                  file_path, status, downloads, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?)"
            }
        };

        let mut query = sqlx::query(sql)
            .bind(&id)
            .bind(owner_id)
            .bind(&upload.title)
            .bind(&upload.subject)
            .bind(&upload.level)
            .bind(&upload.university)
            .bind(upload.year);
        if bucket == Bucket::Notes {
            query = query.bind(&upload.description).bind(&upload.chapter_topic);
        }
        query
            .bind(&upload.file_path)
            .bind(created_at)
            .execute(&*self.db)
            .await?;

        let points = match bucket {
            Bucket::Papers => PAPER_UPLOAD_POINTS,
            Bucket::Notes => NOTE_UPLOAD_POINTS,
        };
        if let Err(err) = self.award_points(owner_id, points).await {
            warn!("failed to award {} points to {}: {}", points, owner_id, err);
        }

        self.fetch(bucket, &id).await
    }

    /// Public listing: approved records only, newest first.
    pub async fn list_approved(
        &self,
        bucket: Bucket,
        filter: &ListFilter,
    ) -> RecordResult<Vec<ResourceRecord>> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE status = 'approved'",
            select_columns(bucket),
            bucket.table()
        );
        if filter.q.is_some() {
            sql.push_str(" AND title LIKE ?");
        }
        if filter.subject.is_some() {
            sql.push_str(" AND subject = ?");
        }
        if filter.level.is_some() {
            sql.push_str(" AND level = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query_as::<_, ResourceRecord>(&sql);
        if let Some(q) = &filter.q {
            query = query.bind(format!("%{}%", q));
        }
        if let Some(subject) = &filter.subject {
            query = query.bind(subject);
        }
        if let Some(level) = &filter.level {
            query = query.bind(level);
        }

        Ok(query.fetch_all(&*self.db).await?)
    }

    /// Everything a user has uploaded, any status, newest first.
    pub async fn list_owned(
        &self,
        bucket: Bucket,
        owner_id: &str,
    ) -> RecordResult<Vec<ResourceRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE owner_id = ? ORDER BY created_at DESC",
            select_columns(bucket),
            bucket.table()
        );
        Ok(sqlx::query_as::<_, ResourceRecord>(&sql)
            .bind(owner_id)
            .fetch_all(&*self.db)
            .await?)
    }

    /// Apply a moderation step. Legal moves are pending->approved,
    /// pending->rejected, and the reset approved|rejected->pending;
    /// everything else is rejected without touching the row.
    pub async fn set_status(
        &self,
        bucket: Bucket,
        id: &str,
        to: RecordStatus,
    ) -> RecordResult<ResourceRecord> {
        let current = self.fetch(bucket, id).await?;
        if !current.status.can_transition_to(to) {
            return Err(RecordError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let sql = format!("UPDATE {} SET status = ? WHERE id = ?", bucket.table());
        sqlx::query(&sql)
            .bind(to)
            .bind(id)
            .execute(&*self.db)
            .await?;

        self.fetch(bucket, id).await
    }

    /// Atomically bump the download counter, returning the new value.
    ///
    /// Single UPDATE in the store, never read-modify-write, so
    /// concurrent downloads of the same record cannot lose updates.
    pub async fn increment_downloads(&self, bucket: Bucket, id: &str) -> RecordResult<i64> {
        let sql = format!(
            "UPDATE {} SET downloads = downloads + 1 WHERE id = ? RETURNING downloads",
            bucket.table()
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(RecordError::NotFound)
    }

    /// Remove a record row. The caller is responsible for cleaning up
    /// the stored payload afterwards.
    pub async fn delete(&self, bucket: Bucket, id: &str) -> RecordResult<ResourceRecord> {
        let record = self.fetch(bucket, id).await?;
        let sql = format!("DELETE FROM {} WHERE id = ?", bucket.table());
        sqlx::query(&sql).bind(id).execute(&*self.db).await?;
        Ok(record)
    }

    /// Add points to a profile, creating the row if needed.
    pub async fn award_points(&self, user_id: &str, points: i64) -> RecordResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, points) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET points = points + excluded.points",
        )
        .bind(user_id)
        .bind(points)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    pub async fn profile(&self, user_id: &str) -> RecordResult<Option<Profile>> {
        Ok(sqlx::query_as::<_, Profile>(
            "SELECT user_id, display_name, points FROM profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    /// Role check backing the moderation endpoints.
    pub async fn has_role(&self, user_id: &str, role: &str) -> RecordResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_roles WHERE user_id = ? AND role = ?",
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&*self.db)
        .await?;
        Ok(count > 0)
    }

    /// Grant a role (used by operators to seed moderators).
    pub async fn grant_role(&self, user_id: &str, role: &str) -> RecordResult<()> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(user_id)
            .bind(role)
            .execute(&*self.db)
            .await?;
        Ok(())
    }
}
