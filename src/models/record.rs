//! Resource records — the rows behind uploaded papers and notes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// The fixed set of storage buckets. Each bucket is backed by its own
/// record table; any other bucket name is rejected at the boundary.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Bucket {
    Papers,
    Notes,
}

impl Bucket {
    /// Parse a caller-supplied bucket name. Returns `None` for anything
    /// outside the enumerated set.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "papers" => Some(Self::Papers),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }

    /// Record table backing this bucket.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Papers => "papers",
            Self::Notes => "notes",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Papers => "papers",
            Self::Notes => "notes",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state of a record.
///
/// Legal transitions are `pending -> approved`, `pending -> rejected`,
/// and the moderator-only reset `approved|rejected -> pending`.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether moving from `self` to `to` is a legal moderation step.
    pub fn can_transition_to(&self, to: RecordStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Pending)
                | (Self::Rejected, Self::Pending)
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single uploaded resource (paper or note).
///
/// `file_path` is fixed at creation and always points at the payload in
/// the bucket matching the record's table. `downloads` only ever grows,
/// via an atomic in-database increment.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ResourceRecord {
    pub id: String,

    /// Uploader's user id.
    pub owner_id: String,

    pub title: String,
    pub subject: String,

    /// Study level (e.g. "Undergraduate", "Masters").
    pub level: String,

    pub university: Option<String>,
    pub year: Option<i64>,

    /// Free-form summary; only populated for notes.
    pub description: Option<String>,

    /// Chapter or topic label; only populated for notes.
    pub chapter_topic: Option<String>,

    /// Object-store path of the payload, immutable after creation.
    pub file_path: String,

    pub status: RecordStatus,

    /// Completed download count, incremented best-effort after each
    /// successful client download.
    pub downloads: i64,

    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_parse_rejects_unknown_names() {
        assert_eq!(Bucket::parse("papers"), Some(Bucket::Papers));
        assert_eq!(Bucket::parse("notes"), Some(Bucket::Notes));
        assert_eq!(Bucket::parse("videos"), None);
        assert_eq!(Bucket::parse("Papers"), None);
        assert_eq!(Bucket::parse(""), None);
    }

    #[test]
    fn status_transitions() {
        use RecordStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Pending));
        assert!(Rejected.can_transition_to(Pending));

        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Approved));
    }
}
