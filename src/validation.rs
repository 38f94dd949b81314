//! Upload metadata validation.
//!
//! Validation is a pure function from the raw request shape to either a
//! validated value or a field -> message map. Nothing panics and no
//! error crosses this boundary as an exception; the HTTP layer renders
//! the map as a 422 body and the UI renders it per field.

use chrono::{Datelike, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::models::record::Bucket;

/// Field-level validation errors, keyed by field name. Ordered map so
/// rendered output is deterministic.
pub type FieldErrors = BTreeMap<&'static str, String>;

const MAX_TITLE_LEN: usize = 200;
const MAX_TEXT_LEN: usize = 2000;
const MIN_YEAR: i64 = 1950;

/// Raw, untrusted upload metadata as received on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadRequest {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub level: Option<String>,
    pub university: Option<String>,
    pub year: Option<i64>,
    pub description: Option<String>,
    pub chapter_topic: Option<String>,
    pub file_path: Option<String>,
}

/// Metadata that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub title: String,
    pub subject: String,
    pub level: String,
    pub university: Option<String>,
    pub year: Option<i64>,
    pub description: Option<String>,
    pub chapter_topic: Option<String>,
    pub file_path: String,
}

fn required<'a>(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &'a Option<String>,
) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.insert(field, format!("{field} is required"));
            None
        }
    }
}

fn file_path_ok(path: &str) -> bool {
    !path.starts_with('/')
        && !path.contains("..")
        && !path.contains('\\')
        && path.bytes().all(|b| !b.is_ascii_control())
}

/// Validate upload metadata for `bucket`.
///
/// Returns every failing field at once rather than stopping at the
/// first, so a form can highlight all of them in one round trip.
pub fn validate_upload(bucket: Bucket, req: &UploadRequest) -> Result<ValidatedUpload, FieldErrors> {
    let mut errors = FieldErrors::new();

    let title = required(&mut errors, "title", &req.title);
    if let Some(t) = title
        && t.len() > MAX_TITLE_LEN
    {
        errors.insert("title", format!("title must be at most {MAX_TITLE_LEN} characters"));
    }

    let subject = required(&mut errors, "subject", &req.subject);
    let level = required(&mut errors, "level", &req.level);

    if let Some(year) = req.year {
        let next_year = i64::from(Utc::now().year()) + 1;
        if year < MIN_YEAR || year > next_year {
            errors.insert("year", format!("year must be between {MIN_YEAR} and {next_year}"));
        }
    }

    if let Some(desc) = req.description.as_deref()
        && desc.len() > MAX_TEXT_LEN
    {
        errors.insert(
            "description",
            format!("description must be at most {MAX_TEXT_LEN} characters"),
        );
    }

    let file_path = required(&mut errors, "file_path", &req.file_path);
    if let Some(p) = file_path
        && !file_path_ok(p)
    {
        errors.insert("file_path", "file_path is not a valid storage path".to_string());
    }

    // Notes carry the descriptive fields; papers silently drop them.
    let keep_note_fields = bucket == Bucket::Notes;

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedUpload {
        title: title.unwrap_or_default().to_string(),
        subject: subject.unwrap_or_default().to_string(),
        level: level.unwrap_or_default().to_string(),
        university: req
            .university
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        year: req.year,
        description: req
            .description
            .clone()
            .filter(|_| keep_note_fields)
            .filter(|d| !d.trim().is_empty()),
        chapter_topic: req
            .chapter_topic
            .clone()
            .filter(|_| keep_note_fields)
            .filter(|c| !c.trim().is_empty()),
        file_path: file_path.unwrap_or_default().to_string(),
    })
}
