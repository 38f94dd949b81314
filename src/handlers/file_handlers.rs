//! File payload handlers.
//!
//! Uploads stream straight to the storage service; reads only ever
//! happen through a verified signed URL, so there is no unauthenticated
//! raw-file route. Bodies are streamed in both directions to avoid
//! buffering whole files in memory.

use crate::{
    auth::bearer_token,
    errors::AppError,
    models::{object::StoredObject, record::Bucket},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::ReaderStream;

fn parse_bucket(raw: &str) -> Result<Bucket, AppError> {
    Bucket::parse(raw)
        .ok_or_else(|| AppError::bad_request("Invalid bucket. Must be 'papers' or 'notes'"))
}

/// Upload a payload to `PUT /files/{bucket}/{*path}`.
///
/// Requires a valid bearer token, and the first path segment must be
/// the caller's own user id (`{user_id}/{timestamp}_{name}`), so users
/// can only ever write beneath their own folder.
pub async fn upload_file(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let bucket = parse_bucket(&bucket)?;

    let user_id = bearer_token(&headers)
        .and_then(|token| state.identity.resolve(token))
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))?;

    if path.split('/').next() != Some(user_id.as_str()) {
        return Err(AppError::forbidden(
            "Files must be uploaded under your own folder",
        ));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other));

    let object = state
        .storage
        .put_object_stream(bucket, &path, content_type, stream)
        .await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Some(etag) = object.etag.as_ref()
        && let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag))
    {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// Query half of a signed URL.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub token: Option<String>,
    pub expires: Option<i64>,
}

/// Fetch bytes via `GET /files/{bucket}/{*path}?token=..&expires=..`.
///
/// The token is checked (expiry first, then constant-time signature
/// comparison) before the payload is opened; the response streams the
/// file with its stored content type.
pub async fn fetch_file(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, AppError> {
    let bucket = parse_bucket(&bucket)?;

    let (token, expires) = match (query.token, query.expires) {
        (Some(token), Some(expires)) => (token, expires),
        _ => return Err(AppError::bad_request("Missing signed url token")),
    };

    state.signer.verify(bucket, &path, expires, &token)?;

    let (meta, file) = state.storage.open_reader(bucket, &path).await?;
    let stream = ReaderStream::new(file);

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Some(etag) = meta.etag.as_ref()
        && let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag))
    {
        headers.insert(header::ETAG, value);
    }
}
