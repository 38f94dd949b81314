//! Record handlers: creation, listings, moderation, the download
//! counter, and deletion. The same router is mounted once per resource
//! kind with the bucket injected as an extension.

use crate::{
    auth::bearer_token,
    errors::AppError,
    models::record::{Bucket, RecordStatus},
    state::AppState,
    validation::{UploadRequest, validate_upload},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::services::record_service::ListFilter;

const ADMIN_ROLE: &str = "admin";

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    bearer_token(headers)
        .and_then(|token| state.identity.resolve(token))
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let user_id = authenticate(state, headers)?;
    if state.records.has_role(&user_id, ADMIN_ROLE).await? {
        Ok(user_id)
    } else {
        Err(AppError::forbidden("Moderator access required"))
    }
}

/// `POST /{papers|notes}` — create a record for an uploaded file.
///
/// The metadata is validated as a whole; failures come back as a 422
/// with a field -> message map. The referenced file path must live
/// under the caller's own folder.
pub async fn create_record(
    State(state): State<AppState>,
    Extension(bucket): Extension<Bucket>,
    headers: HeaderMap,
    Json(req): Json<UploadRequest>,
) -> Result<Response, AppError> {
    let user_id = authenticate(&state, &headers)?;

    let upload = match validate_upload(bucket, &req) {
        Ok(upload) => upload,
        Err(errors) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response());
        }
    };

    if upload.file_path.split('/').next() != Some(user_id.as_str()) {
        return Err(AppError::forbidden(
            "Files must be uploaded under your own folder",
        ));
    }

    let record = state.records.create(bucket, &user_id, upload).await?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub subject: Option<String>,
    pub level: Option<String>,
}

/// `GET /{papers|notes}` — public listing of approved records.
pub async fn list_records(
    State(state): State<AppState>,
    Extension(bucket): Extension<Bucket>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListFilter {
        q: query.q,
        subject: query.subject,
        level: query.level,
    };
    let records = state.records.list_approved(bucket, &filter).await?;
    Ok(Json(records))
}

/// `GET /{papers|notes}/mine` — the caller's own uploads, any status.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(bucket): Extension<Bucket>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = authenticate(&state, &headers)?;
    let records = state.records.list_owned(bucket, &user_id).await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// `POST /{papers|notes}/{id}/status` — moderation. Admin only.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(bucket): Extension<Bucket>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<StatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&state, &headers).await?;

    let to = req
        .status
        .as_deref()
        .and_then(RecordStatus::parse)
        .ok_or_else(|| {
            AppError::bad_request("Invalid status. Must be 'pending', 'approved' or 'rejected'")
        })?;

    let record = state.records.set_status(bucket, &id, to).await?;
    Ok(Json(record))
}

/// `POST /{papers|notes}/{id}/downloads` — bump the download counter.
///
/// Fired by clients after a completed download; the increment is atomic
/// in the store.
pub async fn increment_downloads(
    State(state): State<AppState>,
    Extension(bucket): Extension<Bucket>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let downloads = state.records.increment_downloads(bucket, &id).await?;
    Ok(Json(json!({ "downloads": downloads })))
}

/// `DELETE /{papers|notes}/{id}` — remove a record. Owner or admin.
///
/// The row is removed first; payload cleanup is best-effort and never
/// fails the request once the record is gone.
pub async fn delete_record(
    State(state): State<AppState>,
    Extension(bucket): Extension<Bucket>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = authenticate(&state, &headers)?;

    let record = state.records.fetch(bucket, &id).await?;
    if record.owner_id != user_id && !state.records.has_role(&user_id, ADMIN_ROLE).await? {
        return Err(AppError::forbidden("You can only delete your own uploads"));
    }

    let record = state.records.delete(bucket, &id).await?;
    if let Err(err) = state.storage.delete_object(bucket, &record.file_path).await {
        warn!(
            "failed to remove payload {}/{} after record delete: {}",
            bucket, record.file_path, err
        );
    }

    Ok(StatusCode::NO_CONTENT)
}
