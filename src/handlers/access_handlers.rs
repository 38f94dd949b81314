//! The access-broker endpoint: `POST /access/sign`.
//!
//! Request and response shapes are the service's public contract:
//!
//! - Request: `{ "bucket": "papers"|"notes", "filePath": "...", "itemId": "..." }`
//!   with an optional `Authorization: Bearer <token>` header.
//! - 200: `{ "signedUrl": "..." }`
//! - 400/403/404/500: `{ "error": "..." }`

use crate::{auth::bearer_token, errors::AppError, state::AppState};
use axum::{Json, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};

/// Body of a signed-URL request. Fields are optional so that presence
/// is checked by the broker itself, which owns the error message.
#[derive(Debug, Deserialize)]
pub struct SignUrlRequest {
    pub bucket: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "itemId")]
    pub item_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignUrlResponse {
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
}

/// `POST /access/sign` — authorize a file access and mint a signed URL.
pub async fn issue_signed_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SignUrlRequest>,
) -> Result<Json<SignUrlResponse>, AppError> {
    let signed_url = state
        .access
        .issue_signed_url(
            req.bucket.as_deref(),
            req.file_path.as_deref(),
            req.item_id.as_deref(),
            bearer_token(&headers),
        )
        .await?;

    Ok(Json(SignUrlResponse { signed_url }))
}
