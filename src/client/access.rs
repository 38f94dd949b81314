//! Thin wrapper over the access broker and the download counter.

use serde::{Deserialize, Serialize};

use super::RetrievalError;
use super::retrieval::AccessParams;
use crate::models::record::Bucket;

const GENERIC_ACCESS_ERROR: &str = "Failed to get download URL";

#[derive(Serialize)]
struct SignRequest<'a> {
    bucket: &'a str,
    #[serde(rename = "filePath")]
    file_path: &'a str,
    #[serde(rename = "itemId")]
    item_id: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedUrl")]
    signed_url: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct DownloadsResponse {
    downloads: i64,
}

/// HTTP client for the broker endpoints. Carries an optional bearer
/// credential; without one, every request is anonymous.
#[derive(Clone)]
pub struct AccessClient {
    http: reqwest::Client,
    base_url: String,
    bearer: Option<String>,
}

impl AccessClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer: None,
        }
    }

    /// Attach a bearer token to subsequent requests.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Ask the broker for a signed URL.
    ///
    /// The broker's error message, when present, is surfaced verbatim;
    /// anything less structured becomes a generic fallback.
    pub async fn request_access(&self, params: &AccessParams) -> Result<String, RetrievalError> {
        let body = SignRequest {
            bucket: params.bucket.as_str(),
            file_path: &params.file_path,
            item_id: &params.item_id,
        };

        let mut request = self
            .http
            .post(format!("{}/access/sign", self.base_url))
            .json(&body);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let ok = response.status().is_success();
        let parsed: SignResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(_) => {
                return Err(RetrievalError::AccessDenied(GENERIC_ACCESS_ERROR.into()));
            }
        };

        if !ok {
            return Err(RetrievalError::AccessDenied(
                parsed.error.unwrap_or_else(|| GENERIC_ACCESS_ERROR.into()),
            ));
        }
        parsed
            .signed_url
            .ok_or_else(|| RetrievalError::AccessDenied(GENERIC_ACCESS_ERROR.into()))
    }

    /// Report a completed download. Best-effort from the caller's point
    /// of view; errors propagate so the caller can decide to ignore them.
    pub async fn increment_downloads(
        &self,
        bucket: Bucket,
        item_id: &str,
    ) -> Result<i64, RetrievalError> {
        let response = self
            .http
            .post(format!("{}/{}/{}/downloads", self.base_url, bucket, item_id))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RetrievalError::FetchFailed(response.status().as_u16()));
        }
        let parsed: DownloadsResponse = response.json().await?;
        Ok(parsed.downloads)
    }
}
