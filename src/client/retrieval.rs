//! The retrieval pipeline itself.
//!
//! Each operation is a one-shot sequence: authorize with the broker,
//! fetch the bytes from the signed URL, then render or save. Observable
//! state moves loading -> success | error and nothing retries; a
//! failure ends the sequence with a message for the UI. Abandoning the
//! returned future abandons any in-flight fetch.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use super::{
    RetrievalError,
    access::AccessClient,
    blob::BlobStore,
    renderer::RendererLoader,
    viewer::{PreviewSurface, ViewerContext},
};
use crate::models::record::Bucket;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// What to fetch: the record's bucket, its stored path, and its id.
#[derive(Debug, Clone)]
pub struct AccessParams {
    pub bucket: Bucket,
    pub file_path: String,
    pub item_id: String,
}

/// One-shot operation state surfaced to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchState {
    pub loading: bool,
    pub error: Option<String>,
}

/// Byte-level progress of the current fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchProgress {
    pub received: u64,
    pub total: Option<u64>,
}

/// Drives previews, downloads, and new-context views.
pub struct Retriever {
    access: AccessClient,
    http: reqwest::Client,
    blobs: BlobStore,
    renderer: Option<Arc<RendererLoader>>,
    state: watch::Sender<FetchState>,
    progress: watch::Sender<FetchProgress>,
}

impl Retriever {
    pub fn new(access: AccessClient) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        let (progress, _) = watch::channel(FetchProgress::default());
        Self {
            access,
            http: reqwest::Client::new(),
            blobs: BlobStore::new(),
            renderer: None,
            state,
            progress,
        }
    }

    /// Use a lazily loaded rendering module for previews.
    pub fn with_renderer(mut self, renderer: Arc<RendererLoader>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Observe loading/error flags for the current operation.
    pub fn state(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    /// Observe byte progress for the current operation.
    pub fn progress(&self) -> watch::Receiver<FetchProgress> {
        self.progress.subscribe()
    }

    fn begin(&self) {
        self.state.send_replace(FetchState {
            loading: true,
            error: None,
        });
        self.progress.send_replace(FetchProgress::default());
    }

    fn settle(&self, error: Option<String>) {
        self.state.send_replace(FetchState {
            loading: false,
            error,
        });
    }

    /// Fetch bytes from a signed URL, streaming chunks and publishing
    /// progress as they arrive.
    async fn fetch_bytes(&self, url: &str) -> Result<(Bytes, String), RetrievalError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RetrievalError::FetchFailed(response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        let total = response.content_length();

        let mut received: u64 = 0;
        let mut buf = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            buf.extend_from_slice(&chunk);
            self.progress.send_replace(FetchProgress { received, total });
        }

        Ok((buf.freeze(), content_type))
    }

    /// Authorize then fetch: the shared front half of every operation.
    async fn acquire(&self, params: &AccessParams) -> Result<(Bytes, String), RetrievalError> {
        let signed_url = self.access.request_access(params).await?;
        self.fetch_bytes(&signed_url).await
    }

    /// Fetch a record and show it on the embedded preview surface.
    ///
    /// The previous content of the surface, if any, is revoked on
    /// replacement; closing the surface revokes the new content. On
    /// failure nothing is left registered.
    pub async fn preview_inline(
        &self,
        surface: &mut PreviewSurface,
        params: &AccessParams,
        title: &str,
    ) -> Result<(), RetrievalError> {
        self.begin();
        let result = self.preview_inner(surface, params, title).await;
        self.settle(result.as_ref().err().map(|e| e.to_string()));
        result
    }

    async fn preview_inner(
        &self,
        surface: &mut PreviewSurface,
        params: &AccessParams,
        title: &str,
    ) -> Result<(), RetrievalError> {
        let (bytes, mut content_type) = self.acquire(params).await?;

        if let Some(loader) = &self.renderer {
            let renderer = loader.get().await?;
            if renderer.can_render(&bytes) {
                content_type = "application/pdf".to_string();
            }
        }

        let handle = self.blobs.create(bytes, content_type);
        surface.present(title, handle);
        Ok(())
    }

    /// Fetch a record and save it under `dest_dir/filename`.
    ///
    /// The transient byte object is revoked as soon as the bytes are on
    /// disk. After a successful save, exactly one counter-increment is
    /// reported to the record store; its failure is logged and never
    /// surfaced — the download has already completed.
    pub async fn download_to_disk(
        &self,
        params: &AccessParams,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, RetrievalError> {
        self.begin();
        let result = self.download_inner(params, dest_dir, filename).await;
        self.settle(result.as_ref().err().map(|e| e.to_string()));
        result
    }

    async fn download_inner(
        &self,
        params: &AccessParams,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, RetrievalError> {
        let (bytes, content_type) = self.acquire(params).await?;

        let handle = self.blobs.create(bytes, content_type);
        let target = dest_dir.join(filename);
        let write_result = tokio::fs::write(&target, handle.bytes()).await;
        handle.revoke();
        write_result?;

        if let Err(err) = self
            .access
            .increment_downloads(params.bucket, &params.item_id)
            .await
        {
            warn!(
                "failed to report download of {} {}: {}",
                params.bucket, params.item_id, err
            );
        }

        Ok(target)
    }

    /// Open a new viewer context and populate it.
    ///
    /// The context is opened synchronously, before any request leaves,
    /// so the opening is tied to the user action rather than an async
    /// callback. On failure the context shows the error inline instead
    /// of staying blank.
    pub async fn open_in_new_context(&self, params: &AccessParams, title: &str) -> ViewerContext {
        let mut context = ViewerContext::open(title);
        self.begin();

        match self.acquire(params).await {
            Ok((bytes, content_type)) => {
                context.present(self.blobs.create(bytes, content_type));
                self.settle(None);
            }
            Err(err) => {
                let message = err.to_string();
                context.show_error(&message);
                self.settle(Some(message));
            }
        }

        context
    }
}
