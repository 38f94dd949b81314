//! Lazy acquisition of the PDF rendering module.
//!
//! The rendering module is fetched from a remote location the first
//! time a preview needs it. Initialization is memoized: concurrent
//! first callers share a single in-flight fetch, later callers get the
//! cached handle, and the module is never re-fetched per call.

use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::RetrievalError;

/// The loaded rendering module.
pub struct PdfRenderer {
    module: Bytes,
}

impl PdfRenderer {
    pub fn module_size(&self) -> usize {
        self.module.len()
    }

    /// Cheap sniff for content this renderer can display.
    pub fn can_render(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(b"%PDF-")
    }
}

type ModuleFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Bytes, RetrievalError>> + Send + Sync>;

/// Do-once loader for the rendering module.
pub struct RendererLoader {
    fetcher: ModuleFetcher,
    cell: OnceCell<Arc<PdfRenderer>>,
}

impl RendererLoader {
    pub fn new(fetcher: ModuleFetcher) -> Self {
        Self {
            fetcher,
            cell: OnceCell::new(),
        }
    }

    /// Load the module from a URL on first use.
    pub fn from_url(http: reqwest::Client, url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(Arc::new(move || {
            let http = http.clone();
            let url = url.clone();
            async move {
                let response = http.get(&url).send().await?;
                if !response.status().is_success() {
                    return Err(RetrievalError::FetchFailed(response.status().as_u16()));
                }
                Ok(response.bytes().await?)
            }
            .boxed()
        }))
    }

    /// Get the renderer, fetching the module exactly once.
    ///
    /// A failed initialization leaves the cell empty, so the next call
    /// retries the fetch.
    pub async fn get(&self) -> Result<Arc<PdfRenderer>, RetrievalError> {
        self.cell
            .get_or_try_init(|| async {
                let module = (self.fetcher)().await?;
                Ok(Arc::new(PdfRenderer { module }))
            })
            .await
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}
