//! Client-side retrieval pipeline.
//!
//! Mirrors what the web client does: ask the access broker for a
//! signed URL, fetch the bytes straight from the file endpoint, then
//! either hand them to a preview surface or save them to disk — all
//! while keeping every temporary in-memory byte object scoped, and
//! reporting a completed download back to the record store.

pub mod access;
pub mod blob;
pub mod renderer;
pub mod retrieval;
pub mod viewer;

pub use access::AccessClient;
pub use blob::{BlobHandle, BlobStore};
pub use renderer::{PdfRenderer, RendererLoader};
pub use retrieval::{AccessParams, FetchProgress, FetchState, Retriever};
pub use viewer::{PreviewSurface, ViewerContext};

use thiserror::Error;

/// Failures of the retrieval pipeline. Broker refusals carry the
/// server's message verbatim so the UI can show it unchanged.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("{0}")]
    AccessDenied(String),
    #[error("Failed to download file ({0})")]
    FetchFailed(u16),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
