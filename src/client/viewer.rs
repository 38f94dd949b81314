//! Preview surfaces.
//!
//! [`PreviewSurface`] is the embedded in-page viewer: one slot whose
//! content is replaced or cleared, revoking the previous byte object
//! each time. [`ViewerContext`] models a separately opened browsing
//! context — it is opened synchronously, before any fetch, and later
//! populated or given an inline error so it never stays blank.

use super::blob::BlobHandle;

/// The embedded viewer slot (the in-page modal).
#[derive(Default)]
pub struct PreviewSurface {
    title: Option<String>,
    current: Option<BlobHandle>,
}

impl PreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show new content, revoking whatever was on display.
    pub fn present(&mut self, title: &str, handle: BlobHandle) {
        if let Some(previous) = self.current.take() {
            previous.revoke();
        }
        self.title = Some(title.to_string());
        self.current = Some(handle);
    }

    /// Dismiss the surface, revoking its content.
    pub fn close(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.revoke();
        }
        self.title = None;
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn content(&self) -> Option<&BlobHandle> {
        self.current.as_ref()
    }
}

/// A separately opened viewer context (the "new tab").
pub struct ViewerContext {
    title: String,
    content: Option<BlobHandle>,
    error: Option<String>,
}

impl ViewerContext {
    /// Open the context immediately. This happens before any fetch so
    /// the opening is not attributed to an async callback.
    pub fn open(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: None,
            error: None,
        }
    }

    /// Populate the context once bytes arrived.
    pub fn present(&mut self, handle: BlobHandle) {
        if let Some(previous) = self.content.take() {
            previous.revoke();
        }
        self.error = None;
        self.content = Some(handle);
    }

    /// Show an inline error instead of content.
    pub fn show_error(&mut self, message: impl Into<String>) {
        if let Some(previous) = self.content.take() {
            previous.revoke();
        }
        self.error = Some(message.into());
    }

    /// Close the context, revoking any content.
    pub fn close(&mut self) {
        if let Some(handle) = self.content.take() {
            handle.revoke();
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> Option<&BlobHandle> {
        self.content.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// A context is blank only between open and present/show_error.
    pub fn is_blank(&self) -> bool {
        self.content.is_none() && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::blob::BlobStore;
    use bytes::Bytes;

    #[test]
    fn replacement_revokes_previous_content() {
        let store = BlobStore::new();
        let mut surface = PreviewSurface::new();

        surface.present("First", store.create(Bytes::from_static(b"a"), "application/pdf"));
        assert_eq!(store.outstanding(), 1);

        surface.present("Second", store.create(Bytes::from_static(b"b"), "application/pdf"));
        assert_eq!(store.outstanding(), 1);
        assert_eq!(surface.title(), Some("Second"));

        surface.close();
        assert_eq!(store.outstanding(), 0);
        assert!(!surface.is_open());
    }

    #[test]
    fn open_close_cycles_leave_nothing_outstanding() {
        let store = BlobStore::new();
        let mut surface = PreviewSurface::new();
        for i in 0..10 {
            surface.present(
                &format!("doc {i}"),
                store.create(Bytes::from_static(b"bytes"), "application/pdf"),
            );
            surface.close();
        }
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn context_error_replaces_blankness() {
        let store = BlobStore::new();
        let mut ctx = ViewerContext::open("Exam");
        assert!(ctx.is_blank());

        ctx.show_error("This file is not available for public access");
        assert!(!ctx.is_blank());
        assert_eq!(
            ctx.error(),
            Some("This file is not available for public access")
        );

        ctx.present(store.create(Bytes::from_static(b"ok"), "application/pdf"));
        assert!(ctx.error().is_none());
        assert_eq!(store.outstanding(), 1);
        ctx.close();
        assert_eq!(store.outstanding(), 0);
    }
}
