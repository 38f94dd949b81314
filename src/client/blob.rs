//! In-memory byte objects with scoped lifetimes.
//!
//! The browser client holds fetched file bytes behind temporary object
//! URLs that must be revoked when the preview closes; this is the same
//! discipline for native callers. Every [`BlobHandle`] is registered in
//! its [`BlobStore`] at creation and deregistered on `revoke()` — or on
//! drop, as a backstop — so repeated previews can never accumulate
//! live byte objects.

use bytes::Bytes;
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

/// Registry of live in-memory byte objects.
#[derive(Clone, Default)]
pub struct BlobStore {
    live: Arc<Mutex<HashSet<u64>>>,
    next_id: Arc<AtomicU64>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap fetched bytes as a tracked handle.
    pub fn create(&self, bytes: Bytes, content_type: impl Into<String>) -> BlobHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().expect("blob registry poisoned").insert(id);
        BlobHandle {
            id,
            bytes,
            content_type: content_type.into(),
            store: self.clone(),
            revoked: false,
        }
    }

    /// Number of handles created but not yet revoked.
    pub fn outstanding(&self) -> usize {
        self.live.lock().expect("blob registry poisoned").len()
    }

    fn release(&self, id: u64) {
        self.live.lock().expect("blob registry poisoned").remove(&id);
    }
}

/// A live reference to fetched bytes. Revoke it on every exit path;
/// dropping it unrevoked releases the registration as well.
pub struct BlobHandle {
    id: u64,
    bytes: Bytes,
    content_type: String,
    store: BlobStore,
    revoked: bool,
}

impl BlobHandle {
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Release the handle deterministically.
    pub fn revoke(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.revoked {
            self.revoked = true;
            self.store.release(self.id);
        }
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.release();
    }
}
