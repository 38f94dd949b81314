//! Shared application state handed to every handler.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::IdentityResolver;
use crate::services::{
    access_service::AccessService, record_service::RecordService, signed_url::UrlSigner,
    storage_service::StorageService,
};

#[derive(Clone)]
pub struct AppState {
    pub records: RecordService,
    pub storage: StorageService,
    pub access: AccessService,
    pub identity: Arc<dyn IdentityResolver>,
    pub signer: Arc<UrlSigner>,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        storage_dir: impl Into<std::path::PathBuf>,
        signer: UrlSigner,
        identity: Arc<dyn IdentityResolver>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let records = RecordService::new(db.clone());
        let storage = StorageService::new(db, storage_dir.into());
        let signer = Arc::new(signer);
        let access = AccessService::new(
            records.clone(),
            identity.clone(),
            signer.clone(),
            public_base_url.into(),
        );
        Self {
            records,
            storage,
            access,
            identity,
            signer,
        }
    }
}
