pub mod access_service;
pub mod record_service;
pub mod signed_url;
pub mod storage_service;
