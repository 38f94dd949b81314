//! Study Share — a student file-sharing service.
//!
//! The server side stores paper/note records and their payloads, and
//! gates every file read behind the access broker, which mints
//! short-lived signed URLs. The [`client`] module is the matching
//! retrieval pipeline: it asks the broker for access, fetches bytes
//! from the signed URL, and previews or saves them while keeping
//! in-memory byte objects scoped.

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;
