//! Defines routes for the Study Share API.
//!
//! ## Structure
//! - **Access broker**
//!   - `POST /access/sign` — authorize and mint a signed file URL
//!
//! - **File payloads**
//!   - `PUT /files/{bucket}/{*path}` — authenticated upload
//!   - `GET /files/{bucket}/{*path}?token=&expires=` — signed read
//!
//! - **Records** (mounted once under `/papers` and once under `/notes`)
//!   - `POST   /` — create (authenticated)
//!   - `GET    /` — list approved
//!   - `GET    /mine` — list own uploads (authenticated)
//!   - `POST   /{id}/status` — moderate (admin)
//!   - `POST   /{id}/downloads` — bump download counter
//!   - `DELETE /{id}` — delete (owner or admin)
//!
//! The wildcard `*path` allows nested paths like `u1/1712_exam.pdf`.
//! Every route sits behind a permissive CORS layer so browser clients
//! can pre-flight the broker.

use crate::{
    handlers::{
        access_handlers::issue_signed_url,
        file_handlers::{fetch_file, upload_file},
        health_handlers::{healthz, readyz},
        record_handlers::{
            create_record, delete_record, increment_downloads, list_mine, list_records, set_status,
        },
    },
    models::record::Bucket,
    state::AppState,
};
use axum::{
    Extension, Router,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};

/// Routes shared by both resource kinds; the bucket arrives as an
/// extension injected per mount.
fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_record).get(list_records))
        .route("/mine", get(list_mine))
        .route("/{id}", delete(delete_record))
        .route("/{id}/status", post(set_status))
        .route("/{id}/downloads", post(increment_downloads))
}

/// Build and return the router for the whole service.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // access broker
        .route("/access/sign", post(issue_signed_url))
        // file payloads
        .route("/files/{bucket}/{*path}", put(upload_file).get(fetch_file))
        // records, once per kind
        .nest(
            "/papers",
            record_routes().layer(Extension(Bucket::Papers)),
        )
        .nest("/notes", record_routes().layer(Extension(Bucket::Notes)))
        .layer(cors)
}
