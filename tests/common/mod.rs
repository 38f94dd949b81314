#![allow(dead_code)]

use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;

use study_share::auth::{JwtConfig, JwtIdentity};
use study_share::db;
use study_share::services::signed_url::UrlSigner;
use study_share::state::AppState;

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const SIGNING_SECRET: &[u8] = b"integration-signing-secret";

pub struct TestApp {
    pub state: AppState,
    pub jwt: JwtIdentity,
    /// Keeps the storage/database directory alive for the test.
    pub dir: TempDir,
}

/// Build a full application state on a throwaway directory. Signed
/// URLs are minted against `base_url`.
pub async fn test_app(base_url: &str) -> TestApp {
    test_app_with_ttl(base_url, 3600).await
}

pub async fn test_app_with_ttl(base_url: &str, url_ttl_secs: i64) -> TestApp {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_path = dir.path().join("study_share.db");
    std::fs::File::create(&db_path).expect("create db file");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}", db_path.display()))
        .await
        .expect("connect sqlite");
    db::run_migration_sql(&pool, include_str!("../../migrations/0001_init.sql"))
        .await
        .expect("run migrations");

    let jwt = JwtIdentity::new(JwtConfig::new(JWT_SECRET));
    let state = AppState::new(
        Arc::new(pool),
        dir.path().join("files"),
        UrlSigner::new(SIGNING_SECRET, url_ttl_secs),
        Arc::new(jwt.clone()),
        base_url,
    );

    TestApp { state, jwt, dir }
}

pub fn token_for(app: &TestApp, user_id: &str) -> String {
    app.jwt.issue(user_id).expect("issue token")
}

pub async fn grant_admin(app: &TestApp, user_id: &str) {
    app.state
        .records
        .grant_role(user_id, "admin")
        .await
        .expect("grant admin role");
}
