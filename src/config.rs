use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Secret used to sign time-limited file URLs.
    pub signing_secret: String,
    /// Secret used to validate bearer access tokens.
    pub jwt_secret: String,
    /// Base URL clients use to reach this service; signed URLs are
    /// minted against it.
    pub public_base_url: String,
    /// Lifetime of minted signed URLs, in seconds.
    pub url_ttl_secs: i64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Study Share API")]
pub struct Args {
    /// Host to bind to (overrides STUDY_SHARE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides STUDY_SHARE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where file payloads are stored (overrides STUDY_SHARE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides STUDY_SHARE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Signed-URL secret (overrides STUDY_SHARE_SIGNING_SECRET)
    #[arg(long)]
    pub signing_secret: Option<String>,

    /// Access-token secret (overrides STUDY_SHARE_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Public base URL for signed links (overrides STUDY_SHARE_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Signed-URL lifetime in seconds (overrides STUDY_SHARE_URL_TTL_SECS)
    #[arg(long)]
    pub url_ttl_secs: Option<i64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Grant the admin role to a user id, then exit
    #[arg(long)]
    pub grant_admin: Option<String>,
}

/// What the process should do after parsing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Migrate,
    GrantAdmin(String),
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and a run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("STUDY_SHARE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("STUDY_SHARE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing STUDY_SHARE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading STUDY_SHARE_PORT"),
        };
        let env_storage =
            env::var("STUDY_SHARE_STORAGE_DIR").unwrap_or_else(|_| "./data/files".into());
        let env_db = env::var("STUDY_SHARE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/study_share.db".into());
        let env_signing = env::var("STUDY_SHARE_SIGNING_SECRET")
            .unwrap_or_else(|_| "change-this-signing-secret".into());
        let env_jwt = env::var("STUDY_SHARE_JWT_SECRET")
            .unwrap_or_else(|_| "change-this-jwt-secret".into());
        let env_ttl = match env::var("STUDY_SHARE_URL_TTL_SECS") {
            Ok(value) => value
                .parse::<i64>()
                .with_context(|| format!("parsing STUDY_SHARE_URL_TTL_SECS value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3600,
            Err(err) => return Err(err).context("reading STUDY_SHARE_URL_TTL_SECS"),
        };

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or_else(|| env::var("STUDY_SHARE_PUBLIC_BASE_URL").ok())
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", port));

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            signing_secret: args.signing_secret.unwrap_or(env_signing),
            jwt_secret: args.jwt_secret.unwrap_or(env_jwt),
            public_base_url,
            url_ttl_secs: args.url_ttl_secs.unwrap_or(env_ttl),
        };

        let mode = if args.migrate {
            RunMode::Migrate
        } else if let Some(user_id) = args.grant_admin {
            RunMode::GrantAdmin(user_id)
        } else {
            RunMode::Serve
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
