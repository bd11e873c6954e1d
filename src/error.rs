//! Custom error types for docsight

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for docsight operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Sidecar binary '{binary}' not found (searched {} locations)", searched.len())]
    BinaryNotFound {
        binary: String,
        searched: Vec<PathBuf>,
    },

    #[error("Failed to spawn sidecar at {}: {source}", path.display())]
    SpawnFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sidecar did not become healthy within {}ms", timeout.as_millis())]
    StartupTimeout { timeout: Duration },

    #[error("Sidecar exited before becoming ready: {0}")]
    SidecarExited(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailure(String),

    #[error("Failed to open store at {}: {reason}", path.display())]
    StoreOpen { path: PathBuf, reason: String },

    #[error("Migration step '{step}' failed: {reason}")]
    Migration { step: &'static str, reason: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error should halt application startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::StoreOpen { .. } | Error::Config(_))
    }
}

/// Result type alias for docsight
pub type Result<T> = std::result::Result<T, Error>;
