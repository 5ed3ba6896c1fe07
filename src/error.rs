use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to load {path:?}: {source}")]
    Dotenv {
        path: PathBuf,
        source: dotenvy::Error,
    },
}

#[derive(Debug, Error)]
#[error("failed to read stats from {path:?}: {source}")]
pub struct StoreError {
    pub path: PathBuf,
    pub source: rusqlite::Error,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to load service account from {path:?}: {source}")]
    Credentials {
        path: PathBuf,
        source: gcp_auth::Error,
    },
    #[error("failed to get access token: {0}")]
    Token(gcp_auth::Error),
    #[error("sheets request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid sheets url {0}")]
    Url(String),
    #[error("sheets api error {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed cursor: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Fatal failures of a sync run. Cursor corruption is not one of them, it is recovered from
/// inside [CursorStore::read](crate::cursor::CursorStore::read).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("failed to advance cursor at {path:?}: {source}")]
    CursorWrite { path: PathBuf, source: CursorError },
}
