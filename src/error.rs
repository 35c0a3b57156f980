use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Directory walk failed: {0}")]
    GlobWalk(#[from] glob::GlobError),

    #[error("Malformed mirror url: {0}")]
    MalformedMirrorUrl(String),

    /// reqwest refused to build the request (bad header value, ...).
    #[error("Invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },

    #[error("Not found: {0:?}")]
    NotFound(PathBuf),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, CheckerError>;
