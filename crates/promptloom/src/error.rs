use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoomError>;

#[derive(Debug, Error)]
pub enum LoomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("specs directory not found: {0}")]
    SpecsDirNotFound(PathBuf),

    #[error("no new fragments to compose")]
    NoFragments,

    #[error("failed to include {target} (referenced from {fragment}): {source}")]
    IncludeUnreadable {
        target: PathBuf,
        fragment: String,
        source: std::io::Error,
    },

    #[error("no previous output manifest at {0}")]
    ManifestNotFound(PathBuf),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Failure of the external generation collaborator.
///
/// Lives next to the [`Generate`](crate::engine::Generate) trait so the
/// engine can name provider failures without depending on any HTTP types.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("response missing structured file list: {0}")]
    MalformedResponse(String),
}
