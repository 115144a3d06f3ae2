use std::fs;
use std::path::{Path, PathBuf};

/// Resolves every path the composer touches: the specs tree it reads and the
/// cache directory holding the ledger, the last-output manifest, and the
/// prompt history.
///
/// Threaded explicitly through the engine — there is no process-wide default.
#[derive(Debug, Clone)]
pub struct Workspace {
    specs_dir: PathBuf,
    cache_dir: PathBuf,
}

pub const DEFAULT_CACHE_DIR: &str = ".loom";

impl Workspace {
    pub fn new<P: Into<PathBuf>>(specs_dir: P) -> Self {
        Self {
            specs_dir: specs_dir.into(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }

    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn specs_dir(&self) -> &Path {
        &self.specs_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Relative paths already sent in previous rounds, one per line.
    pub fn ledger_file(&self) -> PathBuf {
        self.cache_dir.join("ledger.txt")
    }

    /// The file set returned by the most recent successful generation.
    pub fn manifest_file(&self) -> PathBuf {
        self.cache_dir.join("last-output.json")
    }

    /// Append-only log of the prompts sent, with timestamps.
    pub fn prompts_file(&self) -> PathBuf {
        self.cache_dir.join("prompts.txt")
    }

    pub fn ensure_cache_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }
}
