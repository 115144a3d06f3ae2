use crate::error::{LoomError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One file returned by the generation collaborator. The `path` is the
/// requested destination, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// The persisted record of the most recent generation round, replayable
/// without calling the model again. Holds the requested paths, not the
/// post-collision-rename ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputManifest {
    pub files: Vec<GeneratedFile>,
}

fn timestamp_suffix(now: &DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-")
}

/// Picks a destination that does not exist yet. An occupied path gets a
/// sortable timestamp inserted before the extension; in the unlikely event
/// that candidate is occupied too, a counter is added until one is free.
pub fn unique_destination(path: &Path, now: DateTime<Utc>) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let ts = timestamp_suffix(&now);

    let mut candidate = dir.join(format!("{stem}_{ts}{ext}"));
    let mut counter = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}_{ts}-{counter}{ext}"));
        counter += 1;
    }
    candidate
}

/// Writes every generated file under `root`, never overwriting anything.
///
/// A leading `/` on a requested path is stripped before joining (the model is
/// instructed to return relative paths; this enforces it). Parent directories
/// are created as needed. Returns the paths actually written, which differ
/// from the requested ones wherever the collision rename applied.
pub fn materialize(
    files: &[GeneratedFile],
    root: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let rel = file.path.trim_start_matches('/');
        let dest = root.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let final_path = unique_destination(&dest, now);
        if final_path != dest {
            log::warn!(
                "{} already exists, writing {} instead",
                dest.display(),
                final_path.display()
            );
        }
        fs::write(&final_path, &file.content)?;
        written.push(final_path);
    }
    Ok(written)
}

/// Overwrites the manifest with this round's file set. The write goes
/// through a named temp file in the same directory so a crash never leaves a
/// half-written manifest behind.
pub fn write_manifest(path: &Path, files: &[GeneratedFile]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let manifest = OutputManifest {
        files: files.to_vec(),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&tmp, &manifest)?;
    tmp.persist(path).map_err(|e| LoomError::Io(e.error))?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<OutputManifest> {
    if !path.exists() {
        return Err(LoomError::ManifestNotFound(path.to_path_buf()));
    }
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Appends the round's prompt to the history log, with a timestamp header.
pub fn append_prompt_history(path: &Path, prompt: &str, now: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "\n=== {} ===\n{prompt}",
        now.format("%Y-%m-%dT%H:%M:%S%.3fZ")
    )?;
    Ok(())
}
