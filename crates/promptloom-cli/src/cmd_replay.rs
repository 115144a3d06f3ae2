use anyhow::{Context, Result};
use chrono::Utc;
use promptloom::{Engine, LoomError, Workspace};
use std::path::PathBuf;

/// Re-materializes the last-output manifest without calling the model.
/// Collision renames still apply, so nothing already on disk is touched.
pub fn run() -> Result<()> {
    let config = crate::config::load()?
        .context("no configuration found — run `loom init` first")?;
    let workspace = Workspace::new(&config.specs_dir);
    let engine = Engine::new(workspace)?;

    let written = replay_with(&engine)?;
    for path in &written {
        println!("✓ wrote {}", path.display());
    }
    println!("Files re-written from last output.");
    Ok(())
}

fn replay_with(engine: &Engine) -> Result<Vec<PathBuf>> {
    engine.replay(Utc::now()).map_err(|e| match e {
        LoomError::ManifestNotFound(_) => {
            anyhow::anyhow!("no previous output found — run `loom` first")
        }
        other => anyhow::Error::new(other),
    })
}
