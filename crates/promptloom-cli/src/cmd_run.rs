use anyhow::{Context, Result};
use chrono::{Local, Utc};
use promptloom::{Engine, Fragment, Generate, LoomError, Workspace};

/// The default action: resolve the specs tree (or an inline prompt), then
/// either print the composed request (`--dry-run`) or call the model and
/// materialize what it returns.
pub fn run(dry_run: bool, inline: Option<String>) -> Result<()> {
    let config = crate::config::load()?
        .context("no configuration found — run `loom init` first")?;

    let workspace = Workspace::new(&config.specs_dir);
    let engine = Engine::new(workspace)?;
    let resolved = resolve(&engine, inline.as_deref())?;
    log::debug!("resolved {} fragment(s)", resolved.len());

    if dry_run {
        return execute(&engine, &NoGenerator, resolved, true);
    }

    anyhow::ensure!(
        !config.api_key.is_empty(),
        "API key not configured — run `loom init` or set LOOM_API_KEY"
    );
    let backend = promptloom_llm::Backend::for_url(&config.api_url, &config.api_key, &config.model);
    execute(&engine, &backend, resolved, false)
}

fn resolve(engine: &Engine, inline: Option<&str>) -> Result<Vec<Fragment>> {
    let result = match inline {
        Some(text) => engine.resolve_inline(text, Local::now()),
        None => engine.resolve(Local::now()),
    };
    result.map_err(|e| match e {
        LoomError::NoFragments => anyhow::anyhow!(
            "no new fragments to send — every spec file was already incorporated in a previous run"
        ),
        other => anyhow::Error::new(other),
    })
}

/// Dry runs only render and print; the generator is never touched and no
/// cache state is written. Real runs hand everything to the engine.
fn execute(
    engine: &Engine,
    generator: &dyn Generate,
    resolved: Vec<Fragment>,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        let sections = engine.render(&resolved);
        println!("=== SYSTEM ===");
        println!("{}", sections.system);
        println!("\n=== PROMPT ===");
        println!("{}", sections.prompt);
        return Ok(());
    }

    let outcome = engine.generate_round(generator, &resolved, Utc::now())?;
    for path in &outcome.written {
        println!("✓ wrote {}", path.display());
    }
    println!("Generated {} file(s).", outcome.files.len());
    Ok(())
}

/// Placeholder generator for the dry-run path, which must never be invoked.
struct NoGenerator;

impl Generate for NoGenerator {
    fn generate(
        &self,
        _system: &str,
        _prompt: &str,
    ) -> std::result::Result<Vec<promptloom::GeneratedFile>, promptloom::GenerateError> {
        unreachable!("dry run must not invoke the generator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom::{GenerateError, GeneratedFile};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct StubGenerator(Vec<GeneratedFile>);
    impl Generate for StubGenerator {
        fn generate(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> std::result::Result<Vec<GeneratedFile>, GenerateError> {
            Ok(self.0.clone())
        }
    }

    fn engine_in(temp: &TempDir) -> Engine {
        let workspace =
            Workspace::new(temp.path().join("specs")).with_cache_dir(temp.path().join(".loom"));
        Engine::with_cwd(workspace, temp.path().to_path_buf())
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }

    #[test]
    fn test_dry_run_never_touches_generator_or_cache() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "specs/task.xml", "<prompt>do it</prompt>");

        let engine = engine_in(&temp);
        let resolved = resolve(&engine, None).unwrap();
        // NoGenerator panics if invoked; a clean return proves purity.
        execute(&engine, &NoGenerator, resolved, true).unwrap();

        assert!(!temp.path().join(".loom").exists());
    }

    #[test]
    fn test_real_run_generates_and_records() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "specs/task.xml", "<prompt>do it</prompt>");

        let engine = engine_in(&temp);
        let resolved = resolve(&engine, None).unwrap();
        let stub = StubGenerator(vec![GeneratedFile {
            path: "out.txt".into(),
            content: "payload".into(),
        }]);
        execute(&engine, &stub, resolved, false).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("out.txt")).unwrap(),
            "payload"
        );
        assert!(temp.path().join(".loom/ledger.txt").exists());
        assert!(temp.path().join(".loom/last-output.json").exists());
    }

    #[test]
    fn test_inline_prompt_resolution() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp);
        let resolved = resolve(&engine, Some("quick question")).unwrap();
        let sections = engine.render(&resolved);
        assert_eq!(sections.prompt, "quick question");
    }

    #[test]
    fn test_exhausted_specs_give_friendly_error() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "specs/task.xml", "<prompt>once</prompt>");

        let engine = engine_in(&temp);
        let resolved = resolve(&engine, None).unwrap();
        execute(&engine, &StubGenerator(vec![]), resolved, false).unwrap();

        let err = resolve(&engine, None).unwrap_err();
        assert!(err.to_string().contains("no new fragments"));
    }
}
