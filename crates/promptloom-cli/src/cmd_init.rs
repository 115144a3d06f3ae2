use crate::config::{self, Config, DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_SPECS_DIR};
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

const DEFAULT_ROOT_XML: &str = r#"<system>
You are a code generator driven by a tree of XML spec fragments (loom {{version}}).
Respect the conventions and context provided in the system prompt. Generate
complete files; never elide content with placeholders.
</system>
"#;

/// First-run wizard: asks for the API key, model, and specs folder, stores
/// the configuration under the home directory, and seeds the specs folder
/// with a default `root.xml`.
pub fn run() -> Result<()> {
    let path = config::config_file().context("home directory not found")?;
    println!("loom configuration — will be stored in {}", path.display());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let api_key = ask(&mut input, "Enter your API key: ")?;
    anyhow::ensure!(!api_key.is_empty(), "API key is required");
    let model = ask(&mut input, &format!("Model name (default: {DEFAULT_MODEL}): "))?;
    let specs_dir = ask(&mut input, &format!("Specs folder path (default: {DEFAULT_SPECS_DIR}): "))?;

    let config = Config {
        api_key,
        api_url: DEFAULT_API_URL.to_string(),
        model: or_default(model, DEFAULT_MODEL),
        specs_dir: or_default(specs_dir, DEFAULT_SPECS_DIR),
    };

    let saved = config::save(&config)?;
    if seed_specs(Path::new(&config.specs_dir))? {
        println!("Created {}/root.xml with default content.", config.specs_dir);
    }
    println!("Configuration saved to {}", saved.display());
    Ok(())
}

fn ask(input: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn or_default(answer: String, default: &str) -> String {
    if answer.is_empty() {
        default.to_string()
    } else {
        answer
    }
}

/// Creates the specs folder and, when absent, a starter `root.xml`.
/// Returns whether the starter file was written.
fn seed_specs(specs_dir: &Path) -> Result<bool> {
    fs::create_dir_all(specs_dir)
        .with_context(|| format!("failed to create specs folder {}", specs_dir.display()))?;
    let root = specs_dir.join("root.xml");
    if root.exists() {
        return Ok(false);
    }
    let content = DEFAULT_ROOT_XML.replace("{{version}}", env!("CARGO_PKG_VERSION"));
    fs::write(&root, content)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_seed_creates_root_xml() {
        let temp = TempDir::new().unwrap();
        let specs = temp.path().join("specs");
        assert!(seed_specs(&specs).unwrap());

        let content = fs::read_to_string(specs.join("root.xml")).unwrap();
        assert!(content.starts_with("<system>"));
        assert!(content.contains(env!("CARGO_PKG_VERSION")));
        assert!(!content.contains("{{version}}"));
    }

    #[test]
    fn test_seed_does_not_overwrite_existing_root() {
        let temp = TempDir::new().unwrap();
        let specs = temp.path().join("specs");
        fs::create_dir_all(&specs).unwrap();
        fs::write(specs.join("root.xml"), "<system>mine</system>").unwrap();

        assert!(!seed_specs(&specs).unwrap());
        assert_eq!(
            fs::read_to_string(specs.join("root.xml")).unwrap(),
            "<system>mine</system>"
        );
    }

    #[test]
    fn test_ask_trims_answer() {
        let mut input = io::Cursor::new("  padded answer  \n");
        assert_eq!(ask(&mut input, "q: ").unwrap(), "padded answer");
    }

    #[test]
    fn test_or_default() {
        assert_eq!(or_default(String::new(), "fallback"), "fallback");
        assert_eq!(or_default("given".into(), "fallback"), "given");
    }
}
