use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_SPECS_DIR: &str = "specs";

/// Fully-resolved tool configuration: environment overrides beat the config
/// file, and the file beats the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub specs_dir: String,
}

/// On-disk shape — everything optional so partial files still merge.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    api_key: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    specs_dir: Option<String>,
}

#[derive(Debug, Default)]
struct EnvOverrides {
    api_key: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
}

fn env_overrides() -> EnvOverrides {
    let get = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    EnvOverrides {
        api_key: get("LOOM_API_KEY"),
        api_url: get("LOOM_API_URL"),
        model: get("LOOM_MODEL"),
    }
}

fn merge(env: EnvOverrides, file: FileConfig) -> Config {
    Config {
        api_key: env.api_key.or(file.api_key).unwrap_or_default(),
        api_url: env
            .api_url
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        model: env
            .model
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        specs_dir: file
            .specs_dir
            .unwrap_or_else(|| DEFAULT_SPECS_DIR.to_string()),
    }
}

pub fn config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".loom").join("config.json"))
}

/// Loads the configuration, or `None` when neither a config file nor a
/// `LOOM_API_KEY` environment override exists.
pub fn load() -> Result<Option<Config>> {
    let env = env_overrides();
    match config_file() {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file: FileConfig = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok(Some(merge(env, file)))
        }
        _ if env.api_key.is_some() => Ok(Some(merge(env, FileConfig::default()))),
        _ => Ok(None),
    }
}

pub fn save(config: &Config) -> Result<PathBuf> {
    let path = config_file().context("home directory not found")?;
    save_to(&path, config)?;
    Ok(path)
}

fn save_to(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    // The file holds an API key; keep it private to the user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_env_beats_file() {
        let env = EnvOverrides {
            api_key: Some("env-key".into()),
            api_url: Some("https://env.example".into()),
            model: Some("env-model".into()),
        };
        let file = FileConfig {
            api_key: Some("file-key".into()),
            api_url: Some("https://file.example".into()),
            model: Some("file-model".into()),
            specs_dir: Some("custom-specs".into()),
        };
        let config = merge(env, file);
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.api_url, "https://env.example");
        assert_eq!(config.model, "env-model");
        assert_eq!(config.specs_dir, "custom-specs");
    }

    #[test]
    fn test_merge_file_beats_defaults() {
        let file = FileConfig {
            api_key: Some("file-key".into()),
            api_url: None,
            model: Some("file-model".into()),
            specs_dir: None,
        };
        let config = merge(EnvOverrides::default(), file);
        assert_eq!(config.api_key, "file-key");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, "file-model");
        assert_eq!(config.specs_dir, DEFAULT_SPECS_DIR);
    }

    #[test]
    fn test_merge_all_defaults() {
        let config = merge(EnvOverrides::default(), FileConfig::default());
        assert_eq!(config.api_key, "");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.specs_dir, DEFAULT_SPECS_DIR);
    }

    #[test]
    fn test_save_to_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".loom/config.json");
        let config = Config {
            api_key: "sk-test".into(),
            api_url: DEFAULT_API_URL.into(),
            model: "m".into(),
            specs_dir: "specs".into(),
        };
        save_to(&path, &config).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: FileConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.api_key.as_deref(), Some("sk-test"));
        assert_eq!(parsed.model.as_deref(), Some("m"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let config = Config {
            api_key: "sk-test".into(),
            api_url: DEFAULT_API_URL.into(),
            model: "m".into(),
            specs_dir: "specs".into(),
        };
        save_to(&path, &config).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_partial_file_config_parses() {
        let file: FileConfig = serde_json::from_str(r#"{"api_key": "only-key"}"#).unwrap();
        assert_eq!(file.api_key.as_deref(), Some("only-key"));
        assert!(file.model.is_none());
    }
}
