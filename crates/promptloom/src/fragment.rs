use crate::error::Result;
use chrono::{DateTime, Local, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// One unit of prompt material: a spec file on disk, or text synthesized at
/// composition time (runtime context, inline prompts).
///
/// `relative_path` is the fragment's stable identity — the ledger records it,
/// and two fragments with identical content but different paths are distinct.
/// `depth` counts the path separators under the specs root and is used only
/// for ordering.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub path: PathBuf,
    pub relative_path: String,
    pub depth: usize,
    content: Option<String>,
    file_backed: bool,
}

impl Fragment {
    /// A fragment discovered by the collector. Content is loaded later, when
    /// the pipeline first touches it.
    pub fn collected(path: PathBuf, relative_path: String, depth: usize) -> Self {
        Self {
            path,
            relative_path,
            depth,
            content: None,
            file_backed: true,
        }
    }

    /// A file-backed fragment whose content has already been read (augmented
    /// context files, re-expanded include targets).
    pub fn loaded(path: PathBuf, relative_path: String, depth: usize, content: String) -> Self {
        Self {
            path,
            relative_path,
            depth,
            content: Some(content),
            file_backed: true,
        }
    }

    /// A fragment with no backing file. The sentinel `name` becomes its path
    /// and identity; it is never recorded in the ledger.
    pub fn synthetic(name: &str, content: String) -> Self {
        let sentinel = format!("<{name}>");
        Self {
            path: PathBuf::from(&sentinel),
            relative_path: sentinel,
            depth: 0,
            content: Some(content),
            file_backed: false,
        }
    }

    /// The injected runtime-context fragment: embeds the invocation time so
    /// every request carries a wall-clock anchor.
    pub fn runtime_context(now: DateTime<Local>) -> Self {
        let iso = now.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S%.3fZ");
        // Matches the JS getTimezoneOffset convention: minutes, UTC minus local.
        let offset_minutes = -now.offset().local_minus_utc() / 60;
        let content = format!(
            "<system><runtime_context><now unix_millis=\"{}\" iso=\"{}\" offset_ts=\"{}\"/></runtime_context></system>",
            now.timestamp_millis(),
            iso,
            offset_minutes,
        );
        Self::synthetic("runtime-context", content)
    }

    /// An ephemeral single-shot prompt, used instead of reading the specs
    /// tree. The text is wrapped in a `<prompt>` section so extraction treats
    /// it like any other fragment.
    pub fn inline_prompt(text: &str) -> Self {
        Self::synthetic("inline-prompt", format!("<prompt>\n{text}\n</prompt>"))
    }

    /// Whether a file on disk backs this fragment. Only file-backed fragments
    /// enter the ledger.
    pub fn is_file_backed(&self) -> bool {
        self.file_backed
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Returns the fragment with its content replaced. Transformation steps
    /// use this instead of mutating in place, so nothing aliases across the
    /// worklist.
    pub fn with_content(mut self, content: String) -> Self {
        self.content = Some(content);
        self
    }

    /// Reads the backing file if the content has not been loaded yet.
    pub fn ensure_loaded(mut self) -> Result<Self> {
        if self.content.is_none() {
            self.content = Some(fs::read_to_string(&self.path)?);
        }
        Ok(self)
    }

    /// The directory include paths resolve against: the fragment's parent
    /// directory, or `cwd` for synthetic fragments.
    pub fn base_dir(&self, cwd: &Path) -> PathBuf {
        if self.file_backed
            && let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            return parent.to_path_buf();
        }
        cwd.to_path_buf()
    }
}

/// The ledger/ordering identity of `path` relative to the specs root: the
/// components under the root joined with `/`, or the full path rendered with
/// `/` separators when the path lies outside the root.
pub fn relative_identity(path: &Path, specs_dir: &Path, cwd: &Path) -> String {
    let abs = |p: &Path| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            cwd.join(p)
        }
    };
    let path_abs = abs(path);
    let root_abs = abs(specs_dir);
    match path_abs.strip_prefix(&root_abs) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path_abs.to_string_lossy().replace('\\', "/"),
    }
}
