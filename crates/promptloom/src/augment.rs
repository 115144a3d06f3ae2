use crate::error::Result;
use crate::fragment::Fragment;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known context fragments probed for in every enclosing directory.
const SPECIAL_FILES: [&str; 2] = ["root.xml", "conventions.xml"];

/// Injects ancestor context into the working set.
///
/// Every directory enclosing a working-set fragment (up to and including the
/// specs root) is probed for `root.xml` and `conventions.xml`; any found and
/// not already present are read and appended. The combined set is then
/// reordered so that `root.xml` fragments come first, `conventions.xml`
/// second, and everything else after, ties broken by relative-path length —
/// shorter paths sit closer to the root and win. Missing special files are
/// not an error.
pub fn augment(mut fragments: Vec<Fragment>, specs_dir: &Path) -> Result<Vec<Fragment>> {
    let present: HashSet<PathBuf> = fragments.iter().map(|f| f.path.clone()).collect();

    let mut directories: Vec<PathBuf> = Vec::new();
    let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
    for fragment in fragments.iter().filter(|f| f.is_file_backed()) {
        let mut dir = match fragment.path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => continue,
        };
        while dir.starts_with(specs_dir) {
            if seen_dirs.insert(dir.clone()) {
                directories.push(dir.clone());
            }
            if dir == specs_dir {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }
    }

    let mut added: HashSet<PathBuf> = HashSet::new();
    for dir in &directories {
        for name in SPECIAL_FILES {
            let candidate = dir.join(name);
            if present.contains(&candidate) || added.contains(&candidate) {
                continue;
            }
            if !candidate.is_file() {
                continue;
            }
            let content = fs::read_to_string(&candidate)?;
            let rel = candidate
                .strip_prefix(specs_dir)
                .expect("candidate dir is under the specs root");
            let components: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let depth = components.len() - 1;
            added.insert(candidate.clone());
            fragments.push(Fragment::loaded(candidate, components.join("/"), depth, content));
        }
    }

    // Stable sort: discovery order survives within each (priority, length) tie.
    fragments.sort_by_key(|f| (priority(f), f.relative_path.len()));
    Ok(fragments)
}

fn priority(fragment: &Fragment) -> u8 {
    match fragment.path.file_name().and_then(|n| n.to_str()) {
        Some("root.xml") => 0,
        Some("conventions.xml") => 1,
        _ => 2,
    }
}
