use crate::error::{LoomError, Result};
use crate::fragment::Fragment;
use std::fs;
use std::path::Path;

/// Discovers every `.xml` fragment under `specs_dir`, metadata only.
///
/// The result is ordered by depth ascending, then relative path ascending —
/// a shallow-first traversal that does not depend on filesystem listing
/// order. Content is not read here.
pub fn collect(specs_dir: &Path) -> Result<Vec<Fragment>> {
    if !specs_dir.is_dir() {
        return Err(LoomError::SpecsDirNotFound(specs_dir.to_path_buf()));
    }

    let mut fragments = Vec::new();
    walk(specs_dir, specs_dir, &mut fragments)?;
    fragments.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
    log::debug!(
        "collected {} fragment(s) under {}",
        fragments.len(),
        specs_dir.display()
    );
    Ok(fragments)
}

fn walk(dir: &Path, root: &Path, out: &mut Vec<Fragment>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, root, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("xml") {
            let rel = path
                .strip_prefix(root)
                .expect("walked path is under the root");
            let components: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let depth = components.len() - 1;
            out.push(Fragment::collected(path, components.join("/"), depth));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "<prompt>x</prompt>").unwrap();
    }

    #[test]
    fn test_missing_root_errors() {
        let result = collect(Path::new("/nonexistent/specs"));
        assert!(matches!(result, Err(LoomError::SpecsDirNotFound(_))));
    }

    #[test]
    fn test_empty_dir_yields_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(collect(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_xml_filter() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.xml");
        fs::write(temp.path().join("notes.txt"), "skip me").unwrap();
        fs::write(temp.path().join("b.XML"), "case matters").unwrap();

        let fragments = collect(temp.path()).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].relative_path, "a.xml");
    }

    #[test]
    fn test_depth_and_ordering() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "deep/nested/c.xml");
        touch(temp.path(), "z.xml");
        touch(temp.path(), "a.xml");
        touch(temp.path(), "deep/b.xml");

        let fragments = collect(temp.path()).unwrap();
        let rels: Vec<&str> = fragments.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["a.xml", "z.xml", "deep/b.xml", "deep/nested/c.xml"]);
        assert_eq!(fragments[0].depth, 0);
        assert_eq!(fragments[2].depth, 1);
        assert_eq!(fragments[3].depth, 2);
    }

    #[test]
    fn test_same_depth_sorts_by_relative_path() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "b/one.xml");
        touch(temp.path(), "a/two.xml");

        let fragments = collect(temp.path()).unwrap();
        let rels: Vec<&str> = fragments.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["a/two.xml", "b/one.xml"]);
    }

    #[test]
    fn test_determinism_across_runs() {
        let temp = TempDir::new().unwrap();
        for rel in ["m.xml", "a/n.xml", "a/b/o.xml", "z.xml", "a/p.xml"] {
            touch(temp.path(), rel);
        }
        let first: Vec<String> = collect(temp.path())
            .unwrap()
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        for _ in 0..5 {
            let again: Vec<String> = collect(temp.path())
                .unwrap()
                .into_iter()
                .map(|f| f.relative_path)
                .collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_content_not_loaded() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.xml");
        let fragments = collect(temp.path()).unwrap();
        assert!(fragments[0].content().is_none());
    }
}
