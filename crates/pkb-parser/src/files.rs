//! Directory walking and exclusion rules (§4.2), via a `should_descend`/
//! `filter_entry` walkdir pattern.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

const PROPOSALS_DIR: &str = "_Proposals";

#[derive(Debug, Clone)]
pub struct MarkdownFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
}

pub fn collect_markdown_files(root: &Path) -> anyhow::Result<Vec<MarkdownFile>> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| should_descend(entry, root));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        if !is_markdown(entry.path()) || is_excluded_file(entry.path(), root) {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push(MarkdownFile {
            abs_path: entry.path().to_path_buf(),
            rel_path,
        });
    }
    Ok(files)
}

fn should_descend(entry: &DirEntry, root: &Path) -> bool {
    if entry.path() == root {
        return true;
    }
    if entry.file_type().is_dir() {
        if is_dot_dir(entry.path()) {
            return false;
        }
        if is_proposals_dir(entry.path(), root) {
            return false;
        }
    }
    true
}

fn is_dot_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_proposals_dir(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .ok()
        .and_then(|rel| rel.components().next())
        .map(|c| c.as_os_str() == OsStr::new(PROPOSALS_DIR))
        .unwrap_or(false)
}

fn is_excluded_file(path: &Path, root: &Path) -> bool {
    let name = path.file_name().and_then(OsStr::to_str).unwrap_or_default();
    if name.ends_with(".proposal") || name.ends_with(".rejected.md") {
        return true;
    }
    if let Ok(rel) = path.strip_prefix(root) {
        if rel
            .components()
            .any(|c| c.as_os_str() == OsStr::new(PROPOSALS_DIR))
        {
            return true;
        }
    }
    false
}

fn is_markdown(path: &Path) -> bool {
    matches!(path.extension().and_then(OsStr::to_str), Some(ext) if ext.eq_ignore_ascii_case("md"))
}

/// Every non-excluded relative directory path under `root`, with every
/// ancestor prefix materialized.
pub fn folder_paths(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut paths: BTreeMap<String, ()> = BTreeMap::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| should_descend(entry, root));

    for entry in walker {
        let entry = entry?;
        if entry.path() == root || !entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)?
            .to_string_lossy()
            .replace('\\', "/");
        materialize_prefixes(&rel, &mut paths);
    }

    Ok(paths.into_keys().collect())
}

fn materialize_prefixes(rel_path: &str, out: &mut BTreeMap<String, ()>) {
    let mut acc: Vec<&str> = Vec::new();
    for component in rel_path.split('/') {
        if component.is_empty() {
            continue;
        }
        acc.push(component);
        out.insert(acc.join("/"), ());
    }
}

/// Map of folder path to the relative path of a sibling `.md` index page,
/// when one exists (a `.md` file with the same base name as the directory).
pub fn folder_index_pages(root: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let mut index_pages = BTreeMap::new();
    for folder in folder_paths(root)? {
        let candidate = root.join(format!("{folder}.md"));
        if candidate.is_file() {
            index_pages.insert(folder.clone(), format!("{folder}.md"));
        }
    }
    Ok(index_pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn given_proposals_and_dot_dirs_when_walked_then_excluded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.md"), "hello").unwrap();
        fs::create_dir_all(dir.path().join("_Proposals")).unwrap();
        fs::write(dir.path().join("_Proposals/X.proposal"), "x").unwrap();
        fs::create_dir_all(dir.path().join(".state")).unwrap();
        fs::write(dir.path().join(".state/hidden.md"), "hidden").unwrap();
        fs::write(dir.path().join("B.rejected.md"), "rejected").unwrap();

        let files = collect_markdown_files(dir.path()).unwrap();
        let rel_paths: Vec<_> = files.iter().map(|f| f.rel_path.clone()).collect();
        assert_eq!(rel_paths, vec!["A.md".to_string()]);
    }

    #[test]
    fn given_nested_dirs_when_enumerated_then_every_prefix_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        let paths = folder_paths(dir.path()).unwrap();
        assert!(paths.contains(&"a".to_string()));
        assert!(paths.contains(&"a/b".to_string()));
        assert!(paths.contains(&"a/b/c".to_string()));
    }
}
