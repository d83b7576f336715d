// tests/common/mod.rs

//! Shared fixtures for the integration tests

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a file with content, making parent directories as needed.
pub fn touch(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// The canonical scenario tree: `a.bin`, `sub/b.bin`, `sub/c.bin`.
pub fn scenario_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    touch(&dir.path().join("a.bin"), b"alpha content");
    touch(&dir.path().join("sub/b.bin"), b"bravo content");
    touch(&dir.path().join("sub/c.bin"), b"charlie content");
    dir
}

/// Every regular file below `root`, as (relative slash path, content),
/// sorted by path.
pub fn tree_snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    collect(root, root, &mut files);
    files.sort();
    files
}

fn collect(root: &Path, dir: &Path, files: &mut Vec<(String, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push((rel, fs::read(&path).unwrap()));
        }
    }
}

/// Relative paths of all files below `root`, sorted.
pub fn tree_paths(root: &Path) -> Vec<String> {
    tree_snapshot(root).into_iter().map(|(p, _)| p).collect()
}

#[allow(dead_code)]
pub fn file_path(dir: &TempDir, rel: &str) -> PathBuf {
    dir.path().join(rel)
}
