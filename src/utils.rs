// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utility functions for codefind

use std::path::{Path, PathBuf};

/// Location of an index found by walking up the directory tree
#[derive(Debug)]
pub struct IndexRoot {
    /// Directory that owns the index
    pub root: PathBuf,
    /// `root` joined with the persist directory
    pub index_path: PathBuf,
    /// True when the index belongs to an ancestor of the start directory
    pub is_parent: bool,
}

/// Nearest directory at or above `start` that contains `persist_dir`.
pub fn find_index_root(start: impl AsRef<Path>, persist_dir: &str) -> Option<IndexRoot> {
    let start = start.as_ref();
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

    start.ancestors().find_map(|dir| {
        let index_path = dir.join(persist_dir);
        index_path.is_dir().then(|| IndexRoot {
            root: dir.to_path_buf(),
            index_path,
            is_parent: dir != start,
        })
    })
}

/// Normalize a stored or user-supplied relative path: `/` separators, no
/// leading `./`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}

/// Path of `path` relative to `root`, normalized. Paths outside `root` are
/// returned as given.
pub fn relative_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    normalize_path(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_index_root_in_current_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".codefind")).unwrap();

        let result = find_index_root(dir.path(), ".codefind").unwrap();
        assert_eq!(result.root, dir.path().canonicalize().unwrap());
        assert!(!result.is_parent);
    }

    #[test]
    fn find_index_root_in_parent() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".codefind")).unwrap();

        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let result = find_index_root(&subdir, ".codefind").unwrap();
        assert_eq!(result.root, dir.path().canonicalize().unwrap());
        assert!(result.is_parent);
    }

    #[test]
    fn find_index_root_none() {
        let dir = TempDir::new().unwrap();
        assert!(find_index_root(dir.path(), ".codefind-missing-here").is_none());
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path("./src/auth.py"), "src/auth.py");
        assert_eq!(normalize_path("src\\db\\models.py"), "src/db/models.py");
        assert_eq!(normalize_path("auth.py"), "auth.py");
    }

    #[test]
    fn relative_to_root() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(Path::new("/repo/src/a.py"), root), "src/a.py");
        assert_eq!(relative_path(Path::new("b.py"), root), "b.py");
    }
}
