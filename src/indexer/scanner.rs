// SPDX-License-Identifier: MIT OR Apache-2.0

//! File scanner using the ignore crate (same as ripgrep)

use anyhow::Result;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::filters::{compile_excludes, is_excluded, CompiledGlob};
use crate::utils::relative_path;

/// Candidate file found under the root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated
    pub relative: String,
}

/// File scanner that respects .gitignore
pub struct FileScanner {
    root: PathBuf,
    extensions: HashSet<String>,
    excludes: Vec<CompiledGlob>,
    skip_dir: Option<String>,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, extensions: Vec<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: extensions.into_iter().map(|e| e.to_lowercase()).collect(),
            excludes: Vec::new(),
            skip_dir: None,
        }
    }

    /// Glob patterns matched against root-relative paths
    pub fn with_excludes(mut self, patterns: &[String]) -> Self {
        self.excludes = compile_excludes(patterns);
        self
    }

    /// Directory name never descended into (the index itself)
    pub fn skip_dir(mut self, name: &str) -> Self {
        self.skip_dir = Some(name.to_string());
        self
    }

    /// List matching files, sorted by relative path
    pub fn list_files(&self) -> Result<Vec<ScannedFile>> {
        let (tx, rx) = mpsc::channel();

        let skip_dir = self.skip_dir.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_str().unwrap_or_default();
                name != ".git" && skip_dir.as_deref() != Some(name)
            })
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();
            let root = self.root.clone();
            let extensions = &self.extensions;
            let excludes = &self.excludes;

            Box::new(move |entry| {
                let Ok(entry) = entry else {
                    return ignore::WalkState::Continue;
                };
                let path = entry.path();
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    return ignore::WalkState::Continue;
                }

                let allowed = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| extensions.contains(&ext.to_lowercase()))
                    .unwrap_or(false);
                if !allowed {
                    return ignore::WalkState::Continue;
                }

                let relative = relative_path(path, &root);
                if is_excluded(&relative, excludes) {
                    return ignore::WalkState::Continue;
                }

                let _ = tx.send(ScannedFile {
                    path: path.to_path_buf(),
                    relative,
                });
                ignore::WalkState::Continue
            })
        });

        drop(tx);
        let mut files: Vec<ScannedFile> = rx.into_iter().collect();
        files.sort();
        Ok(files)
    }
}
