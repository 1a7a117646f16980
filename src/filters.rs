//! Path and metadata filtering shared by indexing and search
//!
//! Exclude patterns are globs compiled once to regexes; search filters are a
//! case-insensitive path substring and an exact language name.

use regex::Regex;

use crate::embedding::storage::ChunkMetadata;

/// A precompiled glob pattern for efficient repeated matching
#[derive(Debug, Clone)]
pub struct CompiledGlob {
    regex: Regex,
}

impl CompiledGlob {
    /// Compile a glob pattern to a regex
    pub fn new(pattern: &str) -> Option<Self> {
        // - `**` matches zero or more path segments
        // - `*` matches any characters except `/`
        let regex_pattern = regex::escape(pattern)
            .replace(r"\*\*/", "{{DOUBLESTARSLASH}}")
            .replace(r"/\*\*", "{{SLASHDOUBLESTAR}}")
            .replace(r"\*\*", ".*")
            .replace(r"\*", "[^/]*")
            .replace(r"\?", "[^/]")
            .replace("{{DOUBLESTARSLASH}}", "(.*/)?")
            .replace("{{SLASHDOUBLESTAR}}", "(/.*)?");

        Regex::new(&format!("(?i)^{}$", regex_pattern))
            .ok()
            .map(|regex| Self { regex })
    }

    /// Check if a path matches this glob pattern
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Compiles exclude patterns, dropping the ones that are not valid globs
pub fn compile_excludes(patterns: &[String]) -> Vec<CompiledGlob> {
    patterns
        .iter()
        .filter_map(|p| {
            let glob = CompiledGlob::new(p);
            if glob.is_none() {
                tracing::warn!("Ignoring invalid exclude pattern: {}", p);
            }
            glob
        })
        .collect()
}

/// Check if a relative path matches any exclude pattern
pub fn is_excluded(path: &str, excludes: &[CompiledGlob]) -> bool {
    excludes.iter().any(|g| g.is_match(path))
}

/// Case-insensitive substring match on the file path
pub fn matches_file_filter(file_path: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(f) if !f.is_empty() => file_path.to_lowercase().contains(&f.to_lowercase()),
        _ => true,
    }
}

/// Exact language match
pub fn matches_language(language: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(f) if !f.is_empty() => language == f,
        _ => true,
    }
}

/// Both search filters applied to stored metadata
pub fn matches_chunk_filters(
    metadata: &ChunkMetadata,
    file_filter: Option<&str>,
    language_filter: Option<&str>,
) -> bool {
    matches_file_filter(&metadata.file_path, file_filter)
        && matches_language(&metadata.language, language_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_glob() {
        let glob = CompiledGlob::new("src/**/*.rs").unwrap();
        assert!(glob.is_match("src/main.rs"));
        assert!(glob.is_match("src/query/search.rs"));
        assert!(!glob.is_match("tests/main.rs"));

        let glob = CompiledGlob::new("*.min.js").unwrap();
        assert!(glob.is_match("app.min.js"));
        assert!(!glob.is_match("app.js"));
        assert!(!glob.is_match("dist/app.min.js"));
    }

    #[test]
    fn test_excludes() {
        let excludes = compile_excludes(&["vendor/**".to_string(), "**/*.gen.py".to_string()]);
        assert!(is_excluded("vendor/lib/a.py", &excludes));
        assert!(is_excluded("pkg/models.gen.py", &excludes));
        assert!(is_excluded("models.gen.py", &excludes));
        assert!(!is_excluded("src/main.py", &excludes));
        assert!(!is_excluded("src/main.py", &[]));
    }

    #[test]
    fn test_file_filter_is_case_insensitive_substring() {
        assert!(matches_file_filter("src/Auth.py", Some("auth")));
        assert!(matches_file_filter("src/auth.py", Some("SRC/")));
        assert!(!matches_file_filter("src/database.py", Some("auth")));
        assert!(matches_file_filter("src/database.py", None));
        assert!(matches_file_filter("src/database.py", Some("")));
    }

    #[test]
    fn test_language_filter_is_exact() {
        assert!(matches_language("python", Some("python")));
        assert!(!matches_language("python", Some("Python")));
        assert!(!matches_language("typescript", Some("type")));
        assert!(matches_language("", None));
    }
}
