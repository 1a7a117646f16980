// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language detection and the tree-sitter grammar registry

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::Language;

/// Grammars used to find top-level units when chunking
pub struct LanguageRegistry {
    languages: HashMap<&'static str, Language>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut languages = HashMap::new();

        languages.insert(
            "typescript",
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        );
        languages.insert("tsx", tree_sitter_typescript::LANGUAGE_TSX.into());
        languages.insert("javascript", tree_sitter_javascript::LANGUAGE.into());
        languages.insert("python", tree_sitter_python::LANGUAGE.into());
        languages.insert("rust", tree_sitter_rust::LANGUAGE.into());
        languages.insert("go", tree_sitter_go::LANGUAGE.into());
        languages.insert("c", tree_sitter_c::LANGUAGE.into());
        languages.insert("cpp", tree_sitter_cpp::LANGUAGE.into());
        languages.insert("java", tree_sitter_java::LANGUAGE.into());
        languages.insert("ruby", tree_sitter_ruby::LANGUAGE.into());

        Self { languages }
    }

    /// Get grammar by language name
    pub fn get(&self, name: &str) -> Option<&Language> {
        self.languages.get(name.to_lowercase().as_str())
    }

    /// Grammar for a file, picking the TSX dialect for `.tsx` files
    pub fn for_file(&self, path: &str, language: &str) -> Option<&Language> {
        let is_tsx = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("tsx"))
            .unwrap_or(false);

        if is_tsx && language == "typescript" {
            self.get("tsx")
        } else {
            self.get(language)
        }
    }

    /// Whether chunking can detect units for this language
    pub fn supports(&self, language: &str) -> bool {
        self.get(language).is_some()
    }
}

/// Global language registry
pub static LANGUAGES: Lazy<LanguageRegistry> = Lazy::new(LanguageRegistry::new);

/// Detect language from a file path's extension.
///
/// Returns `None` for unknown extensions and for paths without one.
pub fn detect_language(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?;

    match ext.to_lowercase().as_str() {
        "py" => Some("python"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "ts" | "tsx" => Some("typescript"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        "java" => Some("java"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some("cpp"),
        "rb" => Some("ruby"),
        "cs" => Some("csharp"),
        "php" => Some("php"),
        "swift" => Some("swift"),
        "kt" | "kts" => Some("kotlin"),
        "scala" => Some("scala"),
        "lua" => Some("lua"),
        "sh" | "bash" => Some("shell"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_python() {
        assert_eq!(detect_language("test.py"), Some("python"));
        assert_eq!(detect_language("script.pyw"), None);
    }

    #[test]
    fn detects_javascript_family() {
        assert_eq!(detect_language("app.js"), Some("javascript"));
        assert_eq!(detect_language("component.jsx"), Some("javascript"));
        assert_eq!(detect_language("module.ts"), Some("typescript"));
        assert_eq!(detect_language("View.TSX"), Some("typescript"));
    }

    #[test]
    fn unknown_extensions() {
        assert_eq!(detect_language("file.xyz"), None);
        assert_eq!(detect_language("noextension"), None);
        assert_eq!(detect_language("dir.d/Makefile"), None);
    }

    #[test]
    fn registry_covers_grammar_languages() {
        for lang in ["python", "rust", "go", "java", "c", "cpp", "ruby", "javascript", "typescript"] {
            assert!(LANGUAGES.supports(lang), "missing grammar for {}", lang);
        }
        assert!(!LANGUAGES.supports("kotlin"));
        assert!(LANGUAGES.for_file("ui/App.tsx", "typescript").is_some());
    }
}
