// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code chunker for embedding generation.
//!
//! Files in languages with a registered grammar are split at top-level
//! function and class boundaries; everything else (and oversized units) is
//! split into line-based sliding windows with configurable overlap.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::parser::{detect_language, UnitExtractor, UnitKind, LANGUAGES};

/// Default number of lines per chunk.
pub const DEFAULT_CHUNK_LINES: usize = 80;

/// Default overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

/// Configuration for the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum number of lines per chunk.
    pub chunk_lines: usize,
    /// Number of overlapping lines between consecutive windows.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_lines: DEFAULT_CHUNK_LINES,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    /// Creates a new ChunkConfig with the specified parameters.
    pub fn new(chunk_lines: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_lines == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if chunk_overlap >= chunk_lines {
            bail!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap,
                chunk_lines
            );
        }
        Ok(Self {
            chunk_lines,
            chunk_overlap,
        })
    }

    fn step(&self) -> usize {
        self.chunk_lines.saturating_sub(self.chunk_overlap).max(1)
    }
}

/// Kind of source span a chunk covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Block,
    /// Stored metadata that could not be interpreted
    #[default]
    #[serde(other)]
    Unknown,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Block => "block",
            ChunkType::Unknown => "unknown",
        }
    }

    /// Lenient parse used at the storage boundary.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "function" => ChunkType::Function,
            "class" => ChunkType::Class,
            "block" => ChunkType::Block,
            _ => ChunkType::Unknown,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<UnitKind> for ChunkType {
    fn from(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Function => ChunkType::Function,
            UnitKind::Class => ChunkType::Class,
        }
    }
}

/// A contiguous span of a source file treated as one retrievable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub content: String,
    /// Path relative to the indexed root, `/`-separated
    pub file_path: String,
    /// Starting line number (1-indexed).
    pub start_line: usize,
    /// Ending line number (1-indexed, inclusive).
    pub end_line: usize,
    pub chunk_type: ChunkType,
    pub name: String,
    /// Detected language, empty when unknown
    pub language: String,
}

impl CodeChunk {
    /// Stable identity within a collection: `{file_path}:{start_line}-{end_line}`.
    pub fn id(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

/// Splits source files into chunks.
pub struct CodeChunker {
    config: ChunkConfig,
    extractor: UnitExtractor,
}

impl CodeChunker {
    /// Creates a new chunker with the given configuration.
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            extractor: UnitExtractor::new(),
        }
    }

    /// Creates a chunker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Detect language from the file extension.
    pub fn detect_language(&self, path: &str) -> Option<&'static str> {
        detect_language(path)
    }

    /// Splits one file into ordered chunks.
    ///
    /// Never fails: content the grammar cannot make sense of falls back to
    /// plain line windows.
    pub fn chunk_file(&self, path: &str, content: &str) -> Vec<CodeChunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.iter().all(|l| l.trim().is_empty()) {
            return Vec::new();
        }

        let language = detect_language(path);
        let lang_str = language.unwrap_or("");

        let units = match language {
            Some(lang) if LANGUAGES.supports(lang) => {
                match self.extractor.extract(content, path, lang) {
                    Ok(units) => units,
                    Err(err) => {
                        debug!("unit extraction failed for {}: {}", path, err);
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        let mut chunks = Vec::new();

        if units.is_empty() {
            self.push_windows(
                &mut chunks,
                &lines,
                (1, lines.len()),
                ChunkType::Block,
                "",
                path,
                lang_str,
            );
            return chunks;
        }

        // Next line not yet covered by a chunk (1-indexed)
        let mut cursor = 1usize;
        for unit in &units {
            // Units never overlap at top level, but guard against odd spans
            if unit.start_line < cursor || unit.end_line > lines.len() {
                continue;
            }

            if unit.start_line > cursor {
                self.push_gap(&mut chunks, &lines, (cursor, unit.start_line - 1), path, lang_str);
            }

            self.push_windows(
                &mut chunks,
                &lines,
                (unit.start_line, unit.end_line),
                unit.kind.into(),
                &unit.name,
                path,
                lang_str,
            );
            cursor = unit.end_line + 1;
        }

        if cursor <= lines.len() {
            self.push_gap(&mut chunks, &lines, (cursor, lines.len()), path, lang_str);
        }

        chunks
    }

    /// Module-level code between units, trimmed of blank edge lines.
    fn push_gap(
        &self,
        chunks: &mut Vec<CodeChunk>,
        lines: &[&str],
        (start, end): (usize, usize),
        path: &str,
        language: &str,
    ) {
        let is_blank = |line: usize| lines[line - 1].trim().is_empty();

        let mut start = start;
        let mut end = end;
        while start <= end && is_blank(start) {
            start += 1;
        }
        while end >= start && is_blank(end) {
            end -= 1;
        }
        if start > end {
            return;
        }

        self.push_windows(chunks, lines, (start, end), ChunkType::Block, "", path, language);
    }

    /// Emit `[start, end]` as one chunk, or as overlapping windows when it
    /// exceeds the configured size.
    ///
    /// ```text
    /// step = chunk_lines - chunk_overlap
    /// loop:
    ///   window_end = min(start + chunk_lines - 1, end)
    ///   emit (start, window_end)
    ///   if window_end == end: stop
    ///   start += step
    /// ```
    #[allow(clippy::too_many_arguments)]
    fn push_windows(
        &self,
        chunks: &mut Vec<CodeChunk>,
        lines: &[&str],
        (start, end): (usize, usize),
        chunk_type: ChunkType,
        name: &str,
        path: &str,
        language: &str,
    ) {
        if start == 0 || start > end || end > lines.len() {
            return;
        }

        let size = self.config.chunk_lines;
        let step = self.config.step();
        let mut window_start = start;

        loop {
            let window_end = (window_start + size - 1).min(end);
            let text = lines[window_start - 1..window_end].join("\n");

            if !text.trim().is_empty() {
                chunks.push(CodeChunk {
                    content: text,
                    file_path: path.to_string(),
                    start_line: window_start,
                    end_line: window_end,
                    chunk_type,
                    name: name.to_string(),
                    language: language.to_string(),
                });
            }

            if window_end >= end {
                break;
            }
            window_start += step;
        }
    }
}
