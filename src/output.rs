//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use colored::Colorize;

use crate::query::SearchResult;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize file path (cyan)
pub fn colorize_path(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize a `start-end` line range (yellow)
pub fn colorize_range(start: usize, end: usize, use_color: bool) -> String {
    let range = format!("{}-{}", start, end);
    if use_color {
        range.yellow().to_string()
    } else {
        range
    }
}

/// Colorize chunk type (green)
pub fn colorize_kind(text: &str, use_color: bool) -> String {
    if use_color {
        text.green().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize unit name (bold)
pub fn colorize_name(text: &str, use_color: bool) -> String {
    if use_color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize code lines (dimmed)
pub fn colorize_code(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// `path:start-end (type: name) [score: 0.123]`, colored when asked.
pub fn result_header(result: &SearchResult, use_color: bool) -> String {
    let name = if result.name.is_empty() {
        String::new()
    } else {
        format!(": {}", colorize_name(&result.name, use_color))
    };
    format!(
        "{}:{} ({}{}) [score: {:.3}]",
        colorize_path(&result.file_path, use_color),
        colorize_range(result.start_line, result.end_line, use_color),
        colorize_kind(result.chunk_type.as_str(), use_color),
        name,
        result.score
    )
}

/// Chunk content with each line prefixed by its line number.
pub fn numbered_code(result: &SearchResult, use_color: bool) -> String {
    let width = result.end_line.to_string().len();
    result
        .content
        .lines()
        .enumerate()
        .map(|(i, line)| {
            let num = format!("{:>width$}", result.start_line + i, width = width);
            format!("{} | {}", colorize_code(&num, use_color), line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
