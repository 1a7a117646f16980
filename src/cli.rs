// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// codefind - Local codebase retrieval
///
/// Indexes source files into a local vector store and answers queries with
/// hybrid semantic + BM25 search, optionally re-ranked by a cross-encoder.
#[derive(Parser, Debug)]
#[command(name = "codefind")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One colored line per result followed by its code
    #[default]
    Text,
    /// The full response as JSON
    Json,
    /// Markdown-fenced context block for prompts
    Context,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build or update the index for a directory
    Index {
        /// Directory to index (defaults to current directory)
        path: Option<String>,

        /// Drop the existing collection before indexing
        #[arg(long)]
        clear: bool,

        /// Re-embed files even when unchanged
        #[arg(short, long)]
        force: bool,

        /// Hide the progress bar and summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Search the index
    #[command(alias = "s")]
    Search {
        /// Search query (natural language or identifiers)
        query: String,

        /// Directory to search from (defaults to current directory)
        #[arg(short, long)]
        path: Option<String>,

        /// Number of results
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,

        /// Only files whose path contains this text
        #[arg(short = 'f', long = "file")]
        file: Option<String>,

        /// Only chunks of this language (e.g. python, rust)
        #[arg(short = 'l', long = "lang")]
        language: Option<String>,

        /// Semantic search only, no keyword fusion
        #[arg(long, conflicts_with = "alpha")]
        semantic: bool,

        /// Weight of the semantic score in [0, 1]
        #[arg(long)]
        alpha: Option<f32>,

        /// Re-rank candidates with a cross-encoder
        #[arg(long, conflicts_with = "semantic")]
        rerank: bool,

        /// Drop results scoring below this
        #[arg(long)]
        min_score: Option<f32>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print every indexed chunk of one file in line order
    Context {
        /// File path relative to the indexed root
        file: String,

        /// Directory to search from (defaults to current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Show collection statistics
    Stats {
        /// Directory to search from (defaults to current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Delete the index collection
    Clear {
        /// Indexed directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
