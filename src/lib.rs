// SPDX-License-Identifier: MIT OR Apache-2.0

//! codefind - Local codebase retrieval library
//!
//! Chunks source files, stores them with embeddings in a SQLite-backed
//! vector store, and serves hybrid search that fuses vector similarity with
//! BM25 keyword scores, optionally re-ranked by a cross-encoder.

pub mod config;
pub mod embedding;
pub mod errors;
pub mod filters;
pub mod hybrid;
pub mod indexer;
pub mod lazy;
pub mod output;
pub mod parser;
pub mod query;
pub mod rerank;
pub mod utils;

pub use embedding::{ChunkType, CodeChunk, CodeChunker};
pub use indexer::{IndexConfig, IndexStats, Indexer};
pub use query::{SearchEngine, SearchOptions, SearchResponse, SearchResult};
