// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - chunking, vector embeddings and their storage
//!
//! Source files are split into chunks, each chunk is embedded by an
//! [`EmbeddingProvider`] and persisted with its metadata in a [`VectorStore`].

pub mod chunker;
pub mod provider;
pub mod storage;

pub use chunker::{ChunkConfig, ChunkType, CodeChunk, CodeChunker};
pub use provider::{create_provider, CommandProvider, EmbeddingProvider, HashingProvider};
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use provider::{FastEmbedConfig, FastEmbedder};
pub use storage::{
    ChunkEmbeddingInput, ChunkMetadata, CollectionInfo, FileRecord, NearestHit, StoredChunk,
    VectorStore, INDEX_DB_FILE,
};
