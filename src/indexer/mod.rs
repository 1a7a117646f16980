// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexer module - walks a directory and fills the vector store

pub mod index;
pub mod scanner;

pub use crate::config::IndexConfig;
pub use index::{CollectionStats, IndexOptions, IndexStats, Indexer};
pub use scanner::{FileScanner, ScannedFile};
