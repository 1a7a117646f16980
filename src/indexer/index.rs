// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexer: scans a directory, chunks and embeds source files, and upserts
//! them into the vector store.
//!
//! Files are read, hashed and chunked in parallel; embedding and writes
//! happen on the calling thread, one file at a time. A failure on one file is
//! recorded in [`IndexStats::errors`] and the run carries on.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, IndexConfig};
use crate::embedding::chunker::{CodeChunk, CodeChunker};
use crate::embedding::provider::{create_provider, EmbeddingProvider};
use crate::embedding::storage::{ChunkEmbeddingInput, FileRecord, VectorStore, INDEX_DB_FILE};
use crate::indexer::scanner::{FileScanner, ScannedFile};
use crate::lazy::LazySlot;

/// Outcome of one indexing run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Files chunked, embedded and written in this run
    pub indexed_files: usize,
    /// Files that produced no chunks
    pub skipped_files: usize,
    /// Files whose content hash matched the stored one
    pub unchanged_files: usize,
    /// Previously indexed files no longer present under the root
    pub removed_files: Vec<String>,
    /// Chunks now stored for the scanned files
    pub total_chunks: usize,
    /// `"{path}: {reason}"` for every file that failed
    pub errors: Vec<String>,
}

/// Per-run switches for [`Indexer::index_directory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Re-embed files even when their hash is unchanged
    pub force: bool,
    /// Show a progress bar
    pub verbose: bool,
}

/// Current contents of a collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub persist_directory: String,
    pub embedding_model: String,
    pub dimension: Option<usize>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub total_chunks: u64,
    pub total_files: u64,
}

enum ProcessedFile {
    Unchanged { path: String, chunk_count: usize },
    Chunked { path: String, hash: String, chunks: Vec<CodeChunk> },
    Failed { path: String, reason: String },
}

/// Builds and maintains the index of one directory.
pub struct Indexer {
    root: PathBuf,
    settings: Config,
    config: IndexConfig,
    chunker: CodeChunker,
    embedder: LazySlot<Box<dyn EmbeddingProvider>>,
}

impl Indexer {
    /// Creates an indexer for `root` with explicit settings.
    pub fn new(root: impl AsRef<Path>, settings: Config) -> Result<Self> {
        let config = settings.index_config();
        let chunker = CodeChunker::new(config.chunk_config()?);
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            settings,
            config,
            chunker,
            embedder: LazySlot::default(),
        })
    }

    /// Creates an indexer using the configuration found in `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        Self::new(root, Config::load_for_dir(root))
    }

    /// Uses `embedder` instead of the configured provider.
    pub fn with_embedder(mut self, embedder: Box<dyn EmbeddingProvider>) -> Self {
        self.embedder = LazySlot::loaded(embedder);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn db_path(&self) -> PathBuf {
        self.config.index_dir(&self.root).join(INDEX_DB_FILE)
    }

    /// Indexes every eligible file under the root.
    ///
    /// Fails only for problems with the store itself (including a
    /// configuration mismatch) or an embedder that cannot be created.
    pub fn index_directory(&mut self, options: IndexOptions) -> Result<IndexStats> {
        let mut store = VectorStore::open(self.db_path(), &self.config.collection_name)?;
        store.ensure_collection(&self.config)?;

        let files = FileScanner::new(&self.root, self.settings.index.extensions())
            .with_excludes(self.settings.index.exclude_paths())
            .skip_dir(&self.config.persist_directory)
            .list_files()?;
        let records = store.file_records()?;
        let total_files = files.len();
        debug!("found {} candidate files under {}", total_files, self.root.display());

        let scanned: HashSet<String> = files.iter().map(|f| f.relative.clone()).collect();

        let pb = if options.verbose {
            let pb = ProgressBar::new(total_files as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{bar:40.cyan/blue}] {pos}/{len} files | Indexing {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##."),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut stats = IndexStats::default();
        let mut fatal: Option<anyhow::Error> = None;

        let chunker = &self.chunker;
        let max_size = self.settings.index.max_file_size();
        let force = options.force;
        let embed_settings = &self.settings.embeddings;
        let model = &self.config.embedding_model;
        let embedder_slot = &mut self.embedder;

        let (tx, rx) = mpsc::sync_channel::<ProcessedFile>(64);

        std::thread::scope(|s| {
            let records = &records;
            let pb_producer = pb.clone();
            s.spawn(move || {
                files.par_iter().for_each_with(tx, |tx, file| {
                    pb_producer.set_message(file.relative.clone());
                    let msg = process_file(file, chunker, records, max_size, force);
                    let _ = tx.send(msg);
                    pb_producer.inc(1);
                });
            });

            for msg in rx {
                match msg {
                    ProcessedFile::Unchanged { path, chunk_count } => {
                        debug!("unchanged: {}", path);
                        stats.unchanged_files += 1;
                        stats.total_chunks += chunk_count;
                    }
                    ProcessedFile::Failed { path, reason } => {
                        warn!("skipping {}: {}", path, reason);
                        stats.errors.push(format!("{}: {}", path, reason));
                        drop_stale_chunks(&mut store, &path);
                    }
                    ProcessedFile::Chunked { path, chunks, .. } if chunks.is_empty() => {
                        if let Err(err) = store.delete_file(&path) {
                            stats.errors.push(format!("{}: {:#}", path, err));
                        }
                        stats.skipped_files += 1;
                    }
                    ProcessedFile::Chunked { path, hash, chunks } => {
                        let embedder = match embedder_slot
                            .get_or_load(|| create_provider(embed_settings, model).map(Some))
                        {
                            Ok(Some(embedder)) => embedder,
                            Ok(None) => {
                                fatal = Some(anyhow::anyhow!("No embedding provider available"));
                                break;
                            }
                            Err(err) => {
                                fatal = Some(err.context("Failed to create embedding provider"));
                                break;
                            }
                        };

                        match write_file(&mut store, &mut **embedder, &path, &hash, &chunks) {
                            Ok(()) => {
                                stats.indexed_files += 1;
                                stats.total_chunks += chunks.len();
                            }
                            Err(err) => {
                                warn!("failed to index {}: {:#}", path, err);
                                stats.errors.push(format!("{}: {:#}", path, err));
                                drop_stale_chunks(&mut store, &path);
                            }
                        }
                    }
                }
            }
        });

        pb.finish_and_clear();

        if let Some(err) = fatal {
            return Err(err);
        }

        for path in records.keys().filter(|p| !scanned.contains(*p)) {
            match store.delete_file(path) {
                Ok(_) => stats.removed_files.push(path.clone()),
                Err(err) => stats.errors.push(format!("{}: {:#}", path, err)),
            }
        }
        stats.removed_files.sort();
        stats.errors.sort();

        info!(
            "indexed {} files ({} unchanged, {} skipped, {} removed, {} errors), {} chunks",
            stats.indexed_files,
            stats.unchanged_files,
            stats.skipped_files,
            stats.removed_files.len(),
            stats.errors.len(),
            stats.total_chunks
        );

        Ok(stats)
    }

    /// Drops the whole collection. A missing index is not an error.
    pub fn clear_index(&self) -> Result<()> {
        let db_path = self.db_path();
        if !db_path.is_file() {
            return Ok(());
        }
        let mut store = VectorStore::open(&db_path, &self.config.collection_name)?;
        store.delete_collection()?;
        info!("cleared collection '{}'", self.config.collection_name);
        Ok(())
    }

    /// Chunk and file counts plus the collection's recorded configuration.
    pub fn get_stats(&self) -> Result<CollectionStats> {
        let store = VectorStore::open_existing(
            &self.config.index_dir(&self.root),
            &self.config.collection_name,
        )?;
        let info = store
            .collection_info()?
            .context("Collection disappeared while reading stats")?;

        Ok(CollectionStats {
            collection_name: info.name,
            persist_directory: self.config.persist_directory.clone(),
            embedding_model: info.embedding_model,
            dimension: info.dimension,
            chunk_size: info.chunk_size,
            chunk_overlap: info.chunk_overlap,
            total_chunks: store.count_chunks()?,
            total_files: store.count_files()?,
        })
    }
}

/// Removes what an earlier run stored for a file that now fails, so failed
/// files are never searchable with outdated content.
fn drop_stale_chunks(store: &mut VectorStore, path: &str) {
    match store.delete_file(path) {
        Ok(0) => {}
        Ok(n) => debug!("dropped {} stale chunks of {}", n, path),
        Err(err) => warn!("failed to drop stale chunks of {}: {:#}", path, err),
    }
}

/// Read, hash and chunk one file (runs on the rayon pool).
fn process_file(
    file: &ScannedFile,
    chunker: &CodeChunker,
    records: &HashMap<String, FileRecord>,
    max_size: u64,
    force: bool,
) -> ProcessedFile {
    let path = file.relative.clone();

    let (content, hash) = match read_source(&file.path, max_size) {
        Ok(read) => read,
        Err(err) => {
            return ProcessedFile::Failed {
                path,
                reason: format!("{:#}", err),
            }
        }
    };

    if !force {
        if let Some(record) = records.get(&path) {
            if record.file_hash == hash {
                return ProcessedFile::Unchanged {
                    path,
                    chunk_count: record.chunk_count,
                };
            }
        }
    }

    let chunks = chunker.chunk_file(&path, &content);
    ProcessedFile::Chunked { path, hash, chunks }
}

/// Returns the file's text and its blake3 hash.
fn read_source(path: &Path, max_size: u64) -> Result<(String, String)> {
    let size = std::fs::metadata(path)
        .context("failed to stat file")?
        .len();
    if size > max_size {
        bail!("file too large ({} bytes, limit {})", size, max_size);
    }

    let bytes = std::fs::read(path).context("failed to read file")?;
    if bytes.contains(&0) {
        bail!("binary file");
    }
    let hash = blake3::hash(&bytes).to_hex().to_string();
    let content = String::from_utf8(bytes).context("file is not valid UTF-8")?;

    Ok((content, hash))
}

/// Embeds a file's chunks in provider-sized batches and upserts them.
fn write_file(
    store: &mut VectorStore,
    embedder: &mut dyn EmbeddingProvider,
    path: &str,
    hash: &str,
    chunks: &[CodeChunk],
) -> Result<()> {
    let batch_size = embedder.batch_size().max(1);
    let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder
            .embed_texts(&texts)
            .context("embedding failed")?;
        if vectors.len() != texts.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            );
        }
        embeddings.extend(vectors);
    }

    let inputs: Vec<ChunkEmbeddingInput<'_>> = chunks
        .iter()
        .zip(&embeddings)
        .map(|(chunk, embedding)| ChunkEmbeddingInput { chunk, embedding })
        .collect();

    store.upsert_file(path, hash, &inputs)
}
