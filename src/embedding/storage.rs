// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed vector store for chunk embeddings.
//!
//! One database (`index.sqlite` inside the persist directory) holds any
//! number of named collections. Each collection records the configuration it
//! was built with, its chunks (document text, embedding, metadata JSON) and a
//! per-file content hash used for incremental re-indexing. Nearest-neighbor
//! queries are brute force over squared L2 distance.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::chunker::{ChunkType, CodeChunk};
use crate::config::IndexConfig;
use crate::errors::{ConfigMismatchError, IndexNotFoundError};

/// File name of the database inside the persist directory.
pub const INDEX_DB_FILE: &str = "index.sqlite";

/// Metadata stored alongside each chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub chunk_type: ChunkType,
    pub name: String,
    pub language: String,
}

impl ChunkMetadata {
    pub fn from_chunk(chunk: &CodeChunk) -> Self {
        Self {
            file_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            chunk_type: chunk.chunk_type,
            name: chunk.name.clone(),
            language: chunk.language.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "file_path": self.file_path,
            "start_line": self.start_line,
            "end_line": self.end_line,
            "chunk_type": self.chunk_type.as_str(),
            "name": self.name,
            "language": self.language,
        })
        .to_string()
    }

    /// Parses stored metadata, defaulting anything missing or malformed.
    pub fn from_json(raw: &str) -> Self {
        let value: Value = serde_json::from_str(raw).unwrap_or(Value::Null);

        let text = |key: &str| -> String {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let line = |key: &str| -> usize {
            match value.get(key) {
                Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
                Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
                _ => 0,
            }
        };

        Self {
            file_path: text("file_path"),
            start_line: line("start_line"),
            end_line: line("end_line"),
            chunk_type: ChunkType::parse(&text("chunk_type")),
            name: text("name"),
            language: text("language"),
        }
    }
}

/// A chunk as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// Result of a nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct NearestHit {
    pub chunk: StoredChunk,
    /// Squared L2 distance to the query vector
    pub distance: f32,
}

/// Recorded configuration of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub embedding_model: String,
    /// Vector width, unknown until the first embedding is written
    pub dimension: Option<usize>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub created_at: i64,
}

impl CollectionInfo {
    /// Fails with [`ConfigMismatchError`] when `config` disagrees with what
    /// the collection was built with.
    pub fn check_compatible(&self, config: &IndexConfig) -> Result<()> {
        let mismatch = |field: &'static str, indexed: String, configured: String| {
            ConfigMismatchError {
                collection: self.name.clone(),
                field,
                indexed,
                configured,
            }
        };

        if self.embedding_model != config.embedding_model {
            return Err(mismatch(
                "embedding_model",
                self.embedding_model.clone(),
                config.embedding_model.clone(),
            )
            .into());
        }
        if self.chunk_size != config.chunk_size {
            return Err(mismatch(
                "chunk_size",
                self.chunk_size.to_string(),
                config.chunk_size.to_string(),
            )
            .into());
        }
        if self.chunk_overlap != config.chunk_overlap {
            return Err(mismatch(
                "chunk_overlap",
                self.chunk_overlap.to_string(),
                config.chunk_overlap.to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Chunk plus its embedding, ready to be written.
pub struct ChunkEmbeddingInput<'a> {
    pub chunk: &'a CodeChunk,
    pub embedding: &'a [f32],
}

/// Stored hash and chunk count for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_hash: String,
    pub chunk_count: usize,
}

/// SQLite-based vector store scoped to one collection.
pub struct VectorStore {
    conn: Connection,
    path: PathBuf,
    collection: String,
}

impl VectorStore {
    /// Opens or creates the database at `path`, scoped to `collection`.
    pub fn open<P: AsRef<Path>>(path: P, collection: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let store = Self {
            conn,
            path,
            collection: collection.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens the store in `index_dir` for searching.
    ///
    /// Fails with [`IndexNotFoundError`] when the directory, database or
    /// collection does not exist.
    pub fn open_existing(index_dir: &Path, collection: &str) -> Result<Self> {
        let not_found = || IndexNotFoundError {
            index_path: index_dir.display().to_string(),
            collection: collection.to_string(),
        };

        let db_path = index_dir.join(INDEX_DB_FILE);
        if !index_dir.is_dir() || !db_path.is_file() {
            return Err(not_found().into());
        }

        let store = Self::open(&db_path, collection)?;
        if store.collection_info()?.is_none() {
            return Err(not_found().into());
        }
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                embedding_model TEXT NOT NULL,
                dimension INTEGER,
                chunk_size INTEGER NOT NULL,
                chunk_overlap INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                language TEXT NOT NULL,
                document TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_file
                ON chunks(collection, file_path);

            CREATE TABLE IF NOT EXISTS files (
                collection TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_hash TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                PRIMARY KEY (collection, file_path)
            );
            "#,
            )
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Closes the storage connection explicitly.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    pub fn collection_info(&self) -> Result<Option<CollectionInfo>> {
        self.conn
            .query_row(
                r#"
                SELECT name, embedding_model, dimension, chunk_size, chunk_overlap, created_at
                FROM collections
                WHERE name = ?1
                "#,
                params![self.collection],
                |row| {
                    let dimension: Option<i64> = row.get(2)?;
                    let chunk_size: i64 = row.get(3)?;
                    let chunk_overlap: i64 = row.get(4)?;
                    Ok(CollectionInfo {
                        name: row.get(0)?,
                        embedding_model: row.get(1)?,
                        dimension: dimension.map(|d| d as usize),
                        chunk_size: chunk_size as usize,
                        chunk_overlap: chunk_overlap as usize,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .context("Failed to read collection")
    }

    /// Creates the collection, or verifies an existing one matches `config`.
    pub fn ensure_collection(&self, config: &IndexConfig) -> Result<CollectionInfo> {
        if let Some(info) = self.collection_info()? {
            info.check_compatible(config)?;
            return Ok(info);
        }

        self.conn.execute(
            r#"
            INSERT INTO collections (name, embedding_model, dimension, chunk_size, chunk_overlap, created_at)
            VALUES (?1, ?2, NULL, ?3, ?4, ?5)
            "#,
            params![
                self.collection,
                config.embedding_model,
                config.chunk_size as i64,
                config.chunk_overlap as i64,
                now_secs()
            ],
        )?;

        self.collection_info()?
            .context("Collection missing right after creation")
    }

    /// Drops the collection with all its chunks and file records.
    pub fn delete_collection(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE collection = ?1", params![self.collection])?;
        tx.execute("DELETE FROM files WHERE collection = ?1", params![self.collection])?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![self.collection])?;
        tx.commit().context("Failed to delete collection")?;
        Ok(())
    }

    /// Stored hash and chunk count for a file, if it was indexed.
    pub fn file_record(&self, file_path: &str) -> Result<Option<FileRecord>> {
        self.conn
            .query_row(
                "SELECT file_hash, chunk_count FROM files WHERE collection = ?1 AND file_path = ?2",
                params![self.collection, file_path],
                |row| {
                    let count: i64 = row.get(1)?;
                    Ok(FileRecord {
                        file_hash: row.get(0)?,
                        chunk_count: count as usize,
                    })
                },
            )
            .optional()
            .context("Failed to query file hash")
    }

    /// All file records of the collection, keyed by path.
    pub fn file_records(&self) -> Result<HashMap<String, FileRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_path, file_hash, chunk_count FROM files WHERE collection = ?1")?;
        let records = stmt
            .query_map(params![self.collection], |row| {
                let count: i64 = row.get(2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    FileRecord {
                        file_hash: row.get(1)?,
                        chunk_count: count as usize,
                    },
                ))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .context("Failed to list files")?;
        Ok(records)
    }

    /// Upserts a file's chunks by id and deletes the file's chunks that were
    /// not part of this pass.
    pub fn upsert_file(
        &mut self,
        file_path: &str,
        file_hash: &str,
        chunks: &[ChunkEmbeddingInput<'_>],
    ) -> Result<()> {
        let dimension = match chunks.first() {
            Some(first) => first.embedding.len(),
            None => return self.delete_file(file_path).map(|_| ()),
        };
        if chunks.iter().any(|c| c.embedding.len() != dimension) {
            bail!("Embeddings for {} have inconsistent dimensions", file_path);
        }
        self.record_dimension(dimension)?;

        let updated_at = now_secs();
        let fresh: HashSet<String> = chunks.iter().map(|c| c.chunk.id()).collect();

        let tx = self.conn.transaction()?;

        let stale: Vec<String> = {
            let mut stmt =
                tx.prepare("SELECT id FROM chunks WHERE collection = ?1 AND file_path = ?2")?;
            let existing = stmt
                .query_map(params![self.collection, file_path], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            existing.into_iter().filter(|id| !fresh.contains(id)).collect()
        };
        {
            let mut stmt = tx.prepare("DELETE FROM chunks WHERE collection = ?1 AND id = ?2")?;
            for id in &stale {
                stmt.execute(params![self.collection, id])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks (
                    collection, id, file_path, language, document, embedding, metadata, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(collection, id) DO UPDATE SET
                    file_path = excluded.file_path,
                    language = excluded.language,
                    document = excluded.document,
                    embedding = excluded.embedding,
                    metadata = excluded.metadata,
                    updated_at = excluded.updated_at
                "#,
            )?;

            for input in chunks {
                let chunk = input.chunk;
                stmt.execute(params![
                    self.collection,
                    chunk.id(),
                    chunk.file_path,
                    chunk.language,
                    chunk.content,
                    embedding_to_blob(input.embedding),
                    ChunkMetadata::from_chunk(chunk).to_json(),
                    updated_at
                ])?;
            }
        }

        tx.execute(
            r#"
            INSERT INTO files (collection, file_path, file_hash, chunk_count)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(collection, file_path) DO UPDATE SET
                file_hash = excluded.file_hash,
                chunk_count = excluded.chunk_count
            "#,
            params![self.collection, file_path, file_hash, fresh.len() as i64],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Deletes all chunks and the file record for a path.
    pub fn delete_file(&mut self, file_path: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let deleted = tx
            .execute(
                "DELETE FROM chunks WHERE collection = ?1 AND file_path = ?2",
                params![self.collection, file_path],
            )
            .context("Failed to delete chunks")?;
        tx.execute(
            "DELETE FROM files WHERE collection = ?1 AND file_path = ?2",
            params![self.collection, file_path],
        )?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Brute-force nearest neighbors by squared L2 distance, optionally
    /// restricted to one language.
    pub fn query_nearest(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        language: Option<&str>,
    ) -> Result<Vec<NearestHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if let Some(dimension) = self.collection_info()?.and_then(|info| info.dimension) {
            if dimension != query_embedding.len() {
                bail!(
                    "Query embedding has dimension {} but collection '{}' stores {}; \
                     the embedding provider changed since indexing",
                    query_embedding.len(),
                    self.collection,
                    dimension
                );
            }
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, document, metadata, embedding
            FROM chunks
            WHERE collection = ?1 AND (?2 IS NULL OR language = ?2)
            "#,
        )?;

        let mut hits: Vec<NearestHit> = stmt
            .query_map(params![self.collection, language], |row| {
                let blob: Vec<u8> = row.get(3)?;
                let raw_metadata: String = row.get(2)?;
                Ok(NearestHit {
                    chunk: StoredChunk {
                        id: row.get(0)?,
                        document: row.get(1)?,
                        metadata: ChunkMetadata::from_json(&raw_metadata),
                    },
                    distance: squared_l2(query_embedding, &blob_to_embedding(&blob)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to scan embeddings")?;

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.metadata.file_path.cmp(&b.chunk.metadata.file_path))
                .then_with(|| a.chunk.metadata.start_line.cmp(&b.chunk.metadata.start_line))
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    /// Every chunk in the collection, ordered by file and line.
    pub fn get_all(&self) -> Result<Vec<StoredChunk>> {
        self.select_chunks(
            "SELECT id, document, metadata FROM chunks WHERE collection = ?1",
            params![self.collection],
        )
    }

    /// Chunks of one file, ordered by start line.
    pub fn get_by_file(&self, file_path: &str) -> Result<Vec<StoredChunk>> {
        self.select_chunks(
            "SELECT id, document, metadata FROM chunks WHERE collection = ?1 AND file_path = ?2",
            params![self.collection, file_path],
        )
    }

    fn select_chunks(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<StoredChunk>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut chunks = stmt
            .query_map(args, |row| {
                let raw_metadata: String = row.get(2)?;
                Ok(StoredChunk {
                    id: row.get(0)?,
                    document: row.get(1)?,
                    metadata: ChunkMetadata::from_json(&raw_metadata),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to query chunks")?;

        chunks.sort_by(|a, b| {
            a.metadata
                .file_path
                .cmp(&b.metadata.file_path)
                .then(a.metadata.start_line.cmp(&b.metadata.start_line))
                .then(a.metadata.end_line.cmp(&b.metadata.end_line))
        });
        Ok(chunks)
    }

    /// Counts chunks in the collection.
    pub fn count_chunks(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Counts indexed files in the collection.
    pub fn count_files(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn record_dimension(&self, dimension: usize) -> Result<()> {
        match self.collection_info()?.and_then(|info| info.dimension) {
            Some(existing) if existing != dimension => bail!(
                "Embedding dimension {} does not match collection '{}' ({}); re-index with --clear",
                dimension,
                self.collection,
                existing
            ),
            Some(_) => Ok(()),
            None => {
                self.conn.execute(
                    "UPDATE collections SET dimension = ?2 WHERE name = ?1",
                    params![self.collection, dimension as i64],
                )?;
                Ok(())
            }
        }
    }
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Converts an embedding vector to a compact blob.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Converts a blob back to an embedding vector.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunk(path: &str, start: usize, end: usize, name: &str) -> CodeChunk {
        CodeChunk {
            content: format!("def {}(): pass", name),
            file_path: path.to_string(),
            start_line: start,
            end_line: end,
            chunk_type: ChunkType::Function,
            name: name.to_string(),
            language: "python".to_string(),
        }
    }

    fn open_with_collection(dir: &Path) -> VectorStore {
        let store = VectorStore::open(dir.join(INDEX_DB_FILE), "codebase").unwrap();
        store.ensure_collection(&IndexConfig::default()).unwrap();
        store
    }

    #[test]
    fn test_open_existing_requires_collection() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join(".codefind");

        let err = VectorStore::open_existing(&missing, "codebase").err().unwrap();
        assert!(err.downcast_ref::<IndexNotFoundError>().is_some());

        let store = VectorStore::open(missing.join(INDEX_DB_FILE), "codebase").unwrap();
        store.close().unwrap();
        let err = VectorStore::open_existing(&missing, "codebase").err().unwrap();
        assert!(err.downcast_ref::<IndexNotFoundError>().is_some());

        open_with_collection(&missing);
        assert!(VectorStore::open_existing(&missing, "codebase").is_ok());
        assert!(VectorStore::open_existing(&missing, "other").is_err());
    }

    #[test]
    fn test_config_mismatch() {
        let dir = tempdir().unwrap();
        let store = open_with_collection(dir.path());

        let changed = IndexConfig {
            chunk_size: 40,
            ..IndexConfig::default()
        };
        let err = store.ensure_collection(&changed).unwrap_err();
        let mismatch = err.downcast_ref::<ConfigMismatchError>().unwrap();
        assert_eq!(mismatch.field, "chunk_size");
        assert_eq!(mismatch.indexed, "80");
    }

    #[test]
    fn test_upsert_overwrites_and_prunes() {
        let dir = tempdir().unwrap();
        let mut store = open_with_collection(dir.path());

        let a = chunk("a.py", 1, 2, "a");
        let b = chunk("a.py", 4, 5, "b");
        let emb = vec![1.0, 0.0];
        let inputs = [
            ChunkEmbeddingInput { chunk: &a, embedding: &emb },
            ChunkEmbeddingInput { chunk: &b, embedding: &emb },
        ];
        store.upsert_file("a.py", "h1", &inputs).unwrap();
        store.upsert_file("a.py", "h1", &inputs).unwrap();
        assert_eq!(store.count_chunks().unwrap(), 2);

        let inputs = [ChunkEmbeddingInput { chunk: &a, embedding: &emb }];
        store.upsert_file("a.py", "h2", &inputs).unwrap();
        let remaining = store.get_by_file("a.py").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "a.py:1-2");
        assert_eq!(
            store.file_record("a.py").unwrap(),
            Some(FileRecord {
                file_hash: "h2".into(),
                chunk_count: 1
            })
        );
        assert_eq!(store.collection_info().unwrap().unwrap().dimension, Some(2));
    }

    #[test]
    fn test_query_nearest_orders_by_distance() {
        let dir = tempdir().unwrap();
        let mut store = open_with_collection(dir.path());

        let a = chunk("lib.py", 1, 1, "a");
        let b = chunk("lib.py", 2, 2, "b");
        let mut c = chunk("main.rs", 3, 3, "c");
        c.language = "rust".into();
        let (ea, eb, ec) = (vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.9, 0.1, 0.0]);

        store
            .upsert_file(
                "lib.py",
                "h",
                &[
                    ChunkEmbeddingInput { chunk: &a, embedding: &ea },
                    ChunkEmbeddingInput { chunk: &b, embedding: &eb },
                ],
            )
            .unwrap();
        store
            .upsert_file("main.rs", "h", &[ChunkEmbeddingInput { chunk: &c, embedding: &ec }])
            .unwrap();

        let hits = store.query_nearest(&[1.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.metadata.name, "a");
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(hits[1].chunk.metadata.name, "c");

        let hits = store.query_nearest(&[1.0, 0.0, 0.0], 10, Some("python")).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.chunk.metadata.language == "python"));

        assert!(store.query_nearest(&[1.0, 0.0], 10, None).is_err());
    }

    #[test]
    fn test_delete_collection() {
        let dir = tempdir().unwrap();
        let mut store = open_with_collection(dir.path());
        let a = chunk("a.py", 1, 1, "a");
        let emb = vec![0.5];
        store
            .upsert_file("a.py", "h", &[ChunkEmbeddingInput { chunk: &a, embedding: &emb }])
            .unwrap();

        store.delete_collection().unwrap();
        assert!(store.collection_info().unwrap().is_none());
        assert_eq!(store.count_chunks().unwrap(), 0);
        assert_eq!(store.count_files().unwrap(), 0);
    }

    #[test]
    fn test_metadata_parsing_is_lenient() {
        let meta = ChunkMetadata::from_json(
            r#"{"file_path": "a.py", "start_line": "7", "end_line": "x", "chunk_type": "weird"}"#,
        );
        assert_eq!(meta.file_path, "a.py");
        assert_eq!(meta.start_line, 7);
        assert_eq!(meta.end_line, 0);
        assert_eq!(meta.chunk_type, ChunkType::Unknown);
        assert!(meta.name.is_empty());

        assert_eq!(ChunkMetadata::from_json("not json"), ChunkMetadata::default());

        let original = ChunkMetadata::from_chunk(&chunk("b.py", 3, 9, "run"));
        assert_eq!(ChunkMetadata::from_json(&original.to_json()), original);
    }
}
