// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::Result;
use codefind::config::{Config, EmbeddingProviderType};
use codefind::errors::{ConfigMismatchError, IndexNotFoundError, InvalidAlphaError};
use codefind::indexer::{IndexOptions, IndexStats, Indexer};
use codefind::query::{SearchEngine, SearchOptions, SearchResult};
use codefind::rerank::Reranker;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const AUTH_PY: &str = r#"import hashlib


def authenticate_user(username, password):
    """Check a user's credentials against the stored hash."""
    stored = load_hash(username)
    return stored == hash_password(password)


def hash_password(password):
    return hashlib.sha256(password.encode()).hexdigest()
"#;

const DATABASE_PY: &str = r#"import sqlite3


class DatabaseConnection:
    def __init__(self, path):
        self.conn = sqlite3.connect(path)

    def execute(self, sql, params=()):
        return self.conn.execute(sql, params)
"#;

const METRICS_JS: &str = r#"function calculateMetrics(samples) {
  const total = samples.reduce((a, b) => a + b, 0);
  return { total, mean: total / samples.length };
}
"#;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}

fn settings() -> Config {
    let mut config = Config::default();
    config.embeddings.provider = Some(EmbeddingProviderType::Hash);
    config.embeddings.dimension = Some(128);
    config.rerank.enabled = Some(false);
    config
}

fn corpus() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("auth.py"), AUTH_PY);
    write_file(&dir.path().join("database.py"), DATABASE_PY);
    write_file(&dir.path().join("lib/metrics.js"), METRICS_JS);
    dir
}

fn index(root: &Path) -> IndexStats {
    Indexer::new(root, settings())
        .expect("indexer")
        .index_directory(IndexOptions::default())
        .expect("index")
}

fn engine(root: &Path) -> SearchEngine {
    SearchEngine::with_config(root, settings()).expect("engine")
}

fn assert_scores_in_range(results: &[SearchResult]) {
    for r in results {
        assert!((0.0..=1.0).contains(&r.score), "score {} out of range", r.score);
        assert!((0.0..=1.0).contains(&r.semantic_score));
        assert!((0.0..=1.0).contains(&r.keyword_score));
    }
}

#[test]
fn search_finds_authentication_code() {
    let dir = corpus();
    let stats = index(dir.path());
    assert_eq!(stats.indexed_files, 3);
    assert!(stats.errors.is_empty());

    let mut engine = engine(dir.path());
    let response = engine
        .hybrid_search("user authentication", &SearchOptions::default())
        .expect("search");

    assert!(response.has_results());
    assert!(response.results.iter().any(|r| r.file_path.contains("auth")));
    assert_scores_in_range(&response.results);
}

#[test]
fn file_filter_restricts_results() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path());
    let options = SearchOptions {
        file_filter: Some("auth".to_string()),
        ..SearchOptions::default()
    };
    let response = engine.hybrid_search("function", &options).expect("search");

    assert!(response.has_results());
    assert!(response.results.iter().all(|r| r.file_path == "auth.py"));

    let semantic = engine
        .search("function", 10, 0.0, Some("AUTH"), None)
        .expect("semantic search");
    assert!(semantic.has_results());
    assert!(semantic.results.iter().all(|r| r.file_path == "auth.py"));
}

#[test]
fn language_filter_restricts_results() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path());
    let options = SearchOptions {
        language_filter: Some("javascript".to_string()),
        ..SearchOptions::default()
    };
    let response = engine.hybrid_search("total samples", &options).expect("search");

    assert!(response.has_results());
    assert!(response.results.iter().all(|r| r.language == "javascript"));
}

#[test]
fn alpha_one_is_pure_semantic() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path());
    let options = SearchOptions {
        alpha: 1.0,
        ..SearchOptions::default()
    };
    let response = engine.hybrid_search("hash password", &options).expect("search");

    assert!(response.has_results());
    for r in &response.results {
        assert_eq!(r.score, r.semantic_score);
    }
}

#[test]
fn alpha_zero_finds_identifier_by_keyword() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path());
    let options = SearchOptions {
        alpha: 0.0,
        ..SearchOptions::default()
    };
    let response = engine.hybrid_search("calculateMetrics", &options).expect("search");

    let hit = response
        .results
        .iter()
        .find(|r| r.name == "calculateMetrics")
        .expect("calculateMetrics in results");
    assert!(hit.keyword_score > 0.0);
    assert_eq!(response.results[0].name, "calculateMetrics");
    assert_scores_in_range(&response.results);
}

#[test]
fn query_without_matches_does_not_fail() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path());
    let options = SearchOptions {
        min_score: 0.99,
        ..SearchOptions::default()
    };
    let response = engine
        .hybrid_search("zzqx unrelated gibberish", &options)
        .expect("search");
    assert_eq!(response.total_results, 0);
    assert_eq!(response.format_for_llm(5), "No relevant code found.");

    let empty = engine
        .hybrid_search("", &SearchOptions::default())
        .expect("empty query");
    assert_scores_in_range(&empty.results);
}

#[test]
fn similar_code_is_found() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path());
    let response = engine
        .search_similar(
            "def hash_password(password):\n    return hashlib.sha256(password.encode()).hexdigest()",
            2,
        )
        .expect("similar");

    assert_eq!(response.results[0].file_path, "auth.py");
    assert_eq!(response.results[0].name, "hash_password");
    assert_scores_in_range(&response.results);
}

#[test]
fn reindexing_is_idempotent() {
    let dir = corpus();
    let first = index(dir.path());
    let second = index(dir.path());

    assert_eq!(second.unchanged_files, 3);
    assert_eq!(second.indexed_files, 0);
    assert_eq!(first.total_chunks, second.total_chunks);

    let stats = Indexer::new(dir.path(), settings())
        .unwrap()
        .get_stats()
        .unwrap();
    assert_eq!(stats.total_chunks as usize, first.total_chunks);
}

#[test]
fn file_context_returns_chunks_in_line_order() {
    let dir = corpus();
    index(dir.path());

    let engine = engine(dir.path());
    let chunks = engine.get_file_context("./auth.py").expect("context");

    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.file_path == "auth.py"));
    assert!(chunks.windows(2).all(|w| w[0].start_line <= w[1].start_line));

    let function = chunks
        .iter()
        .find(|c| c.name == "authenticate_user")
        .expect("authenticate_user chunk");
    assert!(function.content.starts_with("def authenticate_user"));
    assert!(chunks.iter().all(|c| c.score == 1.0));

    assert!(engine.get_file_context("missing.py").unwrap().is_empty());
}

#[test]
fn missing_index_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = match SearchEngine::with_config(dir.path(), settings()) {
        Ok(_) => panic!("expected missing index"),
        Err(err) => err,
    };
    assert!(err.downcast_ref::<IndexNotFoundError>().is_some());
    assert!(err.to_string().contains("codefind index"));
}

#[test]
fn mismatched_chunking_is_rejected() {
    let dir = corpus();
    index(dir.path());

    let mut changed = settings();
    changed.index.chunk_overlap = Some(5);
    let err = match SearchEngine::with_config(dir.path(), changed) {
        Ok(_) => panic!("expected mismatch"),
        Err(err) => err,
    };
    let mismatch = err.downcast_ref::<ConfigMismatchError>().expect("mismatch");
    assert_eq!(mismatch.field, "chunk_overlap");
}

#[test]
fn invalid_alpha_is_rejected() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path());
    let options = SearchOptions {
        alpha: 1.5,
        ..SearchOptions::default()
    };
    let err = engine.hybrid_search("user", &options).unwrap_err();
    assert!(err.downcast_ref::<InvalidAlphaError>().is_some());
}

/// Prefers documents mentioning the database class.
struct PreferDatabase;

impl Reranker for PreferDatabase {
    fn model_id(&self) -> &str {
        "prefer-database"
    }

    fn score(&mut self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        Ok(documents
            .iter()
            .map(|d| if d.contains("DatabaseConnection") { 8.0 } else { -3.0 })
            .collect())
    }
}

struct FailingReranker;

impl Reranker for FailingReranker {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn score(&mut self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>> {
        anyhow::bail!("model crashed")
    }
}

#[test]
fn reranker_reorders_candidates() {
    let dir = corpus();
    index(dir.path());

    let mut engine = engine(dir.path()).with_reranker(Box::new(PreferDatabase));
    assert!(engine.rerank_available());

    let options = SearchOptions {
        rerank: true,
        top_k: 3,
        ..SearchOptions::default()
    };
    let response = engine.hybrid_search("user password", &options).expect("search");

    assert!(response.results.len() <= 3);
    assert_eq!(response.results[0].file_path, "database.py");
    assert_eq!(response.results[0].score, 1.0);
    assert_scores_in_range(&response.results);
}

#[test]
fn failing_reranker_keeps_fused_order() {
    let dir = corpus();
    index(dir.path());

    let options = SearchOptions {
        top_k: 3,
        ..SearchOptions::default()
    };
    let plain = engine(dir.path())
        .hybrid_search("user password", &options)
        .expect("search");

    let mut engine = engine(dir.path()).with_reranker(Box::new(FailingReranker));
    let reranked = engine
        .hybrid_search(
            "user password",
            &SearchOptions {
                rerank: true,
                ..options.clone()
            },
        )
        .expect("search");

    assert_eq!(plain.results, reranked.results);
}

#[test]
fn keyword_disabled_falls_back_to_semantic() {
    let dir = corpus();
    index(dir.path());

    let mut config = settings();
    config.search.keyword = Some(false);
    let mut engine = SearchEngine::with_config(dir.path(), config).unwrap();
    assert!(!engine.keyword_search_available());

    let response = engine
        .hybrid_search("calculateMetrics", &SearchOptions::default())
        .expect("search");
    assert!(response.results.iter().all(|r| r.keyword_score == 0.0));
    assert!(response.results.iter().all(|r| r.score == r.semantic_score));
}
