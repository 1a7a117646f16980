// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic, keyword and hybrid search over an indexed codebase.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::keyword::{KeywordHit, KeywordIndex};
use crate::config::{Config, IndexConfig};
use crate::embedding::provider::{create_provider, EmbeddingProvider};
use crate::embedding::storage::{ChunkMetadata, VectorStore};
use crate::embedding::ChunkType;
use crate::filters::matches_file_filter;
use crate::hybrid::{self, DEFAULT_ALPHA};
use crate::lazy::LazySlot;
use crate::rerank::{create_reranker, Reranker};
use crate::utils::normalize_path;

/// One retrieved chunk with its scores, all in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub chunk_type: ChunkType,
    pub name: String,
    pub language: String,
    /// Final ranking score
    pub score: f32,
    pub semantic_score: f32,
    pub keyword_score: f32,
}

impl SearchResult {
    /// Builds a result from stored data; `score` becomes the semantic score.
    pub fn from_parts(content: String, metadata: ChunkMetadata, score: f32) -> Self {
        Self {
            content,
            file_path: metadata.file_path,
            start_line: metadata.start_line,
            end_line: metadata.end_line,
            chunk_type: metadata.chunk_type,
            name: metadata.name,
            language: metadata.language,
            score,
            semantic_score: score,
            keyword_score: 0.0,
        }
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{} ({}: {}) [score: {:.3}]",
            self.file_path, self.start_line, self.end_line, self.chunk_type, self.name, self.score
        )
    }
}

/// Results of one query, best first.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        let total_results = results.len();
        Self {
            query: query.into(),
            results,
            total_results,
        }
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    /// Renders the results as prompt context, showing at most `max_results`.
    pub fn format_for_llm(&self, max_results: usize) -> String {
        if self.results.is_empty() {
            return "No relevant code found.".to_string();
        }

        let mut parts = vec![format!(
            "Found {} relevant code sections:\n",
            self.results.len()
        )];
        for (i, result) in self.results.iter().take(max_results).enumerate() {
            parts.push(format!(
                "\n--- Result {}: {}:{}-{} ---",
                i + 1,
                result.file_path,
                result.start_line,
                result.end_line
            ));
            parts.push(format!("Type: {} | Name: {}", result.chunk_type, result.name));
            parts.push(format!("```{}", result.language));
            parts.push(result.content.clone());
            parts.push("```\n".to_string());
        }
        parts.join("\n")
    }
}

/// Knobs for [`SearchEngine::hybrid_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub min_score: f32,
    /// Weight of the semantic score, `[0, 1]`
    pub alpha: f32,
    /// Case-insensitive substring of the file path
    pub file_filter: Option<String>,
    /// Exact language name
    pub language_filter: Option<String>,
    pub rerank: bool,
    /// Candidates handed to the reranker
    pub rerank_top_k: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.0,
            alpha: DEFAULT_ALPHA,
            file_filter: None,
            language_filter: None,
            rerank: false,
            rerank_top_k: 20,
        }
    }
}

impl SearchOptions {
    /// Defaults taken from the `[search]` section
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.search.top_k(),
            min_score: config.search.min_score(),
            alpha: config.search.alpha(),
            rerank_top_k: config.search.rerank_top_k(),
            ..Self::default()
        }
    }
}

/// Query surface over one collection.
///
/// The embedder, keyword index and reranker are loaded on first use and at
/// most once per engine.
pub struct SearchEngine {
    root: PathBuf,
    settings: Config,
    index_config: IndexConfig,
    store: VectorStore,
    embedder: LazySlot<Box<dyn EmbeddingProvider>>,
    keyword_index: LazySlot<KeywordIndex>,
    reranker: LazySlot<Box<dyn Reranker>>,
    keyword_enabled: bool,
    rerank_enabled: bool,
}

impl SearchEngine {
    /// Opens the index under `root` using the configuration found there.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        Self::with_config(root, Config::load_for_dir(root))
    }

    /// Opens the index under `root` with explicit settings.
    ///
    /// Fails with `IndexNotFoundError` when nothing was indexed and with
    /// `ConfigMismatchError` when `settings` disagree with the collection.
    pub fn with_config(root: impl AsRef<Path>, settings: Config) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let index_config = settings.index_config();

        let store = VectorStore::open_existing(
            &index_config.index_dir(&root),
            &index_config.collection_name,
        )?;
        if let Some(info) = store.collection_info()? {
            info.check_compatible(&index_config)?;
        }

        let keyword_enabled = settings.search.keyword();
        let rerank_enabled = settings.rerank.enabled();

        Ok(Self {
            root,
            settings,
            index_config,
            store,
            embedder: LazySlot::default(),
            keyword_index: LazySlot::default(),
            reranker: LazySlot::default(),
            keyword_enabled,
            rerank_enabled,
        })
    }

    /// Uses `embedder` instead of the configured provider.
    pub fn with_embedder(mut self, embedder: Box<dyn EmbeddingProvider>) -> Self {
        self.embedder = LazySlot::loaded(embedder);
        self
    }

    /// Uses `reranker` instead of loading the configured model.
    pub fn with_reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = LazySlot::loaded(reranker);
        self.rerank_enabled = true;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_config(&self) -> &IndexConfig {
        &self.index_config
    }

    /// Whether keyword (BM25) search can contribute to results.
    pub fn keyword_search_available(&self) -> bool {
        self.keyword_enabled && !self.keyword_index.is_unavailable()
    }

    /// Whether a re-ranking model can be used.
    pub fn rerank_available(&self) -> bool {
        self.rerank_enabled && !self.reranker.is_unavailable()
    }

    fn embed_query(&mut self, query: &str) -> Result<Vec<f32>> {
        let settings = &self.settings.embeddings;
        let model = &self.index_config.embedding_model;
        let embedder = self
            .embedder
            .get_or_load(|| create_provider(settings, model).map(Some))?
            .context("No embedding provider available")?;
        embedder.embed_one(query)
    }

    /// Loads the keyword index on first use. Returns whether it is usable.
    fn ensure_keyword_index(&mut self) -> bool {
        if !self.keyword_enabled {
            return false;
        }
        let store = &self.store;
        let loaded = self.keyword_index.get_or_load(|| {
            match store.get_all().and_then(KeywordIndex::build) {
                Ok(index) => {
                    debug!("keyword index ready ({} chunks)", index.len());
                    Ok(Some(index))
                }
                Err(err) => {
                    warn!("Keyword search disabled: failed to build BM25 index: {:#}", err);
                    Ok(None)
                }
            }
        });
        matches!(loaded, Ok(Some(_)))
    }

    fn load_reranker(&mut self) -> Option<&mut Box<dyn Reranker>> {
        if !self.rerank_enabled {
            return None;
        }
        let model = self.settings.rerank.model().to_string();
        match self.reranker.get_or_load(|| match create_reranker(&model) {
            Ok(reranker) => Ok(Some(reranker)),
            Err(err) => {
                warn!("Re-ranking disabled: {:#}", err);
                Ok(None)
            }
        }) {
            Ok(reranker) => reranker,
            Err(_) => None,
        }
    }

    /// Pure semantic search.
    ///
    /// Retrieves the `top_k` nearest chunks (restricted to `language_filter`
    /// when given), then drops those under `min_score` or outside
    /// `file_filter`.
    pub fn search(
        &mut self,
        query: &str,
        top_k: usize,
        min_score: f32,
        file_filter: Option<&str>,
        language_filter: Option<&str>,
    ) -> Result<SearchResponse> {
        let embedding = self.embed_query(query)?;
        let hits = self.store.query_nearest(&embedding, top_k, language_filter)?;

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| {
                let score = hybrid::distance_to_score(hit.distance);
                if score < min_score
                    || !matches_file_filter(&hit.chunk.metadata.file_path, file_filter)
                {
                    return None;
                }
                Some(SearchResult::from_parts(
                    hit.chunk.document,
                    hit.chunk.metadata,
                    score,
                ))
            })
            .collect();

        sort_results(&mut results);
        Ok(SearchResponse::new(query, results))
    }

    /// BM25 keyword search. Empty when the query has no tokens or keyword
    /// search is unavailable.
    pub fn bm25_search(
        &mut self,
        query: &str,
        top_k: usize,
        file_filter: Option<&str>,
        language_filter: Option<&str>,
    ) -> Result<Vec<KeywordHit>> {
        if !self.ensure_keyword_index() {
            return Ok(Vec::new());
        }
        match &self.keyword_index {
            LazySlot::Loaded(index) => index.search(query, top_k, file_filter, language_filter),
            _ => Ok(Vec::new()),
        }
    }

    /// Semantic and keyword search fused with `alpha`, optionally re-ranked.
    pub fn hybrid_search(&mut self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        hybrid::validate_alpha(options.alpha)?;

        let file_filter = options.file_filter.as_deref();
        let language_filter = options.language_filter.as_deref();

        if !self.ensure_keyword_index() {
            debug!("keyword index unavailable, using semantic search only");
            return self.search(
                query,
                options.top_k,
                options.min_score,
                file_filter,
                language_filter,
            );
        }

        let fetch_k = hybrid::fetch_k(options.top_k, options.rerank, options.rerank_top_k);
        let semantic = self
            .search(query, fetch_k, 0.0, file_filter, language_filter)?
            .results;
        let keyword = self.bm25_search(query, fetch_k, file_filter, language_filter)?;
        debug!(
            "hybrid candidates: {} semantic, {} keyword",
            semantic.len(),
            keyword.len()
        );

        let mut results: Vec<SearchResult> = hybrid::merge(options.alpha, semantic, keyword)
            .into_iter()
            .filter(|r| r.score >= options.min_score)
            .collect();
        sort_results(&mut results);

        if options.rerank {
            match self.load_reranker() {
                Some(reranker) => {
                    results.truncate(options.rerank_top_k);
                    rerank_results(&mut **reranker, query, &mut results);
                }
                None => debug!("re-ranking requested but no reranker is available"),
            }
        }
        results.truncate(options.top_k);

        Ok(SearchResponse::new(query, results))
    }

    /// Finds chunks similar to a code snippet.
    pub fn search_similar(&mut self, code: &str, top_k: usize) -> Result<SearchResponse> {
        self.search(code, top_k, 0.0, None, None)
    }

    /// Every stored chunk of one file, in line order, with score 1.0.
    pub fn get_file_context(&self, file_path: &str) -> Result<Vec<SearchResult>> {
        let path = normalize_path(file_path);
        let mut results: Vec<SearchResult> = self
            .store
            .get_by_file(&path)?
            .into_iter()
            .map(|chunk| {
                let mut result = SearchResult::from_parts(chunk.document, chunk.metadata, 1.0);
                result.semantic_score = 0.0;
                result
            })
            .collect();
        results.sort_by_key(|r| (r.start_line, r.end_line));
        Ok(results)
    }
}

/// Replaces scores with min-max normalized reranker scores and re-sorts.
///
/// On failure the fused order is kept.
fn rerank_results(reranker: &mut dyn Reranker, query: &str, results: &mut [SearchResult]) {
    if results.is_empty() {
        return;
    }

    let documents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    let raw = match reranker.score(query, &documents) {
        Ok(raw) if raw.len() == results.len() => raw,
        Ok(raw) => {
            warn!(
                "Re-ranker returned {} scores for {} candidates; keeping fused order",
                raw.len(),
                results.len()
            );
            return;
        }
        Err(err) => {
            warn!("Re-ranking failed, keeping fused order: {:#}", err);
            return;
        }
    };

    for (result, score) in results.iter_mut().zip(hybrid::normalize_min_max(&raw)) {
        result.score = score;
    }
    sort_results(results);
}

/// Score descending, then file path and start line.
fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str, start: usize, score: f32) -> SearchResult {
        SearchResult {
            content: format!("def f{}(): pass", start),
            file_path: path.to_string(),
            start_line: start,
            end_line: start + 2,
            chunk_type: ChunkType::Function,
            name: format!("f{}", start),
            language: "python".to_string(),
            score,
            semantic_score: score,
            keyword_score: 0.0,
        }
    }

    struct ReverseReranker;

    impl Reranker for ReverseReranker {
        fn model_id(&self) -> &str {
            "reverse"
        }

        fn score(&mut self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
            Ok((0..documents.len()).map(|i| i as f32).collect())
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
    fn format_for_llm_empty() {
        let response = SearchResponse::new("q", Vec::new());
        assert!(!response.has_results());
        assert_eq!(response.format_for_llm(5), "No relevant code found.");
    }

    #[test]
    fn format_for_llm_layout() {
        let response = SearchResponse::new(
            "auth",
            vec![result("src/auth.py", 1, 0.9), result("src/db.py", 5, 0.5)],
        );
        let text = response.format_for_llm(1);

        assert!(text.starts_with("Found 2 relevant code sections:\n"));
        assert!(text.contains("--- Result 1: src/auth.py:1-3 ---"));
        assert!(text.contains("Type: function | Name: f1"));
        assert!(text.contains("```python\ndef f1(): pass\n```"));
        assert!(!text.contains("Result 2"));
    }

    #[test]
    fn display_includes_location_and_score() {
        let shown = result("a.py", 3, 0.25).to_string();
        assert_eq!(shown, "a.py:3-5 (function: f3) [score: 0.250]");
    }

    #[test]
    fn json_shape() {
        let value = serde_json::to_value(SearchResponse::new("q", vec![result("a.py", 1, 0.5)]))
            .unwrap();
        assert_eq!(value["total_results"], 1);
        assert_eq!(value["results"][0]["chunk_type"], "function");
        assert_eq!(value["results"][0]["file_path"], "a.py");
    }

    #[test]
    fn sort_breaks_ties_by_location() {
        let mut results = vec![
            result("b.py", 1, 0.5),
            result("a.py", 9, 0.5),
            result("a.py", 2, 0.5),
            result("c.py", 1, 0.9),
        ];
        sort_results(&mut results);
        let order: Vec<_> = results
            .iter()
            .map(|r| (r.file_path.as_str(), r.start_line))
            .collect();
        assert_eq!(order, vec![("c.py", 1), ("a.py", 2), ("a.py", 9), ("b.py", 1)]);
    }

    #[test]
    fn rerank_reorders_and_normalizes() {
        let mut results = vec![
            result("a.py", 1, 0.9),
            result("b.py", 1, 0.8),
            result("c.py", 1, 0.7),
        ];
        rerank_results(&mut ReverseReranker, "q", &mut results);

        assert_eq!(results[0].file_path, "c.py");
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[2].file_path, "a.py");
        assert_eq!(results[2].score, 0.0);
        // sub-scores survive
        assert_eq!(results[2].semantic_score, 0.9);
    }

    struct NanReranker;

    impl Reranker for NanReranker {
        fn model_id(&self) -> &str {
            "nan"
        }

        fn score(&mut self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
            Ok(documents
                .iter()
                .enumerate()
                .map(|(i, _)| if i == 0 { f32::NAN } else { i as f32 })
                .collect())
        }
    }

    #[test]
    fn rerank_scores_stay_in_range_with_nan() {
        let mut results = vec![
            result("a.py", 1, 0.9),
            result("b.py", 1, 0.8),
            result("c.py", 1, 0.7),
        ];
        rerank_results(&mut NanReranker, "q", &mut results);

        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
        assert_eq!(results[0].file_path, "c.py");
        assert_eq!(results[0].score, 1.0);
        // the NaN candidate ties with the batch minimum
        assert_eq!(results[1].file_path, "a.py");
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn rerank_failure_keeps_order() {
        let mut results = vec![result("a.py", 1, 0.9), result("b.py", 1, 0.8)];
        let before = results.clone();
        rerank_results(&mut FailingReranker, "q", &mut results);
        assert_eq!(results, before);
    }

    #[test]
    fn options_default() {
        let options = SearchOptions::default();
        assert_eq!(options.top_k, 10);
        assert_eq!(options.alpha, 0.5);
        assert_eq!(options.rerank_top_k, 20);
        assert!(!options.rerank);
    }
}
