// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code-aware tokenization and the in-memory BM25 keyword index.
//!
//! Identifiers are split the way programmers read them:
//! `processUserRequest` and `process_user_request` both become
//! `process`, `user`, `request`. Documents are pre-tokenized and fed to an
//! in-RAM tantivy index through a whitespace analyzer, so tantivy only does
//! the BM25 scoring.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tantivy::{
    collector::TopDocs,
    doc,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::{
        Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED,
    },
    tokenizer::{TextAnalyzer, WhitespaceTokenizer},
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};
use tracing::debug;

use crate::embedding::storage::{ChunkMetadata, StoredChunk};
use crate::filters::matches_chunk_filters;

const CODE_TOKENIZER: &str = "code";
const WRITER_HEAP_BYTES: usize = 50_000_000;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*|[0-9]+").expect("identifier regex")
});

/// Splits text into lowercase code tokens.
///
/// ```
/// use codefind::query::keyword::tokenize;
/// assert_eq!(tokenize("processUserRequest"), ["process", "user", "request"]);
/// assert_eq!(tokenize("process_snake_case"), ["process", "snake", "case"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for identifier in IDENTIFIER_RE.find_iter(text) {
        for part in identifier.as_str().split('_').filter(|p| !p.is_empty()) {
            if is_all_upper(part) {
                tokens.push(part.to_lowercase());
            } else {
                split_camel_case(part, &mut tokens);
            }
        }
    }

    tokens
}

/// At least one letter and no lowercase letters
fn is_all_upper(part: &str) -> bool {
    part.chars().any(|c| c.is_ascii_alphabetic()) && !part.chars().any(|c| c.is_ascii_lowercase())
}

/// Splits one `_`-free segment at camelCase boundaries.
///
/// Pieces, tried in order at each position: a lowercase run; an uppercase
/// run followed by `Xy`, end of segment or a digit (the run gives back
/// letters until that holds); a capital with its trailing lowercase; a digit
/// run.
fn split_camel_case(part: &str, out: &mut Vec<String>) {
    let bytes = part.as_bytes();
    let n = bytes.len();
    let run_end = |from: usize, pred: fn(&u8) -> bool| {
        bytes[from..].iter().position(|b| !pred(b)).map_or(n, |p| from + p)
    };

    let mut i = 0;
    while i < n {
        let b = bytes[i];
        let end = if b.is_ascii_lowercase() {
            run_end(i, u8::is_ascii_lowercase)
        } else if b.is_ascii_uppercase() {
            let upper_end = run_end(i, u8::is_ascii_uppercase);
            let boundary = (i + 1..=upper_end).rev().find(|&k| {
                k == n
                    || bytes[k].is_ascii_digit()
                    || (bytes[k].is_ascii_uppercase()
                        && k + 1 < n
                        && bytes[k + 1].is_ascii_lowercase())
            });
            match boundary {
                Some(k) => k,
                None => run_end(i + 1, u8::is_ascii_lowercase),
            }
        } else if b.is_ascii_digit() {
            run_end(i, u8::is_ascii_digit)
        } else {
            i += 1;
            continue;
        };

        out.push(part[i..end].to_lowercase());
        i = end;
    }
}

/// A keyword match with the stored chunk it came from.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub document: String,
    pub metadata: ChunkMetadata,
    /// Raw BM25 score, always positive
    pub score: f32,
}

/// BM25 index over a snapshot of a collection.
pub struct KeywordIndex {
    reader: IndexReader,
    tokens: Field,
    ordinal: Field,
    chunks: Vec<StoredChunk>,
}

impl KeywordIndex {
    /// Builds the index from every chunk of a collection.
    pub fn build(chunks: Vec<StoredChunk>) -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let indexing = TextFieldIndexing::default()
            .set_tokenizer(CODE_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let tokens =
            schema_builder.add_text_field("tokens", TextOptions::default().set_indexing_options(indexing));
        let ordinal = schema_builder.add_u64_field("ordinal", STORED);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        index
            .tokenizers()
            .register(CODE_TOKENIZER, TextAnalyzer::from(WhitespaceTokenizer::default()));

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .context("Failed to create keyword index writer")?;

        for (i, chunk) in chunks.iter().enumerate() {
            let text = tokenize(&chunk.document).join(" ");
            writer.add_document(doc!(
                tokens => text,
                ordinal => i as u64,
            ))?;
        }
        writer.commit().context("Failed to commit keyword index")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to open keyword index reader")?;

        debug!("built keyword index over {} chunks", chunks.len());

        Ok(Self {
            reader,
            tokens,
            ordinal,
            chunks,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Scores `query` against every document and returns the best `top_k`
    /// positive-scoring hits passing the filters.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        file_filter: Option<&str>,
        language_filter: Option<&str>,
    ) -> Result<Vec<KeywordHit>> {
        // One clause per occurrence: repeated query terms add up
        let terms = tokenize(query);

        if terms.is_empty() || top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|term| {
                let term = Term::from_field_text(self.tokens, term);
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        // Filters apply after scoring, so rank the whole corpus
        let top_docs = searcher.search(&query, &TopDocs::with_limit(self.len()))?;

        let mut hits = Vec::new();
        for (score, address) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(address)?;
            let Some(chunk) = doc
                .get_first(self.ordinal)
                .and_then(|v| v.as_u64())
                .and_then(|i| self.chunks.get(i as usize))
            else {
                continue;
            };

            if !matches_chunk_filters(&chunk.metadata, file_filter, language_filter) {
                continue;
            }

            hits.push(KeywordHit {
                document: chunk.document.clone(),
                metadata: chunk.metadata.clone(),
                score,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.metadata.file_path.cmp(&b.metadata.file_path))
                .then_with(|| a.metadata.start_line.cmp(&b.metadata.start_line))
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}
