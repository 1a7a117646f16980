// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-encoder re-ranking of search candidates.

use anyhow::{bail, Result};

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
use anyhow::Context;
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};

/// Scores (query, document) pairs.
pub trait Reranker: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Raw relevance scores, one per document, in input order.
    fn score(&mut self, query: &str, documents: &[&str]) -> Result<Vec<f32>>;
}

/// Loads the configured cross-encoder.
pub fn create_reranker(model: &str) -> Result<Box<dyn Reranker>> {
    #[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
    {
        Ok(Box::new(FastEmbedReranker::new(model)?))
    }

    #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
    {
        bail!("Re-ranking model '{}' is not available on this platform", model)
    }
}

/// fastembed `TextRerank` cross-encoder.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedReranker {
    model: TextRerank,
    model_id: String,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedReranker {
    pub fn new(model: &str) -> Result<Self> {
        let (kind, model_id) = parse_model(model)?;
        let model = TextRerank::try_new(RerankInitOptions::new(kind))
            .context("Failed to initialize re-ranking model")?;
        Ok(Self {
            model,
            model_id: model_id.to_string(),
        })
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl Reranker for FastEmbedReranker {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn score(&mut self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let ranked = self.model.rerank(query, documents.to_vec(), false, None)?;

        let mut scores = vec![0.0f32; documents.len()];
        for result in ranked {
            match scores.get_mut(result.index) {
                Some(slot) => *slot = result.score,
                None => bail!("Re-ranker returned out-of-range index {}", result.index),
            }
        }
        Ok(scores)
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn parse_model(name: &str) -> Result<(RerankerModel, &'static str)> {
    match name.trim().to_lowercase().as_str() {
        "" | "bge-reranker-base" | "baai/bge-reranker-base" => {
            Ok((RerankerModel::BGERerankerBase, "bge-reranker-base"))
        }
        "bge-reranker-v2-m3" | "rozgo/bge-reranker-v2-m3" => {
            Ok((RerankerModel::BGERerankerV2M3, "bge-reranker-v2-m3"))
        }
        "jina-reranker-v1-turbo-en" | "jinaai/jina-reranker-v1-turbo-en" => {
            Ok((RerankerModel::JINARerankerV1TurboEn, "jina-reranker-v1-turbo-en"))
        }
        other => bail!(
            "Unsupported re-ranking model '{}'. Supported values: bge-reranker-base, \
             bge-reranker-v2-m3, jina-reranker-v1-turbo-en",
            other
        ),
    }
}
