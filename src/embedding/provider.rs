// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! The builtin provider runs a fastembed model in-process. The command
//! provider shells out to an external embedder, and the hashing provider is a
//! deterministic, model-free fallback that keeps offline setups working.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::query::keyword::tokenize;

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

const DEFAULT_FASTEMBED_BATCH_SIZE: usize = 256;
const MAX_FASTEMBED_BATCH_SIZE: usize = 1024;
const DEFAULT_COMMAND_BATCH_SIZE: usize = 64;
const DEFAULT_HASH_BATCH_SIZE: usize = 512;

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Returns the batch size used by the provider.
    fn batch_size(&self) -> usize;

    /// Generates embeddings for the given texts.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

/// Builds the provider selected by `[embeddings] provider`.
///
/// `model` is the collection's embedding model name.
pub fn create_provider(config: &EmbeddingConfig, model: &str) -> Result<Box<dyn EmbeddingProvider>> {
    debug!("creating {:?} embedding provider for {}", config.provider(), model);
    match config.provider() {
        EmbeddingProviderType::Builtin => create_builtin(config, model),
        EmbeddingProviderType::Command => {
            let mut provider = CommandProvider::new(config.command().to_string(), model.to_string());
            if config.batch_size() > 0 {
                provider.batch_size = config.batch_size();
            }
            Ok(Box::new(provider))
        }
        EmbeddingProviderType::Hash => {
            let mut provider = HashingProvider::new(config.dimension());
            if config.batch_size() > 0 {
                provider.batch_size = config.batch_size();
            }
            Ok(Box::new(provider))
        }
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn create_builtin(config: &EmbeddingConfig, model: &str) -> Result<Box<dyn EmbeddingProvider>> {
    let mut batch_size = match config.batch_size() {
        0 => DEFAULT_FASTEMBED_BATCH_SIZE,
        n => n,
    };
    if batch_size > MAX_FASTEMBED_BATCH_SIZE {
        warn!(
            "embeddings.batch_size={} exceeds max {}; clamping.",
            batch_size, MAX_FASTEMBED_BATCH_SIZE
        );
        batch_size = MAX_FASTEMBED_BATCH_SIZE;
    }

    let provider_config = FastEmbedConfig {
        model: parse_model(model)?,
        batch_size,
        max_chars: config.max_chars(),
        normalize: true,
    };
    Ok(Box::new(FastEmbedder::new(provider_config)?))
}

#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
fn create_builtin(_config: &EmbeddingConfig, _model: &str) -> Result<Box<dyn EmbeddingProvider>> {
    bail!("The builtin embedding provider is not available on this platform; set [embeddings] provider = \"command\" or \"hash\"")
}

/// Configuration for the fastembed provider.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
#[derive(Debug, Clone)]
pub struct FastEmbedConfig {
    pub model: EmbeddingModel,
    pub batch_size: usize,
    pub max_chars: usize,
    pub normalize: bool,
}

/// FastEmbed provider, sentence-transformers/all-MiniLM-L6-v2 by default.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedder {
    embedder: TextEmbedding,
    config: FastEmbedConfig,
    model_id: String,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedder {
    pub fn new(config: FastEmbedConfig) -> Result<Self> {
        let model = config.model.clone();
        let model_id = model.to_string();
        let init = InitOptions::new(model);
        let embedder =
            TextEmbedding::try_new(init).context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder,
            config,
            model_id,
        })
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.config.max_chars);
        let mut embeddings = self
            .embedder
            .embed(&prepared, Some(self.config.batch_size))?;

        if self.config.normalize {
            for embedding in embeddings.iter_mut() {
                l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn parse_model(name: &str) -> Result<EmbeddingModel> {
    let value = name.trim();
    if value.is_empty() {
        return Ok(EmbeddingModel::AllMiniLML6V2);
    }

    match value.to_lowercase().as_str() {
        "minilm"
        | "all-minilm-l6-v2"
        | "allminilm-l6-v2"
        | "sentence-transformers/all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" | "sentence-transformers/all-minilm-l12-v2" => {
            Ok(EmbeddingModel::AllMiniLML12V2)
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
            Ok(EmbeddingModel::NomicEmbedTextV15)
        }
        other => bail!(
            "Unsupported embedding model '{}'. Supported values: all-MiniLM-L6-v2, \
             all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
            other
        ),
    }
}

/// Command provider that shells out to an external process.
///
/// The process receives `{"model": ..., "texts": [...]}` on stdin and must
/// print either a JSON array of vectors or an object holding one under
/// `embeddings`, `vectors` or `data`.
pub struct CommandProvider {
    command: String,
    model: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandReply {
    Bare(Vec<Vec<f32>>),
    Wrapped {
        #[serde(alias = "vectors", alias = "data")]
        embeddings: Vec<Vec<f32>>,
    },
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self {
            command,
            model,
            batch_size: DEFAULT_COMMAND_BATCH_SIZE,
        }
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut child = Command::new("sh")
            .args(["-c", &self.command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command '{}'", self.command))?;

        if let Some(stdin) = child.stdin.take() {
            let request = CommandRequest {
                model: &self.model,
                texts,
            };
            serde_json::to_writer(stdin, &request)
                .context("Failed to send texts to the embedding command")?;
        }

        let output = child
            .wait_with_output()
            .context("Embedding command did not complete")?;
        if !output.status.success() {
            bail!(
                "Embedding command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let vectors = parse_vectors(&String::from_utf8_lossy(&output.stdout))?;
        if vectors.len() != texts.len() {
            bail!(
                "Embedding command returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

fn parse_vectors(raw: &str) -> Result<Vec<Vec<f32>>> {
    let reply: CommandReply = serde_json::from_str(raw.trim())
        .context("Embedding command output is not a list of numeric vectors")?;
    Ok(match reply {
        CommandReply::Bare(vectors) => vectors,
        CommandReply::Wrapped { embeddings } => embeddings,
    })
}

/// Feature-hashing provider over code tokens.
///
/// Each token produced by the code tokenizer is hashed (FNV-1a) into one of
/// `dimension` buckets with a sign bit; the result is L2-normalized. Texts
/// sharing identifiers land near each other, which is enough for offline use
/// and tests.
pub struct HashingProvider {
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            model: format!("hash-{}", dimension),
            dimension,
            batch_size: DEFAULT_HASH_BATCH_SIZE,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg_attr(all(target_os = "macos", target_arch = "x86_64"), allow(dead_code))]
fn truncate_texts(texts: &[String], max_chars: usize) -> Vec<Cow<'_, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}
