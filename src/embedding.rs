//! Text embedding capability.
//!
//! The index only depends on the [`Embedder`] trait. The default model is the
//! all-MiniLM-L6-v2 sentence transformer run through ONNX Runtime (the `onnx`
//! feature). [`HashingEmbedder`] is the offline fallback: a signed
//! feature-hashing bag of words and word bigrams, which needs no model files
//! and is fully deterministic.

use sha2::{Digest, Sha256};

use crate::config::{Number, Settings};
use crate::error::{RetrievalError, Result};
use crate::vector_ops::normalize_vector;

pub const HASHING_MODEL: &str = "sha256-hashing";
pub const MINILM_MODEL: &str = "all-MiniLM-L6-v2";
pub const MINILM_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const MINILM_DIMENSIONS: usize = 384;

/// Weight of a bigram feature relative to a single token.
const BIGRAM_WEIGHT: Number = 0.5;

pub trait Embedder {
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<Number>>;
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        (**self).embed(text)
    }
}

pub fn is_minilm(model: &str) -> bool {
    model == MINILM_MODEL || model == MINILM_REPO
}

/// Builds the embedder named by `settings.embedding_model`.
pub fn embedder_from_settings(settings: &Settings) -> Result<Box<dyn Embedder>> {
    match settings.embedding_model.as_str() {
        HASHING_MODEL => Ok(Box::new(HashingEmbedder::new(settings.dimensions)?)),
        model if is_minilm(model) => {
            if settings.dimensions != MINILM_DIMENSIONS {
                return Err(RetrievalError::DimensionMismatch {
                    expected: MINILM_DIMENSIONS,
                    actual: settings.dimensions,
                });
            }
            load_minilm()
        }
        other => Err(RetrievalError::EmbeddingFailure(format!(
            "unknown embedding model '{}'",
            other
        ))),
    }
}

#[cfg(feature = "onnx")]
fn load_minilm() -> Result<Box<dyn Embedder>> {
    let embedder = crate::onnx_embedder::OnnxEmbedder::from_hub(MINILM_REPO, MINILM_DIMENSIONS)?;
    Ok(Box::new(embedder))
}

#[cfg(not(feature = "onnx"))]
fn load_minilm() -> Result<Box<dyn Embedder>> {
    Err(RetrievalError::EmbeddingFailure(format!(
        "{} needs the `onnx` feature; rebuild with it or use {}",
        MINILM_MODEL, HASHING_MODEL
    )))
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RetrievalError::EmbeddingFailure(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    fn accumulate(&self, vector: &mut [Number], feature: &str, weight: Number) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        HASHING_MODEL
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0; self.dimensions];

        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        normalize_vector(&mut vector);
        Ok(vector)
    }
}
