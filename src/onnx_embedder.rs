//! Sentence-transformer embeddings through ONNX Runtime.
//!
//! Token embeddings from `last_hidden_state` are mean-pooled over the
//! attention mask and L2-normalized, which matches how sentence-transformers
//! pools MiniLM-style models.

use hf_hub::{api::sync::Api, Repo, RepoType};
use log::{debug, info};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::{Tokenizer, TruncationParams};

use crate::config::Number;
use crate::embedding::Embedder;
use crate::error::{RetrievalError, Result};
use crate::vector_ops::normalize_vector;

const MODEL_FILE: &str = "onnx/model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const MAX_TOKENS: usize = 256;

fn load_error(e: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::EmbeddingFailure(format!("failed to load embedding model: {}", e))
}

fn inference_error(e: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::EmbeddingFailure(e.to_string())
}

pub struct OnnxEmbedder {
    name: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimensions: usize,
    uses_token_types: bool,
}

impl OnnxEmbedder {
    /// Fetches `repo_id` from the Hugging Face hub (or the local hub cache)
    /// and loads it.
    pub fn from_hub(repo_id: &str, dimensions: usize) -> Result<Self> {
        info!("Loading embedding model {} from the Hugging Face hub", repo_id);
        let api = Api::new().map_err(load_error)?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));
        let model_path = repo.get(MODEL_FILE).map_err(load_error)?;
        let tokenizer_path = repo.get(TOKENIZER_FILE).map_err(load_error)?;
        Self::from_files(repo_id, &model_path, &tokenizer_path, dimensions)
    }

    pub fn from_files(
        name: &str,
        model_path: &Path,
        tokenizer_path: &Path,
        dimensions: usize,
    ) -> Result<Self> {
        if !model_path.is_file() {
            return Err(load_error(format!("no model at {}", model_path.display())));
        }

        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(load_error)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(load_error)?;
        tokenizer.with_padding(None);

        let threads = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        let session = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error)?
            .with_intra_threads(threads)
            .map_err(load_error)?
            .commit_from_file(model_path)
            .map_err(load_error)?;

        let uses_token_types = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        info!(
            "Loaded embedding model {} ({} dimensions)",
            name, dimensions
        );
        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            tokenizer,
            dimensions,
            uses_token_types,
        })
    }

    fn forward_pass(&self, text: &str) -> Result<Vec<Number>> {
        let encoding = self.tokenizer.encode(text, true).map_err(inference_error)?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&v| v as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&v| v as i64)
            .collect();
        let types: Vec<i64> = encoding.get_type_ids().iter().map(|&v| v as i64).collect();
        let seq_len = ids.len();

        let to_tensor = |values: Vec<i64>| -> Result<Tensor<i64>> {
            let array = Array2::from_shape_vec((1, seq_len), values).map_err(inference_error)?;
            Tensor::from_array(array).map_err(inference_error)
        };
        let ids_tensor = to_tensor(ids)?;
        let mask_tensor = to_tensor(mask.clone())?;
        let types_tensor = to_tensor(types)?;

        let mut session = self.session.lock().map_err(inference_error)?;
        let outputs = if self.uses_token_types {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => types_tensor
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor
            ])
        }
        .map_err(inference_error)?;

        let hidden = outputs["last_hidden_state"]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        debug!("Model output shape: {:?}", hidden.shape());

        let shape = hidden.shape();
        if shape.len() != 3 || shape[1] != seq_len || shape[2] != self.dimensions {
            return Err(RetrievalError::EmbeddingFailure(format!(
                "unexpected output shape {:?} for {} tokens",
                shape, seq_len
            )));
        }

        let mut pooled = vec![0.0; self.dimensions];
        let mut mask_sum = 0.0;
        for (t, &m) in mask.iter().enumerate() {
            if m == 0 {
                continue;
            }
            mask_sum += 1.0;
            for (h, value) in pooled.iter_mut().enumerate() {
                *value += hidden[[0, t, h]];
            }
        }
        if mask_sum > 0.0 {
            pooled.iter_mut().for_each(|v| *v /= mask_sum);
        }

        normalize_vector(&mut pooled);
        Ok(pooled)
    }
}

impl Embedder for OnnxEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        self.forward_pass(text)
    }
}
