//! Retrieval core for grounding text generation in a local document corpus:
//! boundary-aware chunking plus a persistent, embedding-backed vector index.

pub mod chunker;
pub mod config;
pub mod database;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
#[cfg(feature = "onnx")]
pub mod onnx_embedder;
pub mod search;
pub mod service;
pub mod vector_entry;
pub mod vector_ops;

pub use chunker::{Chunk, Chunker, SourceDocument};
pub use config::Settings;
pub use embedding::{embedder_from_settings, Embedder, HashingEmbedder};
pub use error::{Result, RetrievalError};
pub use index::VectorIndex;
#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;
pub use search::SearchResult;
pub use service::{format_context, RetrievalService, Stats};
