use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::chunker::{Chunker, SourceDocument};
use crate::config::Settings;
use crate::document::process_directory;
use crate::embedding::Embedder;
use crate::error::{RetrievalError, Result};
use crate::index::VectorIndex;

pub const NO_CONTEXT: &str = "No relevant context found in documents.";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Stats {
    pub document_count: usize,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

/// Owns the chunker and the vector index for one process.
///
/// Built in two steps: [`RetrievalService::new`] only wires dependencies,
/// then either [`RetrievalService::open`] attaches the index as it is on
/// disk, or [`RetrievalService::initialize`] also performs the first load
/// into an empty index. Everything that needs the index fails with
/// `IndexUnavailable` until one of them has run.
pub struct RetrievalService<E: Embedder> {
    store_path: PathBuf,
    data_dir: PathBuf,
    top_k: usize,
    chunker: Chunker,
    embedder: Option<E>,
    index: Option<VectorIndex<E>>,
    loaded: bool,
}

impl<E: Embedder> RetrievalService<E> {
    pub fn new(settings: &Settings, embedder: E) -> Result<Self> {
        if embedder.dimensions() != settings.dimensions {
            return Err(RetrievalError::DimensionMismatch {
                expected: settings.dimensions,
                actual: embedder.dimensions(),
            });
        }

        Ok(Self {
            store_path: PathBuf::from(&settings.path),
            data_dir: PathBuf::from(&settings.data_dir),
            top_k: settings.top_k,
            chunker: Chunker::new(settings.chunk_size, settings.chunk_overlap)?,
            embedder: Some(embedder),
            index: None,
            loaded: false,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.index.is_some()
    }

    /// Opens the index without reading the data directory.
    pub fn open(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Ok(());
        }
        let embedder = self.embedder.take().ok_or_else(|| {
            RetrievalError::IndexUnavailable(
                "a previous attempt to open the index failed; build a new service".to_string(),
            )
        })?;
        self.index = Some(VectorIndex::open(&self.store_path, embedder)?);
        Ok(())
    }

    /// Opens the index and loads the data directory if the index is empty.
    ///
    /// A failed first load leaves the index open; calling this again
    /// retries the load.
    pub fn initialize(&mut self) -> Result<()> {
        if self.loaded {
            info!("Retrieval service already initialized");
            return Ok(());
        }

        info!("Starting retrieval service initialization...");
        self.open()?;

        let count = self.index()?.count()?;
        if count == 0 {
            warn!("Vector store is empty. Loading documents...");
            let data_dir = self.data_dir.clone();
            self.load_documents(&data_dir)?;
        } else {
            info!("Vector store has {} documents", count);
        }

        self.loaded = true;
        info!("Retrieval service initialization complete");
        Ok(())
    }

    fn index(&self) -> Result<&VectorIndex<E>> {
        self.index.as_ref().ok_or_else(|| {
            RetrievalError::IndexUnavailable("retrieval service is not initialized".to_string())
        })
    }

    fn index_mut(&mut self) -> Result<&mut VectorIndex<E>> {
        self.index.as_mut().ok_or_else(|| {
            RetrievalError::IndexUnavailable("retrieval service is not initialized".to_string())
        })
    }

    /// Chunks every supported file under `dir` and adds the chunks.
    pub fn load_documents(&mut self, dir: &Path) -> Result<usize> {
        info!("Loading documents from: {}", dir.display());
        let chunks = process_directory(dir, &self.chunker)?;
        if chunks.is_empty() {
            warn!("No documents found to load");
            return Ok(0);
        }
        let added = self.index_mut()?.add(&chunks)?;
        info!("Successfully loaded {} document chunks", added);
        Ok(added)
    }

    /// Chunks caller-supplied documents and adds the chunks.
    pub fn ingest(&mut self, documents: &[SourceDocument]) -> Result<usize> {
        let chunks: Vec<_> = documents
            .iter()
            .flat_map(|document| self.chunker.chunk_document(document))
            .collect();
        self.index_mut()?.add(&chunks)
    }

    pub fn reload_documents(&mut self, dir: &Path) -> Result<usize> {
        self.index_mut()?.clear()?;
        info!("Reloading documents...");
        let added = self.load_documents(dir)?;
        info!("Documents reloaded successfully");
        Ok(added)
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        self.index()?.search(query, self.top_k)
    }

    pub fn retrieve_top(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        self.index()?.search(query, top_k)
    }

    pub fn vector_index(&self) -> Result<&VectorIndex<E>> {
        self.index()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn stats(&self) -> Result<Stats> {
        let index = self.index()?;
        Ok(Stats {
            document_count: index.count()?,
            embedding_model: index.embedder().model_name().to_string(),
            dimensions: index.dimensions(),
            chunk_size: self.chunker.max_size(),
            chunk_overlap: self.chunker.overlap(),
            top_k: self.top_k,
        })
    }
}

/// Joins passages into the context block handed to the generator.
pub fn format_context(passages: &[String]) -> String {
    if passages.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        passages.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    #[test]
    fn format_context_joins_with_blank_lines() {
        let passages = vec!["first".to_string(), "second".to_string()];
        assert_eq!(format_context(&passages), "first\n\nsecond");
        assert_eq!(format_context(&[]), NO_CONTEXT);
    }

    #[test]
    fn operations_fail_before_initialize() {
        let settings = Settings {
            dimensions: 32,
            ..Settings::default()
        };
        let service = RetrievalService::new(&settings, HashingEmbedder::new(32).unwrap()).unwrap();
        assert!(!service.is_initialized());
        assert!(matches!(
            service.retrieve("anything"),
            Err(RetrievalError::IndexUnavailable(_))
        ));
        assert!(matches!(service.stats(), Err(RetrievalError::IndexUnavailable(_))));
    }

    #[test]
    fn open_does_not_read_the_data_directory() {
        let root = tempfile::TempDir::new().unwrap();
        let settings = Settings {
            path: root.path().join("store").to_string_lossy().to_string(),
            data_dir: root.path().join("missing").to_string_lossy().to_string(),
            dimensions: 32,
            ..Settings::default()
        };
        let mut service =
            RetrievalService::new(&settings, HashingEmbedder::new(32).unwrap()).unwrap();
        service.open().unwrap();
        service.open().unwrap();
        assert!(service.is_initialized());
        assert!(service.retrieve("anything").unwrap().is_empty());
        assert_eq!(service.stats().unwrap().document_count, 0);
    }

    #[test]
    fn embedder_must_match_configured_dimensions() {
        let settings = Settings {
            dimensions: 32,
            ..Settings::default()
        };
        let result = RetrievalService::new(&settings, HashingEmbedder::new(16).unwrap());
        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch { expected: 32, actual: 16 })
        ));
    }
}
