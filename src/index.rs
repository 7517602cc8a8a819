//! Persistent vector index over document chunks.
//!
//! Entries are embedded on insert and ranked by cosine similarity at query
//! time. Mutation (`add`, `clear`) needs `&mut self`; `search` and `count`
//! only borrow, so callers sharing an index across threads must put the
//! mutation path behind exclusive access.
//!
//! `add` is not transactional across a batch: each entry commits on its own,
//! so an embedding failure part-way through leaves the earlier entries of
//! that batch in the index.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::Path;

use crate::chunker::Chunk;
use crate::config::Number;
use crate::database::{LmdbStore, DIMENSIONS_KEY, NEXT_ID_KEY};
use crate::embedding::Embedder;
use crate::error::{RetrievalError, Result};
use crate::search::{rank_entries, SearchResult};
use crate::vector_entry::{entry_id, IndexEntry, Metadata};
use crate::vector_ops::normalize_vector;

pub struct VectorIndex<E: Embedder> {
    store: LmdbStore,
    embedder: E,
    next_id: u64,
}

impl<E: Embedder> VectorIndex<E> {
    /// Opens the index stored at `path`, creating it when absent.
    pub fn open<P: AsRef<Path>>(path: P, embedder: E) -> Result<Self> {
        let store = LmdbStore::open(path.as_ref())?;
        let dimensions = embedder.dimensions();

        match store.get_meta(DIMENSIONS_KEY)? {
            Some(stored) if stored as usize != dimensions => {
                return Err(RetrievalError::DimensionMismatch {
                    expected: stored as usize,
                    actual: dimensions,
                });
            }
            Some(_) => {}
            None => store.put_meta(DIMENSIONS_KEY, dimensions as u64)?,
        }

        let next_id = store.get_meta(NEXT_ID_KEY)?.unwrap_or(0);
        let index = Self {
            store,
            embedder,
            next_id,
        };

        info!(
            "Opened vector index at {} with {} entries (model {}, {} dimensions)",
            path.as_ref().display(),
            index.count()?,
            index.embedder.model_name(),
            dimensions
        );
        Ok(index)
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        let mut vector = self.embedder.embed(text).map_err(|e| match e {
            RetrievalError::EmbeddingFailure(_) => e,
            other => RetrievalError::EmbeddingFailure(other.to_string()),
        })?;
        if vector.len() != self.dimensions() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions(),
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RetrievalError::EmbeddingFailure(format!(
                "{} returned a non-finite vector",
                self.embedder.model_name()
            )));
        }
        normalize_vector(&mut vector);
        Ok(vector)
    }

    /// Embeds and inserts every chunk, returning how many were added.
    pub fn add(&mut self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            warn!("No documents to add");
            return Ok(0);
        }

        info!("Processing {} documents...", chunks.len());

        for chunk in chunks {
            let vector = self.embed(&chunk.content)?;
            let seq = self.next_id;
            let entry = IndexEntry {
                id: entry_id(seq),
                seq,
                vector,
                content: chunk.content.clone(),
                metadata: Metadata::from(chunk),
            };
            self.store.insert(&entry, seq + 1)?;
            self.next_id = seq + 1;
        }

        info!("Added {} documents to vector store", chunks.len());
        Ok(chunks.len())
    }

    /// The `min(top_k, count)` closest entries, best match first.
    pub fn search_scored(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let count = self.count()?;
        if count == 0 || top_k == 0 {
            debug!("Vector store is empty or top_k is zero; nothing to search");
            return Ok(Vec::new());
        }

        let query_vector = self.embed(query)?;

        let entries = self
            .store
            .raw_entries()?
            .par_iter()
            .map(|(_, value)| bincode::deserialize::<IndexEntry>(value).map_err(RetrievalError::from))
            .collect::<Result<Vec<_>>>()?;

        let results = rank_entries(&query_vector, entries, top_k.min(count))?;
        debug!("Found {} relevant documents", results.len());
        Ok(results)
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_scored(query, top_k)?
            .into_iter()
            .map(|result| result.content)
            .collect())
    }

    pub fn clear(&mut self) -> Result<()> {
        info!("Clearing vector store...");
        self.store.clear()?;
        info!("Vector store cleared");
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }
}
