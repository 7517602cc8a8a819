use rayon::prelude::*;
use serde::Serialize;
use crate::config::Number;
use crate::error::{Result, RetrievalError};
use crate::vector_entry::{IndexEntry, Metadata};
use crate::vector_ops::compute_cosine_similarity_simd;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub similarity: Number,
    pub id: String,
    #[serde(skip)]
    pub seq: u64,
    pub content: String,
    pub metadata: Metadata,
}

/// Scores every entry against `query_vector` and keeps the best `limit`.
///
/// A stored vector whose length differs from the query is a
/// `DimensionMismatch`; the index was written with another embedder.
pub fn rank_entries(
    query_vector: &[Number],
    entries: Vec<IndexEntry>,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let results = entries
        .into_par_iter()
        .map(|entry| {
            let similarity = compute_cosine_similarity_simd(query_vector, &entry.vector).ok_or(
                RetrievalError::DimensionMismatch {
                    expected: query_vector.len(),
                    actual: entry.vector.len(),
                },
            )?;
            Ok(SearchResult {
                similarity,
                id: entry.id,
                seq: entry.seq,
                content: entry.content,
                metadata: entry.metadata,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(sort_and_limit_results(results, limit))
}

/// Best match first; equal scores keep insertion order.
///
/// Uses the IEEE total order, so a NaN score cannot break the sort.
pub fn sort_and_limit_results(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.seq.cmp(&b.seq))
    });
    results.truncate(limit);
    results
}
