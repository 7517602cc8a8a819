use crate::chunker::Chunk;
use crate::config::Number;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct IndexEntry {
    pub id: String,
    /// Insertion sequence number; orders ties in search.
    pub seq: u64,
    pub vector: Vec<Number>,
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub file_path: String,
}

impl From<&Chunk> for Metadata {
    fn from(chunk: &Chunk) -> Self {
        Metadata {
            source: chunk.source_id.clone(),
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
            file_path: chunk.origin_path.clone(),
        }
    }
}

pub fn entry_id(seq: u64) -> String {
    format!("doc_{}", seq)
}
