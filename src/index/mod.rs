// Vector index module
// Owns the persisted embedding index and nearest-neighbor queries

pub mod store;

pub use store::{IndexStore, RebuildStats};

use serde::{Deserialize, Serialize};

/// A unit of source text plus provenance metadata; immutable once indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// The chunk text
    pub content: String,
    /// Origin of the chunk (source file path)
    pub source: String,
    /// Byte offset of the chunk content within its source document
    pub offset: usize,
    /// Index of this chunk within the source document (for ordering)
    pub chunk_index: u32,
}

/// A chunk returned from a nearest-neighbor query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query vector (higher is better)
    pub score: f32,
}
