//! In-memory vector index with brute-force cosine similarity search.
//! Built per request from a single document's chunks, then dropped.

use serde::Serialize;
use thiserror::Error;

use crate::documents::chunker::Chunk;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Got {vectors} embeddings for {chunks} chunks")]
    LengthMismatch { chunks: usize, vectors: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    dimensions: usize,
}

impl VectorIndex {
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        Ok(Self {
            entries: chunks.into_iter().zip(vectors).collect(),
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Up to `k` chunks, most similar first. Ties keep document order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if !self.entries.is_empty() && query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
