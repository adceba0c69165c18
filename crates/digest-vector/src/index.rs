//! In-memory vector index with exact cosine search.
//!
//! The archive is small (one digest per day), so a brute-force scan over every
//! chunk is both exact and fast enough; no ANN structure is kept.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use digest_core::chunker::ChunkingConfig;
use digest_core::types::{IndexedChunk, RetrievedChunk};
use digest_core::{Error, Result};

/// Settings an index was built with. A persisted index is reused only when its
/// fingerprint equals the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFingerprint {
    pub embedder_id: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl IndexFingerprint {
    pub fn new(embedder_id: impl Into<String>, chunking: ChunkingConfig) -> Self {
        Self { embedder_id: embedder_id.into(), chunk_size: chunking.chunk_size(), chunk_overlap: chunking.overlap() }
    }
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<IndexedChunk>,
    dim: usize,
    fingerprint: IndexFingerprint,
}

impl VectorIndex {
    /// Fails with `EmptyCorpus` for no chunks and `DimensionMismatch` when
    /// vectors disagree on length.
    pub fn build(chunks: Vec<IndexedChunk>, fingerprint: IndexFingerprint) -> Result<Self> {
        let first = chunks.first().ok_or(Error::EmptyCorpus)?;
        let dim = first.vector.len();
        if dim == 0 {
            return Err(Error::provider(&fingerprint.embedder_id, "embedder returned empty vectors"));
        }
        if let Some(bad) = chunks.iter().find(|c| c.vector.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.vector.len() });
        }
        Ok(Self { chunks, dim, fingerprint })
    }

    /// Top `k` chunks by cosine similarity, best first. Ties keep build order.
    /// Returns every chunk when the index holds fewer than `k`.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if k == 0 {
            return Ok(vec![]);
        }
        let mut scored: Vec<(usize, f32)> =
            self.chunks.iter().enumerate().map(|(i, c)| (i, cosine_similarity(query, &c.vector))).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievedChunk { chunk: self.chunks[i].chunk.clone(), score })
            .collect())
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn dim(&self) -> usize { self.dim }

    pub fn fingerprint(&self) -> &IndexFingerprint { &self.fingerprint }

    pub fn chunks(&self) -> &[IndexedChunk] { &self.chunks }

    /// Number of distinct source digests represented.
    pub fn document_count(&self) -> usize {
        self.chunks.iter().map(|c| c.chunk.source_path.as_str()).collect::<HashSet<_>>().len()
    }
}

/// Zero when either side has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_core::types::Chunk;

    fn fp() -> IndexFingerprint {
        IndexFingerprint { embedder_id: "test".into(), chunk_size: 800, chunk_overlap: 150 }
    }

    fn indexed(date: &str, idx: usize, vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk: Chunk { text: format!("{date}/{idx}"), date: date.into(), source_path: format!("{date}.html"), chunk_index: idx },
            vector,
        }
    }

    #[test]
    fn empty_build_is_empty_corpus() {
        assert!(matches!(VectorIndex::build(vec![], fp()), Err(Error::EmptyCorpus)));
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let chunks = vec![indexed("2025-01-01", 0, vec![1.0, 0.0]), indexed("2025-01-02", 0, vec![1.0, 0.0, 0.0])];
        assert!(matches!(VectorIndex::build(chunks, fp()), Err(Error::DimensionMismatch { expected: 2, actual: 3 })));
    }

    #[test]
    fn query_orders_by_similarity() {
        let index = VectorIndex::build(
            vec![
                indexed("2025-01-01", 0, vec![1.0, 0.0]),
                indexed("2025-01-02", 0, vec![0.0, 1.0]),
                indexed("2025-01-03", 0, vec![0.7, 0.7]),
            ],
            fp(),
        )
        .unwrap();
        let hits = index.query(&[0.0, 1.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.date, "2025-01-02");
        assert_eq!(hits[1].chunk.date, "2025-01-03");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn fewer_chunks_than_k_returns_all() {
        let index = VectorIndex::build(vec![indexed("a", 0, vec![1.0, 0.0]), indexed("b", 0, vec![0.5, 0.5])], fp()).unwrap();
        let hits = index.query(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(index.query(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_build_order() {
        let index = VectorIndex::build(
            vec![indexed("a", 0, vec![1.0, 0.0]), indexed("b", 0, vec![1.0, 0.0]), indexed("c", 0, vec![1.0, 0.0])],
            fp(),
        )
        .unwrap();
        let dates: Vec<_> = index.query(&[1.0, 0.0], 3).unwrap().into_iter().map(|h| h.chunk.date).collect();
        assert_eq!(dates, vec!["a", "b", "c"]);
    }

    #[test]
    fn query_dimension_must_match() {
        let index = VectorIndex::build(vec![indexed("a", 0, vec![1.0, 0.0])], fp()).unwrap();
        assert!(matches!(index.query(&[1.0], 1), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn zero_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn counts_distinct_documents() {
        let index = VectorIndex::build(
            vec![indexed("a", 0, vec![1.0]), indexed("a", 1, vec![1.0]), indexed("b", 0, vec![1.0])],
            fp(),
        )
        .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.document_count(), 2);
    }
}
