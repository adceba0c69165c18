use std::sync::Arc;

use digest_core::types::RetrievedChunk;
use digest_core::{Error, Result};
use digest_vector::IndexHandle;

/// Embeds a question with the index's own embedder and returns the nearest chunks.
pub struct Retriever {
    handle: Arc<IndexHandle>,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(handle: Arc<IndexHandle>) -> Self {
        Self { handle, min_score: None }
    }

    /// Drop chunks scoring below `min_score`. Unset keeps plain top-K.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }
        let index = self.handle.get().await?;
        if index.is_empty() {
            return Ok(vec![]);
        }
        let query = self.handle.embedder().embed(question).await?;
        let mut hits = index.query(&query, k)?;
        if let Some(min) = self.min_score {
            let before = hits.len();
            hits.retain(|h| h.score >= min);
            if hits.len() < before {
                tracing::debug!(dropped = before - hits.len(), min_score = min, "dropped low-similarity chunks");
            }
        }
        tracing::debug!(k, hits = hits.len(), top_score = ?hits.first().map(|h| h.score), "retrieved chunks");
        Ok(hits)
    }
}
