use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{DigestFile, PromptMessage};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must return vectors of one dimensionality per
/// `embedder_id`; the id is recorded with a persisted index so a model change
/// forces a rebuild.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `gemini:text-embedding-004`).
    fn embedder_id(&self) -> &str;

    /// Compute embeddings for a batch of input texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = vec![text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors.pop().ok_or_else(|| Error::provider(self.embedder_id(), "no embedding returned"))
    }
}

/// Stateless single-turn generative model call.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String>;
}

/// Read side of the digest archive consumed by the document loader.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Archived digests, newest first.
    async fn list_digest_files(&self) -> Result<Vec<DigestFile>>;
    async fn read_digest_content(&self, file: &DigestFile) -> Result<String>;
}
