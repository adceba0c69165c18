use std::sync::Arc;
use tokio::sync::Mutex;

use digest_core::traits::Embedder;
use digest_core::Result;

use crate::builder::IndexBuilder;
use crate::index::VectorIndex;

/// Process-wide access to the index, built lazily on first use.
///
/// Concurrent first calls wait on one build instead of racing. A failed build
/// is not cached, so the next call retries; a failed rebuild keeps the index
/// that was already loaded.
pub struct IndexHandle {
    builder: IndexBuilder,
    cached: Mutex<Option<Arc<VectorIndex>>>,
}

impl IndexHandle {
    pub fn new(builder: IndexBuilder) -> Self {
        Self { builder, cached: Mutex::new(None) }
    }

    pub async fn get(&self) -> Result<Arc<VectorIndex>> {
        let mut cached = self.cached.lock().await;
        if let Some(index) = cached.as_ref() {
            return Ok(index.clone());
        }
        let index = self.builder.load_or_build(false).await?;
        *cached = Some(index.clone());
        Ok(index)
    }

    /// Rebuild from the archive and swap the new index in.
    pub async fn rebuild(&self) -> Result<Arc<VectorIndex>> {
        let mut cached = self.cached.lock().await;
        let index = self.builder.load_or_build(true).await?;
        *cached = Some(index.clone());
        tracing::info!(chunks = index.len(), "index rebuilt");
        Ok(index)
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.builder.embedder()
    }

    pub fn builder(&self) -> &IndexBuilder {
        &self.builder
    }
}
