//! Archive -> chunks -> embeddings -> persisted index.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use digest_core::chunker::{split_documents_with, ChunkingConfig};
use digest_core::loader::load_documents;
use digest_core::traits::{ArchiveStore, Embedder};
use digest_core::types::IndexedChunk;
use digest_core::{Error, Result};

use crate::index::{IndexFingerprint, VectorIndex};
use crate::store::IndexStore;

pub const DEFAULT_EMBED_BATCH: usize = 64;

pub struct IndexBuilder {
    archive: Arc<dyn ArchiveStore>,
    embedder: Arc<dyn Embedder>,
    store: IndexStore,
    chunking: ChunkingConfig,
    batch_size: usize,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(archive: Arc<dyn ArchiveStore>, embedder: Arc<dyn Embedder>, store: IndexStore, chunking: ChunkingConfig) -> Self {
        Self { archive, embedder, store, chunking, batch_size: DEFAULT_EMBED_BATCH, show_progress: false }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Draw a terminal progress bar while embedding. Off by default.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn fingerprint(&self) -> IndexFingerprint {
        IndexFingerprint::new(self.embedder.embedder_id(), self.chunking)
    }

    /// Reuse the persisted index when its fingerprint matches, otherwise
    /// build from the archive and persist. `force` always rebuilds.
    pub async fn load_or_build(&self, force: bool) -> Result<Arc<VectorIndex>> {
        if !force {
            match self.store.load().await {
                Ok(Some(index)) if index.fingerprint() == &self.fingerprint() => {
                    tracing::info!(chunks = index.len(), "reusing persisted index");
                    return Ok(Arc::new(index));
                }
                Ok(Some(index)) => {
                    tracing::info!(
                        persisted = ?index.fingerprint(),
                        current = ?self.fingerprint(),
                        "persisted index was built with different settings, rebuilding"
                    );
                }
                Ok(None) => tracing::info!(store = %self.store.root().display(), "no persisted index, building"),
                Err(e) => tracing::warn!(error = %e, "persisted index unreadable, rebuilding"),
            }
        }
        let index = self.build().await?;
        self.store.persist(&index).await?;
        Ok(Arc::new(index))
    }

    /// Build in memory without touching the store.
    pub async fn build(&self) -> Result<VectorIndex> {
        let docs = load_documents(self.archive.as_ref()).await?;
        if docs.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let chunks = split_documents_with(&docs, self.chunking);
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        tracing::info!(documents = docs.len(), chunks = chunks.len(), embedder = self.embedder.embedder_id(), "building index");

        let pb = if self.show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut indexed = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::provider(
                    self.embedder.embedder_id(),
                    format!("returned {} vectors for {} texts", vectors.len(), batch.len()),
                ));
            }
            indexed.extend(batch.iter().cloned().zip(vectors).map(|(chunk, vector)| IndexedChunk { chunk, vector }));
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");

        VectorIndex::build(indexed, self.fingerprint())
    }
}
