//! Fixed-window character chunker.
//!
//! Windows are measured in Unicode scalar values, not bytes, so multi-byte
//! scripts get the same budget as ASCII. Consecutive windows of one document
//! share exactly `overlap` characters; the last window runs to the end of the
//! text and may be shorter than `chunk_size`.

use crate::error::{Error, Result};
use crate::types::{Chunk, DigestDocument};

/// Only constructible through [`ChunkingConfig::new`] or `Default`, so the
/// `overlap < chunk_size` invariant always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 800, overlap: 150 }
    }
}

impl ChunkingConfig {
    /// Fails fast when `overlap >= chunk_size` or `chunk_size == 0`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be at least 1".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn overlap(&self) -> usize { self.overlap }
}

/// Split every document into overlapping windows, preserving document order.
pub fn split_documents(docs: &[DigestDocument], chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig::new(chunk_size, overlap)?;
    Ok(split_documents_with(docs, config))
}

pub fn split_documents_with(docs: &[DigestDocument], config: ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in docs {
        for (chunk_index, text) in split_text(&doc.text, config).into_iter().enumerate() {
            chunks.push(Chunk {
                text,
                date: doc.date.clone(),
                source_path: doc.source_path.clone(),
                chunk_index,
            });
        }
    }
    tracing::debug!(documents = docs.len(), chunks = chunks.len(), chunk_size = config.chunk_size, overlap = config.overlap, "split documents");
    chunks
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut windows = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect::<String>());
        if end >= chars.len() { break; }
        start = end - config.overlap;
    }
    windows
}
