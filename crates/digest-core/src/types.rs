//! Domain types shared by the loader, chunker, index and answering layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An archived digest record as listed by an [`ArchiveStore`](crate::traits::ArchiveStore).
///
/// - `date`: calendar date the digest was published for (`YYYY-MM-DD`)
/// - `path`: location of the markup inside the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestFile {
    pub date: String,
    pub path: PathBuf,
}

impl DigestFile {
    pub fn source_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// One archived digest converted to plain text. Created at index-build time
/// and dropped once chunked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestDocument {
    pub text: String,
    pub date: String,
    pub source_path: String,
}

/// A window of a [`DigestDocument`]. `date` and `source_path` are always the
/// parent document's; `chunk_index` is the position within that document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub date: String,
    pub source_path: String,
    pub chunk_index: usize,
}

/// A chunk together with its embedding vector, the unit stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned by retrieval. `score` is cosine similarity, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Model output for one question plus the chunks that were placed in its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub cited_chunks: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}
