//! The answering entry point used by every front end.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use digest_core::archive::FsArchive;
use digest_core::config::{RagSettings, Settings};
use digest_core::traits::Generator;
use digest_core::{Error, Result};
use digest_llm::{get_default_embedder, get_default_generator};
use digest_vector::{IndexBuilder, IndexHandle, IndexStore, VectorIndex};

use crate::composer::AnswerComposer;
use crate::retriever::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    InsufficientEvidence,
    ProviderUnavailable,
}

/// One cited excerpt. `index` matches the `[n]` tag the model saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub index: usize,
    pub date: String,
    pub source_path: String,
    pub snippet: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResponse {
    pub question: String,
    pub answer: String,
    pub status: AnswerStatus,
    pub sources: Vec<Source>,
}

pub const PROVIDER_UNAVAILABLE: &str =
    "The answering service could not reach the language model provider right now. Please try again later.";

pub struct QaService {
    handle: Arc<IndexHandle>,
    retriever: Retriever,
    composer: AnswerComposer,
    top_k: usize,
    snippet_chars: usize,
}

impl QaService {
    pub fn new(handle: Arc<IndexHandle>, generator: Arc<dyn Generator>, rag: &RagSettings) -> Self {
        Self {
            retriever: Retriever::new(handle.clone()).with_min_score(rag.min_score),
            composer: AnswerComposer::new(generator, rag.max_context_chars),
            handle,
            top_k: rag.top_k,
            snippet_chars: rag.snippet_chars,
        }
    }

    /// Wire the filesystem archive, configured providers and LanceDB store.
    pub fn from_settings(settings: &Settings, show_progress: bool) -> Result<Self> {
        let handle = Arc::new(index_handle_from_settings(settings, show_progress)?);
        let generator = get_default_generator(&settings.providers)?;
        Ok(Self::new(handle, generator, &settings.rag))
    }

    pub fn handle(&self) -> &Arc<IndexHandle> {
        &self.handle
    }

    /// Answer from the archive.
    ///
    /// Empty questions, an empty archive and storage failures are errors;
    /// a failing embedding or generation provider yields a
    /// `ProviderUnavailable` response instead.
    pub async fn answer_question(&self, question: &str) -> Result<QaResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }
        match self.answer_inner(question).await {
            Err(e) if e.is_provider() => {
                tracing::warn!(error = %e, "provider failed while answering");
                Ok(QaResponse {
                    question: question.to_string(),
                    answer: PROVIDER_UNAVAILABLE.to_string(),
                    status: AnswerStatus::ProviderUnavailable,
                    sources: vec![],
                })
            }
            other => other,
        }
    }

    async fn answer_inner(&self, question: &str) -> Result<QaResponse> {
        let hits = self.retriever.retrieve(question, self.top_k).await?;
        let answer = self.composer.answer(question, hits).await?;
        let status = if answer.cited_chunks.is_empty() { AnswerStatus::InsufficientEvidence } else { AnswerStatus::Answered };
        let sources = answer
            .cited_chunks
            .iter()
            .enumerate()
            .map(|(i, hit)| Source {
                index: i + 1,
                date: hit.chunk.date.clone(),
                source_path: hit.chunk.source_path.clone(),
                snippet: hit.chunk.text.chars().take(self.snippet_chars).collect(),
                score: hit.score,
            })
            .collect::<Vec<_>>();
        tracing::info!(?status, sources = sources.len(), "answered question");
        Ok(QaResponse { question: question.to_string(), answer: answer.text, status, sources })
    }

    pub async fn rebuild_index(&self) -> Result<Arc<VectorIndex>> {
        self.handle.rebuild().await
    }
}

pub fn index_handle_from_settings(settings: &Settings, show_progress: bool) -> Result<IndexHandle> {
    settings.validate()?;
    let archive = Arc::new(FsArchive::new(settings.data.digests_path()));
    let embedder = get_default_embedder(&settings.providers)?;
    let store = IndexStore::new(settings.data.rag_store_path());
    let builder = IndexBuilder::new(archive, embedder, store, settings.rag.chunking()?)
        .with_batch_size(settings.rag.embed_batch_size)
        .with_progress(show_progress);
    Ok(IndexHandle::new(builder))
}
