//! Offline providers for tests and local runs without an API key.

use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

use digest_core::traits::{Embedder, Generator};
use digest_core::types::{PromptMessage, Role};
use digest_core::Result;

pub const FAKE_EMBEDDING_DIM: usize = 1024;

/// Hashed bag-of-words embedder. Each lowercased alphanumeric token adds
/// weight to one bucket; the result is L2-normalised so texts sharing tokens
/// score a positive cosine and disjoint texts score zero.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxhash:d{}", dim) }
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self { Self::new(FAKE_EMBEDDING_DIM) }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Echoes the head of the final user message.
pub struct FakeGenerator;

#[async_trait]
impl Generator for FakeGenerator {
    fn model_id(&self) -> &str { "fake:echo" }

    async fn generate(&self, messages: &[PromptMessage]) -> Result<String> {
        let user = messages.iter().rev().find(|m| m.role == Role::User).map(|m| m.content.as_str()).unwrap_or("");
        let head: String = user.chars().take(200).collect();
        Ok(format!("[fake answer] {}", head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn shared_tokens_score_higher() {
        let e = FakeEmbedder::default();
        let q = e.embed_text("vulnerability");
        let cyber = e.embed_text("A new vulnerability was disclosed.");
        let ai = e.embed_text("AI models advance rapidly.");
        assert!(cosine(&q, &cyber) > cosine(&q, &ai));
    }

    #[test]
    fn tokens_are_case_insensitive() {
        let e = FakeEmbedder::new(64);
        assert_eq!(e.embed_text("Ransomware WAVE"), e.embed_text("ransomware, wave!"));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = FakeEmbedder::new(16);
        assert!(e.embed_text("  ... ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn dimension_is_at_least_one() {
        let e = FakeEmbedder::new(0);
        assert_eq!(e.dim(), 1);
        assert_eq!(e.embedder_id(), "fake:xxhash:d1");
        assert_eq!(e.embed_text("anything").len(), 1);
    }

    #[tokio::test]
    async fn generator_echoes_user_message() {
        let out = FakeGenerator
            .generate(&[PromptMessage::system("rules"), PromptMessage::user("what happened?")])
            .await
            .unwrap();
        assert_eq!(out, "[fake answer] what happened?");
    }
}
