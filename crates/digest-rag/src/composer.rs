//! Grounded answer composition.
//!
//! Retrieved chunks are packed best-first into a context block of at most
//! `max_context_chars` characters; whatever does not fit is dropped from the
//! tail, so the lowest-similarity chunks go first. A top chunk that alone
//! exceeds the budget is cut to fit rather than dropped, unless not even its
//! tag fits.

use std::sync::Arc;

use digest_core::traits::Generator;
use digest_core::types::{Answer, PromptMessage, RetrievedChunk};
use digest_core::Result;

pub const INSUFFICIENT_EVIDENCE: &str =
    "The digest archive does not contain enough relevant information to answer this question.";

const SYSTEM_PROMPT: &str = "You are an analyst of AI and cybersecurity news.\n\
You are given context made of excerpts from daily news digests, each tagged [n] with its date.\n\
Answer using only that context. If the context is not sufficient, say so plainly instead of guessing.\n\
Cite the excerpts you rely on by their [n] tags. Reply in the language of the question; \
keep it easy to read, with short paragraphs and bullets where useful.";

pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
    max_context_chars: usize,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn Generator>, max_context_chars: usize) -> Self {
        Self { generator, max_context_chars: max_context_chars.max(1) }
    }

    /// Empty `chunks` short-circuits to [`INSUFFICIENT_EVIDENCE`] without a model call.
    pub async fn answer(&self, question: &str, chunks: Vec<RetrievedChunk>) -> Result<Answer> {
        if chunks.is_empty() {
            tracing::info!("no chunks retrieved, answering with insufficient evidence");
            return Ok(Answer { text: INSUFFICIENT_EVIDENCE.to_string(), cited_chunks: vec![] });
        }
        let (context, cited_chunks) = build_context(chunks, self.max_context_chars);
        if cited_chunks.is_empty() {
            tracing::warn!(max_context_chars = self.max_context_chars, "context budget too small for any excerpt");
            return Ok(Answer { text: INSUFFICIENT_EVIDENCE.to_string(), cited_chunks });
        }
        let messages = build_prompt(question, &context);
        tracing::debug!(model = self.generator.model_id(), chunks = cited_chunks.len(), context_chars = context.chars().count(), "invoking generator");
        let text = self.generator.generate(&messages).await?;
        Ok(Answer { text, cited_chunks })
    }
}

fn entry_header(n: usize, date: &str) -> String {
    format!("[{}] ({}) ", n, date)
}

/// Context block and the chunks that made it in, in rank order.
pub fn build_context(chunks: Vec<RetrievedChunk>, max_chars: usize) -> (String, Vec<RetrievedChunk>) {
    let mut context = String::new();
    let mut used_chars = 0usize;
    let mut cited = Vec::new();
    for (i, hit) in chunks.into_iter().enumerate() {
        let header = entry_header(i + 1, &hit.chunk.date);
        let sep = if i == 0 { "" } else { "\n\n" };
        let entry_chars = sep.chars().count() + header.chars().count() + hit.chunk.text.chars().count();
        if used_chars + entry_chars <= max_chars {
            context.push_str(sep);
            context.push_str(&header);
            context.push_str(&hit.chunk.text);
            used_chars += entry_chars;
            cited.push(hit);
            continue;
        }
        let room = max_chars.saturating_sub(header.chars().count());
        if i == 0 && room > 0 {
            context.push_str(&header);
            context.extend(hit.chunk.text.chars().take(room));
            tracing::debug!(max_chars, "top chunk truncated to fit the context budget");
            cited.push(hit);
        }
        break;
    }
    (context, cited)
}

pub fn build_prompt(question: &str, context: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(SYSTEM_PROMPT),
        PromptMessage::user(format!("Question:\n{}\n\nContext from past digests:\n{}", question.trim(), context)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_core::types::Chunk;

    fn hit(date: &str, text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk { text: text.into(), date: date.into(), source_path: format!("{date}.html"), chunk_index: 0 },
            score,
        }
    }

    #[test]
    fn context_tags_each_chunk_with_rank_and_date() {
        let (ctx, cited) = build_context(vec![hit("2025-01-02", "CVE", 0.9), hit("2025-01-01", "LLM", 0.5)], 1000);
        assert_eq!(ctx, "[1] (2025-01-02) CVE\n\n[2] (2025-01-01) LLM");
        assert_eq!(cited.len(), 2);
    }

    #[test]
    fn lowest_ranked_chunks_are_dropped_first() {
        let chunks = vec![hit("2025-01-03", &"a".repeat(40), 0.9), hit("2025-01-02", &"b".repeat(40), 0.8), hit("2025-01-01", &"c".repeat(40), 0.7)];
        // one entry is 17 header + 40 text = 57 chars; two need 57 + 2 + 57 = 116
        let (ctx, cited) = build_context(chunks, 120);
        assert_eq!(cited.iter().map(|c| c.chunk.date.as_str()).collect::<Vec<_>>(), vec!["2025-01-03", "2025-01-02"]);
        assert!(ctx.chars().count() <= 120);
        assert!(!ctx.contains('c'));
    }

    #[test]
    fn oversized_top_chunk_is_truncated() {
        let (ctx, cited) = build_context(vec![hit("2025-01-01", &"x".repeat(500), 0.9), hit("2025-01-02", "y", 0.1)], 100);
        assert_eq!(ctx.chars().count(), 100);
        assert!(ctx.starts_with("[1] (2025-01-01) xxx"));
        assert_eq!(cited.len(), 1);
    }

    #[test]
    fn budget_below_the_tag_cites_nothing() {
        let (ctx, cited) = build_context(vec![hit("2025-01-01", "text", 0.9)], 17);
        assert!(ctx.is_empty());
        assert!(cited.is_empty());
    }

    struct CountingGenerator(std::sync::atomic::AtomicUsize);

    #[async_trait::async_trait]
    impl Generator for CountingGenerator {
        fn model_id(&self) -> &str { "counting" }

        async fn generate(&self, _messages: &[PromptMessage]) -> Result<String> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok("answer".to_string())
        }
    }

    #[tokio::test]
    async fn tiny_budget_answers_insufficient_without_model_call() {
        let generator = Arc::new(CountingGenerator(std::sync::atomic::AtomicUsize::new(0)));
        let composer = AnswerComposer::new(generator.clone(), 10);
        let answer = composer.answer("q", vec![hit("2025-01-01", "text", 0.9)]).await.unwrap();
        assert_eq!(answer.text, INSUFFICIENT_EVIDENCE);
        assert!(answer.cited_chunks.is_empty());
        assert_eq!(generator.0.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn prompt_constrains_to_context() {
        let messages = build_prompt("  what happened?  ", "[1] (2025-01-01) text");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("only that context"));
        assert!(messages[1].content.starts_with("Question:\nwhat happened?"));
        assert!(messages[1].content.ends_with("[1] (2025-01-01) text"));
    }
}
