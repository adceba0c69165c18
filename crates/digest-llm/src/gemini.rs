//! Google Generative Language REST client: batch embeddings and single-turn
//! generation. Every failure (transport, timeout, non-2xx, malformed body)
//! surfaces as `Error::Provider`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use digest_core::config::ProviderSettings;
use digest_core::traits::{Embedder, Generator};
use digest_core::types::{PromptMessage, Role};
use digest_core::{Error, Result};

/// The batch endpoint rejects more than this many requests per call.
pub const MAX_EMBED_BATCH: usize = 100;

const PROVIDER: &str = "gemini";

pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::provider(PROVIDER, format!("failed to build http client: {}", e)))?;
        Ok(Self { http, api_base: api_base.into().trim_end_matches('/').to_string(), api_key: api_key.into() })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let key = settings.resolve_api_key()?;
        Self::new(&settings.api_base, key, Duration::from_secs(settings.timeout_secs))
    }

    async fn post(&self, model: &str, method: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/models/{}:{}", self.api_base, model, method);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "request failed" };
                Error::provider(PROVIDER, format!("{} {}: {}", method, kind, e))
            })?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, method, model, "gemini returned an error status");
            return Err(Error::provider(PROVIDER, format!("{} status {}: {}", method, status, truncate(&body, 500))));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("{} returned invalid json: {}", method, e)))
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub struct GeminiEmbedder {
    client: Arc<GeminiClient>,
    model: String,
    id: String,
}

impl GeminiEmbedder {
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>) -> Self {
        let model = model.into();
        let id = format!("gemini:{}", model);
        Self { client, model, id }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_EMBED_BATCH) {
            let body = embed_request_body(&self.model, batch);
            let payload = self.client.post(&self.model, "batchEmbedContents", &body).await?;
            let vectors = parse_embeddings(&payload)?;
            if vectors.len() != batch.len() {
                return Err(Error::provider(
                    PROVIDER,
                    format!("asked for {} embeddings, got {}", batch.len(), vectors.len()),
                ));
            }
            out.extend(vectors);
        }
        tracing::debug!(model = %self.model, count = out.len(), "embedded texts");
        Ok(out)
    }
}

pub struct GeminiGenerator {
    client: Arc<GeminiClient>,
    model: String,
    temperature: f32,
}

impl GeminiGenerator {
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self { client, model: model.into(), temperature }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_id(&self) -> &str { &self.model }

    async fn generate(&self, messages: &[PromptMessage]) -> Result<String> {
        let body = generate_request_body(messages, self.temperature);
        let payload = self.client.post(&self.model, "generateContent", &body).await?;
        let text = parse_generated_text(&payload)?;
        tracing::debug!(model = %self.model, chars = text.chars().count(), "generated answer");
        Ok(text)
    }
}

fn embed_request_body(model: &str, texts: &[String]) -> Value {
    let requests: Vec<Value> = texts
        .iter()
        .map(|t| json!({ "model": format!("models/{}", model), "content": { "parts": [{ "text": t }] } }))
        .collect();
    json!({ "requests": requests })
}

fn generate_request_body(messages: &[PromptMessage], temperature: f32) -> Value {
    let system: Vec<Value> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| json!({ "text": m.content }))
        .collect();
    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| json!({ "role": "user", "parts": [{ "text": m.content }] }))
        .collect();
    let mut body = json!({
        "contents": contents,
        "generationConfig": { "temperature": temperature },
    });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": system });
    }
    body
}

fn parse_embeddings(payload: &Value) -> Result<Vec<Vec<f32>>> {
    let rows = payload
        .get("embeddings")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::provider(PROVIDER, "missing embeddings array"))?;
    rows.iter()
        .map(|row| {
            row.get("values")
                .and_then(|v| v.as_array())
                .ok_or_else(|| Error::provider(PROVIDER, "embedding without values"))?
                .iter()
                .map(|x| x.as_f64().map(|f| f as f32).ok_or_else(|| Error::provider(PROVIDER, "non-numeric embedding value")))
                .collect::<Result<Vec<f32>>>()
        })
        .collect()
}

fn parse_generated_text(payload: &Value) -> Result<String> {
    let candidate = payload
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = payload
                .pointer("/promptFeedback/blockReason")
                .and_then(|v| v.as_str())
                .unwrap_or("no candidates");
            Error::provider(PROVIDER, format!("empty response: {}", reason))
        })?;
    let text: String = candidate
        .pointer("/content/parts")
        .and_then(|v| v.as_array())
        .map(|parts| parts.iter().filter_map(|p| p.get("text").and_then(|t| t.as_str())).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        let reason = candidate.get("finishReason").and_then(|v| v.as_str()).unwrap_or("unknown");
        return Err(Error::provider(PROVIDER, format!("response had no text (finishReason {})", reason)));
    }
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_body_names_the_model_per_request() {
        let body = embed_request_body("text-embedding-004", &["a".to_string(), "b".to_string()]);
        let reqs = body["requests"].as_array().unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1]["model"], "models/text-embedding-004");
        assert_eq!(reqs[1]["content"]["parts"][0]["text"], "b");
    }

    #[test]
    fn generate_body_splits_system_and_user() {
        let body = generate_request_body(&[PromptMessage::system("only use context"), PromptMessage::user("q?")], 0.4);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "only use context");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "q?");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn parses_embedding_values() {
        let payload = json!({ "embeddings": [ { "values": [0.5, -1.0] }, { "values": [0.0, 2.0] } ] });
        assert_eq!(parse_embeddings(&payload).unwrap(), vec![vec![0.5, -1.0], vec![0.0, 2.0]]);
        assert!(parse_embeddings(&json!({ "error": {} })).unwrap_err().is_provider());
    }

    #[test]
    fn joins_candidate_parts() {
        let payload = json!({ "candidates": [ { "content": { "parts": [ { "text": "Hello " }, { "text": "world\n" } ] } } ] });
        assert_eq!(parse_generated_text(&payload).unwrap(), "Hello world");
    }

    #[test]
    fn blocked_prompt_is_a_provider_error() {
        let payload = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_generated_text(&payload).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let payload = json!({ "candidates": [ { "finishReason": "MAX_TOKENS", "content": { "parts": [] } } ] });
        assert!(parse_generated_text(&payload).unwrap_err().to_string().contains("MAX_TOKENS"));
    }
}
