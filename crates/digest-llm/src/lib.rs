pub mod fake;
pub mod gemini;

use std::sync::Arc;

use digest_core::config::ProviderSettings;
use digest_core::traits::{Embedder, Generator};
use digest_core::Result;

pub use fake::{FakeEmbedder, FakeGenerator, FAKE_EMBEDDING_DIM};
pub use gemini::{GeminiClient, GeminiEmbedder, GeminiGenerator};

/// `APP_USE_FAKE_EMBEDDINGS=1` swaps both providers for offline fakes.
pub fn use_fake_providers() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn get_default_embedder(settings: &ProviderSettings) -> Result<Arc<dyn Embedder>> {
    if use_fake_providers() {
        let embedder = FakeEmbedder::new(FAKE_EMBEDDING_DIM);
        tracing::info!(dim = embedder.dim(), "using fake embedder");
        return Ok(Arc::new(embedder));
    }
    let client = Arc::new(GeminiClient::from_settings(settings)?);
    tracing::info!(model = %settings.embedding_model, "using gemini embedder");
    Ok(Arc::new(GeminiEmbedder::new(client, settings.embedding_model.clone())))
}

pub fn get_default_generator(settings: &ProviderSettings) -> Result<Arc<dyn Generator>> {
    if use_fake_providers() {
        tracing::info!("using fake generator");
        return Ok(Arc::new(FakeGenerator));
    }
    let client = Arc::new(GeminiClient::from_settings(settings)?);
    tracing::info!(model = %settings.chat_model, temperature = settings.temperature, "using gemini generator");
    Ok(Arc::new(GeminiGenerator::new(client, settings.chat_model.clone(), settings.temperature)))
}
