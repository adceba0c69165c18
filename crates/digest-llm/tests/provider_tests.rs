use digest_core::config::ProviderSettings;
use digest_core::types::PromptMessage;
use digest_llm::{get_default_embedder, get_default_generator};

#[tokio::test]
async fn fake_providers_shapes_and_determinism() {
    // Force fake providers so no network or API key is needed
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let settings = ProviderSettings::default();
    let embedder = get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.embedder_id(), "fake:xxhash:d1024");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    assert_eq!(embs.len(), 2);
    let v1 = &embs[0];
    let v2 = &embs[1];
    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }

    let single = embedder.embed("hello world").await.expect("embed");
    assert_eq!(&single, v1);

    let generator = get_default_generator(&settings).expect("generator");
    let out = generator.generate(&[PromptMessage::user("ping")]).await.expect("generate");
    assert!(out.ends_with("ping"));
}
