use super::testing::{KeywordEmbedder, UnreachableEmbedder};
use super::*;

#[test]
fn builds_configured_provider() {
    let config = EmbeddingConfig {
        dimension: 512,
        ..EmbeddingConfig::default()
    };
    let embedder = build_embedder(&config).expect("should build bedrock embedder");
    assert_eq!(embedder.dimension(), 512);

    let config = EmbeddingConfig {
        provider: EmbeddingProvider::Ollama,
        dimension: 768,
        cache_capacity: 0,
        ..EmbeddingConfig::default()
    };
    let embedder = build_embedder(&config).expect("should build ollama embedder");
    assert_eq!(embedder.dimension(), 768);
}

#[test]
fn dimension_check() {
    assert!(check_dimension(&[0.0; 4], 4).is_ok());
    let err = check_dimension(&[0.0; 3], 4).expect_err("length mismatch");
    assert_eq!(err.to_string(), "Embedding has 3 dimensions, expected 4");
}

#[test]
fn default_batch_embeds_in_order() {
    let embedder = KeywordEmbedder::new(16);
    let texts = vec!["alpha".to_string(), "beta".to_string()];

    let batch = embedder.embed_batch(&texts).expect("should embed batch");

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], embedder.embed("alpha").expect("should embed"));
    assert_eq!(batch[1], embedder.embed("beta").expect("should embed"));
}

#[tokio::test]
async fn embed_text_runs_on_blocking_pool() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(8));

    let vector = embed_text(&embedder, "hello world")
        .await
        .expect("should embed");

    assert_eq!(vector.len(), 8);
}

#[tokio::test]
async fn provider_failure_maps_to_embedding_error() {
    let embedder: Arc<dyn Embedder> = Arc::new(UnreachableEmbedder);

    let err = embed_texts(&embedder, vec!["hello".to_string()])
        .await
        .expect_err("unreachable provider should fail");

    assert!(matches!(err, FaqError::Embedding(ref msg) if msg.contains("connection refused")));
}
