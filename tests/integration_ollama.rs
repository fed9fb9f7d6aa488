#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use pdf_retriever::config::EmbeddingConfig;
use pdf_retriever::database::MemoryStore;
use pdf_retriever::embeddings::{Embedder, OllamaClient};
use pdf_retriever::{DistanceMetric, PageRecord, QueryOptions, Retriever, RetrieverSettings};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const TEST_MODEL: &str = "bge-m3:latest";
const TEST_DIMENSION: u32 = 1024;

fn create_integration_test_config() -> EmbeddingConfig {
    let mut config = EmbeddingConfig::default();
    if let Ok(host) = env::var("OLLAMA_HOST") {
        config.host = host;
    }
    if let Some(port) = env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    config.model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());
    config.vector_size = env::var("OLLAMA_DIMENSION")
        .ok()
        .and_then(|d| d.parse().ok())
        .unwrap_or(TEST_DIMENSION);
    config.batch_size = 2;
    config
}

fn create_integration_test_client() -> OllamaClient {
    OllamaClient::new(&create_integration_test_config())
        .expect("should create Ollama client")
        .with_timeout(Duration::from_secs(120))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_embeddings_have_configured_dimension() {
    init_test_tracing();

    let client = create_integration_test_client();
    let texts = vec![
        "Revenue was $5M in 2023".to_string(),
        "Headcount grew to 40 engineers".to_string(),
        "Office lease renewed in Berlin".to_string(),
    ];

    let vectors = client.embed_batch(&texts).expect("should embed");

    info!("Generated {} embeddings", vectors.len());
    assert_eq!(vectors.len(), 3);
    assert!(vectors.iter().all(|v| v.len() == client.dimension()));

    let again = client.embed(&texts[0]).expect("should embed");
    let drift: f32 = again
        .iter()
        .zip(&vectors[0])
        .map(|(a, b)| (a - b).abs())
        .sum();
    assert!(drift < 1e-3, "embeddings should be deterministic");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_revenue_question() {
    init_test_tracing();

    let config = create_integration_test_config();
    let retriever = Retriever::new(
        Arc::new(create_integration_test_client()),
        Arc::new(MemoryStore::new()),
        RetrieverSettings {
            collection: "ollama_test".to_string(),
            vector_size: config.vector_size as usize,
            metrics: vec![DistanceMetric::Cosine],
            embed_tables: false,
        },
    );

    retriever
        .store(
            &[
                PageRecord::new(1, "Revenue was $5M in 2023", ""),
                PageRecord::new(2, "The cafeteria menu changes every Tuesday", ""),
            ],
            "acme",
        )
        .await
        .expect("should store");

    let results = retriever
        .query(
            "What was acme's revenue?",
            "acme",
            &QueryOptions::default()
                .with_top_k(1)
                .with_score_threshold(0.3),
        )
        .await
        .expect("should query");

    assert_eq!(results, vec!["Revenue was $5M in 2023".to_string()]);
}
