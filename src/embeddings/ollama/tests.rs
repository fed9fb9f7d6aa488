use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

fn config_for(server: &MockServer, vector_size: u32, batch_size: u32) -> EmbeddingConfig {
    let address = server.address();
    EmbeddingConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: "test-model".to_string(),
        vector_size,
        batch_size,
        ..EmbeddingConfig::default()
    }
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        retry_attempts: 3,
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("should create client");

    assert_eq!(client.model(), "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, 3);
    assert_eq!(client.dimension(), 1024);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&EmbeddingConfig::default())
        .expect("should create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(0);

    assert_eq!(client.retry_attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_posts_model_and_inputs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(serde_json::json!({
            "model": "test-model",
            "input": ["revenue grew", "headcount"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "test-model",
            "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3, 16)).expect("should create client");
    let vectors = tokio::task::spawn_blocking(move || {
        client.embed_batch(&["revenue grew".to_string(), "headcount".to_string()])
    })
    .await
    .expect("blocking task should finish")
    .expect("should embed");

    assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn batches_are_split_by_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(serde_json::json!({
            "model": "test-model",
            "input": ["a", "b"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(serde_json::json!({
            "model": "test-model",
            "input": ["c"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[0.5, 0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 2, 2)).expect("should create client");
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = tokio::task::spawn_blocking(move || client.generate_embeddings_batch(&texts))
        .await
        .expect("blocking task should finish")
        .expect("should embed");

    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[2], vec![0.5, 0.5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_an_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[0.1, 0.2]]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3, 16)).expect("should create client");
    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("blocking task should finish");

    assert!(matches!(result, Err(RetrieverError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3, 16))
        .expect("should create client")
        .with_retry_attempts(3);
    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("blocking task should finish");

    let err = result.expect_err("should fail on 404");
    assert!(err.to_string().contains("HTTP 404"));
    assert!(matches!(err, RetrieverError::Embedding(_)));
}

#[test]
fn unreachable_server_is_a_connection_error() {
    // Nothing listens on port 1
    let config = EmbeddingConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        vector_size: 3,
        retry_attempts: 1,
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("should create client");

    let err = client.embed("hello").expect_err("should fail to connect");

    assert!(
        matches!(err, RetrieverError::Connection(_)),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn validate_model_accepts_latest_tag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                {"name": "test-model:latest", "size": 1000, "digest": "abc"},
                {"name": "other:7b"}
            ]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3, 16)).expect("should create client");
    let (valid, models) = tokio::task::spawn_blocking(move || {
        (client.validate_model(), client.list_models())
    })
    .await
    .expect("blocking task should finish");

    assert!(valid.is_ok());
    let models = models.expect("should list models");
    assert_eq!(models.len(), 2);
    assert_eq!(models[1].size, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn validate_model_rejects_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "nomic-embed-text:latest"}]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3, 16)).expect("should create client");
    let result = tokio::task::spawn_blocking(move || client.validate_model())
        .await
        .expect("blocking task should finish");

    let err = result.expect_err("model should be missing");
    assert!(err.to_string().contains("test-model"));
}
