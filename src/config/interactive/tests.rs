use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[test]
fn metric_defaults_follow_enabled_set() {
    assert_eq!(
        metric_defaults(&[DistanceMetric::Manhattan, DistanceMetric::Cosine]),
        vec![true, false, true]
    );
    assert_eq!(metric_defaults(&[]), vec![false, false, false]);
}

#[test]
fn metric_list_formatting() {
    assert_eq!(
        metric_list(&DistanceMetric::ALL),
        "cosine, euclidean, manhattan"
    );
}

fn embedding_for(server: &MockServer) -> EmbeddingConfig {
    let address = server.address();
    EmbeddingConfig {
        host: address.ip().to_string(),
        port: address.port(),
        ..EmbeddingConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ollama_connection_succeeds_against_live_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"version":"0.5.0"}"#))
        .mount(&server)
        .await;

    let embedding = embedding_for(&server);
    let reachable = tokio::task::spawn_blocking(move || test_ollama_connection(&embedding))
        .await
        .expect("blocking task should finish");
    assert!(reachable);
}

#[tokio::test(flavor = "multi_thread")]
async fn ollama_connection_fails_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let embedding = embedding_for(&server);
    let reachable = tokio::task::spawn_blocking(move || test_ollama_connection(&embedding))
        .await
        .expect("blocking task should finish");
    assert!(!reachable);
}
