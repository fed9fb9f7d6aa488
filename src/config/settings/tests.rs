use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.qdrant.url, "http://localhost:6334");
    assert_eq!(config.qdrant.collection, DEFAULT_COLLECTION);
    assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
    assert_eq!(config.embedding.vector_size, 1024);
    assert_eq!(config.embedding.port, 11434);
    assert_eq!(config.embedding.retry_attempts, 1);
    assert_eq!(config.retrieval.backend, StoreBackend::Qdrant);
    assert_eq!(config.retrieval.distances, DistanceMetric::ALL.to_vec());
    assert!(!config.retrieval.embed_tables);
    assert_eq!(config.retrieval.default_top_k, 5);
    assert_eq!(config.retrieval.default_score_threshold, 0.5);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.qdrant.url = "not a url".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.qdrant.collection = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.vector_size = 8;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidVectorSize(8))
    ));

    let mut invalid_config = config.clone();
    invalid_config.embedding.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.retry_attempts = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.distances.clear();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::NoDistanceMetrics)
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.default_top_k = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.retrieval.default_score_threshold = 1.5;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn hashing_provider_ignores_connection_settings() {
    let mut config = Config::default();
    config.embedding.provider = EmbeddingProvider::Hashing;
    config.embedding.model = String::new();
    config.embedding.port = 0;
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed: Config = toml::from_str(&toml_str).expect("should parse toml correctly");

    assert_eq!(config.qdrant, parsed.qdrant);
    assert_eq!(config.embedding, parsed.embedding);
    assert_eq!(config.retrieval, parsed.retrieval);
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
        [retrieval]
        backend = "memory"
        distances = ["cosine"]
        "#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.qdrant, QdrantConfig::default());
    assert_eq!(parsed.retrieval.backend, StoreBackend::Memory);
    assert_eq!(parsed.retrieval.distances, vec![DistanceMetric::Cosine]);
    assert_eq!(parsed.retrieval.default_top_k, 5);
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load_from(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.embedding, EmbeddingConfig::default());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_dir = temp_dir.path().join("nested");

    let mut config = Config::load_from(&config_dir).expect("should load defaults");
    config.qdrant.collection = "quarterly_reports".to_string();
    config.embedding.provider = EmbeddingProvider::Hashing;
    config.retrieval.embed_tables = true;
    config.save().expect("should save config");

    assert!(config_dir.join("config.toml").exists());

    let reloaded = Config::load_from(&config_dir).expect("should reload config");
    assert_eq!(reloaded.qdrant.collection, "quarterly_reports");
    assert_eq!(reloaded.embedding.provider, EmbeddingProvider::Hashing);
    assert!(reloaded.retrieval.embed_tables);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[embedding]\nvector_size = 3\n",
    )
    .expect("should write config");

    assert!(Config::load_from(temp_dir.path()).is_err());
}

#[test]
fn setter_validation() {
    let mut qdrant = QdrantConfig::default();
    assert!(qdrant.set_url("https://qdrant.internal:6334".to_string()).is_ok());
    assert!(qdrant.set_url("ftp://qdrant.internal".to_string()).is_err());
    assert!(qdrant.set_collection("reports".to_string()).is_ok());
    assert!(qdrant.set_collection("a/b".to_string()).is_err());

    let mut embedding = EmbeddingConfig::default();
    assert!(embedding.set_protocol("https".to_string()).is_ok());
    assert!(embedding.set_host("example.com".to_string()).is_ok());
    assert!(embedding.set_port(8080).is_ok());
    assert!(embedding.set_model("mxbai-embed-large".to_string()).is_ok());
    assert!(embedding.set_vector_size(768).is_ok());

    assert!(embedding.set_protocol("ftp".to_string()).is_err());
    assert!(embedding.set_port(0).is_err());
    assert!(embedding.set_model(String::new()).is_err());
    assert!(embedding.set_vector_size(5000).is_err());
}

#[test]
fn config_error_converts_to_retriever_error() {
    let err: RetrieverError = ConfigError::NoDistanceMetrics.into();
    assert!(matches!(err, RetrieverError::Config(_)));
}
