#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::RetrieverError;
use crate::database::DistanceMetric;

pub const DEFAULT_VECTOR_SIZE: u32 = 1024;
pub const DEFAULT_COLLECTION: &str = "pdf_pages";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub timeout_seconds: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Ollama,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub vector_size: u32,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            vector_size: DEFAULT_VECTOR_SIZE,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "bge-m3:latest".to_string(),
            batch_size: 16,
            timeout_seconds: 30,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: StoreBackend,
    pub distances: Vec<DistanceMetric>,
    pub embed_tables: bool,
    pub default_top_k: usize,
    pub default_score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Qdrant,
            distances: DistanceMetric::ALL.to_vec(),
            embed_tables: false,
            default_top_k: 5,
            default_score_threshold: 0.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid vector size: {0} (must be between 64 and 4096)")]
    InvalidVectorSize(u32),
    #[error("Invalid collection name: '{0}' (cannot be empty or contain '/')")]
    InvalidCollectionName(String),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("At least one distance metric must be enabled")]
    NoDistanceMetrics,
    #[error("Invalid default top_k: {0} (must be between 1 and 1000)")]
    InvalidTopK(usize),
    #[error("Invalid default score threshold: {0} (must be between 0 and 1)")]
    InvalidScoreThreshold(f32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for RetrieverError {
    #[inline]
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            qdrant: QdrantConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            base_dir: Self::config_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Default configuration directory, `~/.pdf-retriever`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".pdf-retriever"))
            .or_else(|| dirs::data_dir().map(|data| data.join("pdf-retriever")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the default configuration directory
    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        Self::load_from(config_dir)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when absent
    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.qdrant.validate()?;
        self.embedding.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.embedding.ollama_url()
    }
}

impl QdrantConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.url).map_err(|_| ConfigError::InvalidUrl(self.url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if self.collection.trim().is_empty() || self.collection.contains('/') {
            return Err(ConfigError::InvalidCollectionName(self.collection.clone()));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    pub fn set_url(&mut self, url: String) -> Result<(), ConfigError> {
        let temp_config = QdrantConfig {
            url: url.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.url = url;
        Ok(())
    }

    pub fn set_collection(&mut self, collection: String) -> Result<(), ConfigError> {
        if collection.trim().is_empty() || collection.contains('/') {
            return Err(ConfigError::InvalidCollectionName(collection));
        }
        self.collection = collection;
        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&self.vector_size) {
            return Err(ConfigError::InvalidVectorSize(self.vector_size));
        }

        // Connection settings only matter for the HTTP provider
        if self.provider == EmbeddingProvider::Hashing {
            return Ok(());
        }

        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_vector_size(&mut self, vector_size: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&vector_size) {
            return Err(ConfigError::InvalidVectorSize(vector_size));
        }
        self.vector_size = vector_size;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.distances.is_empty() {
            return Err(ConfigError::NoDistanceMetrics);
        }

        if !(1..=1000).contains(&self.default_top_k) {
            return Err(ConfigError::InvalidTopK(self.default_top_k));
        }

        if !(0.0..=1.0).contains(&self.default_score_threshold) {
            return Err(ConfigError::InvalidScoreThreshold(
                self.default_score_threshold,
            ));
        }

        Ok(())
    }
}
