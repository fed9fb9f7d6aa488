// Embeddings module
// Turns page and query text into fixed-length vectors


pub mod hashing;
pub mod ollama;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

use std::sync::Arc;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::{Result, RetrieverError};

/// A loaded embedding model.
///
/// Implementors provide `encode_batch`; callers go through `embed` and
/// `embed_batch`, which reject blank input and check the returned shape.
pub trait Embedder: Send + Sync {
    /// Length of every vector this model produces
    fn dimension(&self) -> usize;

    /// Raw inference, one vector per input, in order
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| RetrieverError::Embedding("Model returned no vector".to_string()))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(index) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(RetrieverError::Embedding(format!(
                "Cannot embed blank text (input {})",
                index
            )));
        }

        let vectors = self.encode_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(RetrieverError::Embedding(format!(
                "Model returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        let expected = self.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RetrieverError::Embedding(format!(
                "Model returned a {}-dimensional vector, expected {}",
                bad.len(),
                expected
            )));
        }

        Ok(vectors)
    }
}

/// Build the configured provider. Called once per process.
#[inline]
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaClient::new(config)?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.vector_size as usize)),
    };
    Ok(embedder)
}
