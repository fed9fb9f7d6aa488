
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use super::Embedder;
use crate::Result;

/// Offline bag-of-words embedder.
///
/// Each lowercased alphanumeric token is hashed into one of `dimension`
/// buckets and the counts are L2-normalized, so texts sharing words have
/// positive cosine similarity. Useful for tests and air-gapped demos, not
/// for semantic search.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    #[inline]
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];

        let lowered = text.to_lowercase();
        let mut tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .peekable();

        if tokens.peek().is_none() {
            // Punctuation-only input still needs a non-zero vector
            vector[self.bucket(lowered.trim())] = 1.0;
            return vector;
        }

        for token in tokens {
            vector[self.bucket(token)] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        token.hash(&mut hasher);
        (hasher.finish() % self.dimension as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}
