// Vector database module
// Qdrant for deployments, an in-process store for tests and throwaway sessions


pub mod memory;
pub mod qdrant;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::Result;

/// Payload keys written on every point
pub mod payload_fields {
    pub const PAGE_NUMBER: &str = "page_number";
    pub const PAGE_TEXT: &str = "page_text";
    pub const PAGE_TABLE: &str = "page_table";
    pub const TENANT_ID: &str = "tenant_id";
}

/// Similarity function used to rank candidates.
///
/// The collection stores one named vector per enabled metric, so the metric
/// is picked per query rather than fixed at creation time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    pub const ALL: [Self; 3] = [Self::Cosine, Self::Euclidean, Self::Manhattan];

    /// Name of the vector slot holding embeddings for this metric
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
        }
    }

    /// Convert a raw backend score into a similarity where higher is better.
    ///
    /// Cosine scores pass through unchanged. Euclidean and manhattan backends
    /// report a distance `d`, which maps to `1 / (1 + d)`.
    #[inline]
    pub fn similarity(self, raw: f32) -> f32 {
        match self {
            Self::Cosine => raw,
            Self::Euclidean | Self::Manhattan => 1.0 / (1.0 + raw.max(0.0)),
        }
    }

    /// Raw backend threshold equivalent to a similarity threshold.
    ///
    /// `None` means every candidate qualifies.
    #[inline]
    pub fn raw_threshold(self, similarity: f32) -> Option<f32> {
        match self {
            Self::Cosine => Some(similarity),
            Self::Euclidean | Self::Manhattan if similarity <= 0.0 => None,
            Self::Euclidean | Self::Manhattan => Some(1.0 / similarity - 1.0),
        }
    }

    /// Raw score between two vectors, as the vector database reports it
    #[inline]
    pub fn raw_score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot / (norm_a * norm_b)
                }
            }
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "euclid" => Ok(Self::Euclidean),
            "manhattan" => Ok(Self::Manhattan),
            other => Err(format!(
                "unknown distance metric '{}' (expected cosine, euclidean or manhattan)",
                other
            )),
        }
    }
}

/// One page of an extracted PDF document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(alias = "page_no")]
    pub page_number: u32,
    pub page_text: String,
    #[serde(default)]
    pub page_table: String,
}

impl PageRecord {
    #[inline]
    pub fn new(page_number: u32, page_text: impl Into<String>, page_table: impl Into<String>) -> Self {
        Self {
            page_number,
            page_text: page_text.into(),
            page_table: page_table.into(),
        }
    }
}

impl<T: Into<String>, U: Into<String>> From<(u32, T, U)> for PageRecord {
    #[inline]
    fn from((page_number, page_text, page_table): (u32, T, U)) -> Self {
        Self::new(page_number, page_text, page_table)
    }
}

/// Payload persisted alongside every vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePayload {
    pub page_number: u32,
    pub page_text: String,
    pub page_table: String,
    pub tenant_id: String,
}

impl PagePayload {
    #[inline]
    pub fn into_page(self) -> PageRecord {
        PageRecord {
            page_number: self.page_number,
            page_text: self.page_text,
            page_table: self.page_table,
        }
    }
}

/// The persisted unit: id, embedding and payload
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PagePayload,
}

/// A point returned by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct PageHit {
    pub point_id: String,
    /// Similarity, higher is better regardless of metric
    pub score: f32,
    pub payload: PagePayload,
}

/// A point returned by a scroll, without vectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPoint {
    pub id: String,
    pub payload: PagePayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPage {
    pub points: Vec<StoredPoint>,
    pub next_offset: Option<String>,
}

/// Creation parameters of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub vector_size: usize,
    pub metrics: Vec<DistanceMetric>,
}

impl CollectionSpec {
    #[inline]
    pub fn supports(&self, metric: DistanceMetric) -> bool {
        self.metrics.contains(&metric)
    }
}

/// Exact-match filter on the tenant, optionally narrowed to page numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointFilter {
    pub tenant_id: String,
    pub page_numbers: Option<Vec<u32>>,
}

impl PointFilter {
    #[inline]
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            page_numbers: None,
        }
    }

    #[inline]
    pub fn with_pages(mut self, pages: impl IntoIterator<Item = u32>) -> Self {
        self.page_numbers = Some(pages.into_iter().collect());
        self
    }

    #[inline]
    pub fn matches(&self, payload: &PagePayload) -> bool {
        payload.tenant_id == self.tenant_id
            && self
                .page_numbers
                .as_ref()
                .is_none_or(|pages| pages.contains(&payload.page_number))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub metric: DistanceMetric,
    pub filter: PointFilter,
    pub limit: usize,
    /// Minimum similarity, in the same scale as `PageHit::score`
    pub score_threshold: f32,
}

/// Order hits by descending score, then ascending page number, then point id
#[inline]
pub fn rank_hits(hits: &mut [PageHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.payload.page_number.cmp(&b.payload.page_number))
            .then_with(|| a.point_id.cmp(&b.point_id))
    });
}

/// Operations the retriever needs from a vector database
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create the collection. Succeeds when it already exists.
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()>;

    async fn upsert(&self, spec: &CollectionSpec, points: Vec<VectorPoint>) -> Result<()>;

    /// Filtered similarity search, hits ranked with [`rank_hits`]
    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<PageHit>>;

    async fn scroll(
        &self,
        name: &str,
        filter: &PointFilter,
        offset: Option<String>,
        limit: usize,
    ) -> Result<ScrollPage>;

    async fn delete(&self, name: &str, filter: &PointFilter) -> Result<()>;

    async fn count(&self, name: &str, filter: &PointFilter) -> Result<u64>;
}
