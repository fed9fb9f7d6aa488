// Retriever module
// Stores tenant-scoped PDF pages as vectors and finds the pages closest to a query


pub mod points;

pub use points::{build_points, point_id};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::{Config, StoreBackend};
use crate::database::{
    CollectionSpec, DistanceMetric, MemoryStore, PageHit, PageRecord, PointFilter, QdrantStore,
    SearchRequest, VectorStore,
};
use crate::embeddings::{Embedder, create_embedder};
use crate::{Result, RetrieverError};

/// Points fetched per round trip when expanding contiguous pages
pub const SCROLL_PAGE_SIZE: usize = 100;

/// Collection layout shared by every operation of a [`Retriever`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverSettings {
    pub collection: String,
    pub vector_size: usize,
    /// Named vectors provisioned on new collections
    pub metrics: Vec<DistanceMetric>,
    /// Embed `page_text` followed by `page_table` instead of the text alone
    pub embed_tables: bool,
}

impl RetrieverSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.qdrant.collection.clone(),
            vector_size: config.embedding.vector_size as usize,
            metrics: config.retrieval.distances.clone(),
            embed_tables: config.retrieval.embed_tables,
        }
    }

    #[inline]
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: self.collection.clone(),
            vector_size: self.vector_size,
            metrics: self.metrics.clone(),
        }
    }

    fn embedding_text(&self, page: &PageRecord) -> String {
        if self.embed_tables && !page.page_table.trim().is_empty() {
            format!("{}\n\n{}", page.page_text, page.page_table)
        } else {
            page.page_text.clone()
        }
    }
}

/// Per-query ranking parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub distance: DistanceMetric,
    pub top_k: usize,
    /// Minimum similarity in `[0, 1]`; higher is closer for every metric
    pub score_threshold: f32,
}

impl Default for QueryOptions {
    #[inline]
    fn default() -> Self {
        Self {
            distance: DistanceMetric::Cosine,
            top_k: 5,
            score_threshold: 0.5,
        }
    }
}

impl QueryOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            distance: DistanceMetric::Cosine,
            top_k: config.retrieval.default_top_k,
            score_threshold: config.retrieval.default_score_threshold,
        }
    }

    #[inline]
    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RetrieverError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(RetrieverError::InvalidQuery(format!(
                "score_threshold must be between 0 and 1, got {}",
                self.score_threshold
            )));
        }

        Ok(())
    }
}

/// Retrieval facade over an embedding model and a vector store.
///
/// All tenants share one collection; every read and delete is filtered on the
/// exact tenant id. A query running alongside a `store` for the same tenant
/// may see part of that batch.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: RetrieverSettings,
    // Set once the collection is known to exist, cleared when a write finds it gone
    collection_ready: AtomicBool,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            settings,
            collection_ready: AtomicBool::new(false),
        }
    }

    /// Wire up the configured embedder and backend
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store: Arc<dyn VectorStore> = match config.retrieval.backend {
            StoreBackend::Qdrant => Arc::new(QdrantStore::new(&config.qdrant)?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };

        debug!(
            "Retriever using {:?} backend, collection {}",
            config.retrieval.backend, config.qdrant.collection
        );
        Ok(Self::new(
            embedder,
            store,
            RetrieverSettings::from_config(config),
        ))
    }

    #[inline]
    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// Whether the collection exists right now
    #[inline]
    pub async fn has_collection(&self) -> Result<bool> {
        let exists = self.store.collection_exists(&self.settings.collection).await?;
        if exists {
            self.collection_ready.store(true, Ordering::Release);
        }
        Ok(exists)
    }

    /// Create the collection unless it already exists. Safe to call
    /// repeatedly and from concurrent tasks.
    #[inline]
    pub async fn ensure_collection(&self) -> Result<()> {
        if self.collection_ready.load(Ordering::Acquire) || self.has_collection().await? {
            return Ok(());
        }

        let spec = self.settings.collection_spec();
        info!(
            "Creating collection {} ({} dimensions, metrics: {:?})",
            spec.name, spec.vector_size, spec.metrics
        );
        self.store.create_collection(&spec).await?;
        self.collection_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Embed and upsert `pages` for `tenant_id`.
    ///
    /// Every page is embedded before anything is written, so a failed
    /// embedding leaves the collection untouched.
    #[inline]
    pub async fn store(&self, pages: &[PageRecord], tenant_id: &str) -> Result<()> {
        validate_tenant(tenant_id)?;
        self.ensure_collection().await?;

        if pages.is_empty() {
            debug!("No pages to store for tenant {}", tenant_id);
            return Ok(());
        }

        let texts = pages
            .iter()
            .map(|page| self.settings.embedding_text(page))
            .collect();
        let vectors = self.embed_texts(texts).await?;
        let points = build_points(vectors, pages, tenant_id)?;

        if let Err(error) = self
            .store
            .upsert(&self.settings.collection_spec(), points)
            .await
        {
            // Dropped behind our back; the next store re-creates it
            if matches!(
                self.store.collection_exists(&self.settings.collection).await,
                Ok(false)
            ) {
                warn!(
                    "Collection {} disappeared, it will be re-created on the next store",
                    self.settings.collection
                );
                self.collection_ready.store(false, Ordering::Release);
            }
            return Err(error);
        }

        info!(
            "Stored {} pages for tenant {} in {}",
            pages.len(),
            tenant_id,
            self.settings.collection
        );
        Ok(())
    }

    /// Page texts most similar to `query_text`, best first
    #[inline]
    pub async fn query(
        &self,
        query_text: &str,
        tenant_id: &str,
        options: &QueryOptions,
    ) -> Result<Vec<String>> {
        Ok(self
            .search(query_text, tenant_id, options)
            .await?
            .into_iter()
            .map(|hit| hit.payload.page_text)
            .collect())
    }

    /// Like [`Retriever::query`], keeping scores and full payloads
    #[inline]
    pub async fn search(
        &self,
        query_text: &str,
        tenant_id: &str,
        options: &QueryOptions,
    ) -> Result<Vec<PageHit>> {
        options.validate()?;
        validate_tenant(tenant_id)?;

        // A missing collection answers empty whatever the metric
        if !self.has_collection().await? {
            debug!(
                "Collection {} does not exist yet, nothing to search",
                self.settings.collection
            );
            return Ok(Vec::new());
        }

        if !self.settings.metrics.contains(&options.distance) {
            return Err(RetrieverError::CollectionState(format!(
                "Collection '{}' is not configured for '{}' distance",
                self.settings.collection, options.distance
            )));
        }

        let vector = self
            .embed_texts(vec![query_text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RetrieverError::Embedding("Model returned no vector".to_string()))?;

        let request = SearchRequest {
            vector,
            metric: options.distance,
            filter: PointFilter::tenant(tenant_id),
            limit: options.top_k,
            score_threshold: options.score_threshold,
        };

        let hits = self
            .store
            .search(&self.settings.collection, &request)
            .await?;
        debug!(
            "Query for tenant {} matched {} pages ({} distance)",
            tenant_id,
            hits.len(),
            options.distance
        );
        Ok(hits)
    }

    /// Matching pages plus their neighbours, ordered by page number.
    ///
    /// Each hit on page `p` pulls in pages `p - k_before ..= p + k_after`
    /// (clamped at 0) that exist for the tenant.
    #[inline]
    pub async fn query_contiguous(
        &self,
        query_text: &str,
        tenant_id: &str,
        options: &QueryOptions,
        k_before: u32,
        k_after: u32,
    ) -> Result<Vec<PageRecord>> {
        let hits = self.search(query_text, tenant_id, options).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: BTreeSet<u32> = hits
            .iter()
            .flat_map(|hit| {
                let page = hit.payload.page_number;
                page.saturating_sub(k_before)..=page.saturating_add(k_after)
            })
            .collect();
        debug!(
            "Expanding {} hits to {} candidate pages",
            hits.len(),
            wanted.len()
        );

        let filter = PointFilter::tenant(tenant_id).with_pages(wanted);
        let mut pages = BTreeMap::new();
        let mut offset = None;
        loop {
            let batch = self
                .store
                .scroll(
                    &self.settings.collection,
                    &filter,
                    offset,
                    SCROLL_PAGE_SIZE,
                )
                .await?;

            for point in batch.points {
                pages
                    .entry(point.payload.page_number)
                    .or_insert_with(|| point.payload.into_page());
            }

            match batch.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(pages.into_values().collect())
    }

    /// Remove every stored page of `tenant_id`
    #[inline]
    pub async fn delete(&self, tenant_id: &str) -> Result<()> {
        validate_tenant(tenant_id)?;

        if !self.has_collection().await? {
            return Ok(());
        }

        self.store
            .delete(&self.settings.collection, &PointFilter::tenant(tenant_id))
            .await?;
        info!(
            "Deleted pages of tenant {} from {}",
            tenant_id, self.settings.collection
        );
        Ok(())
    }

    /// Number of pages stored for `tenant_id`
    #[inline]
    pub async fn count(&self, tenant_id: &str) -> Result<u64> {
        validate_tenant(tenant_id)?;

        if !self.has_collection().await? {
            return Ok(0);
        }

        self.store
            .count(&self.settings.collection, &PointFilter::tenant(tenant_id))
            .await
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| RetrieverError::Embedding(format!("Embedding task failed: {}", e)))?
    }
}

fn validate_tenant(tenant_id: &str) -> Result<()> {
    if tenant_id.trim().is_empty() {
        return Err(RetrieverError::InvalidQuery(
            "tenant_id cannot be empty".to_string(),
        ));
    }
    Ok(())
}
