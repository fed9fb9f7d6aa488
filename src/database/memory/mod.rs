
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    CollectionSpec, PageHit, PagePayload, PointFilter, ScrollPage, SearchRequest, StoredPoint,
    VectorPoint, VectorStore, rank_hits,
};
use crate::{Result, RetrieverError};

struct MemoryCollection {
    spec: CollectionSpec,
    // Keyed by point id so scrolling has a stable order
    points: BTreeMap<String, (Vec<f32>, PagePayload)>,
}

/// In-process vector store with the same semantics as the Qdrant backend.
///
/// Nothing survives the process; useful for tests and one-off sessions.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collections currently held
    #[inline]
    pub async fn collection_count(&self) -> usize {
        self.collections.read().await.len()
    }

    /// Drop a whole collection with every tenant in it
    #[inline]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.collections.write().await.remove(name).is_some() {
            debug!("Deleted in-memory collection {}", name);
        }
        Ok(())
    }
}

fn missing_collection(name: &str) -> RetrieverError {
    RetrieverError::Database(format!("Collection '{}' not found", name))
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&spec.name) {
            debug!("Collection {} already exists", spec.name);
            return Ok(());
        }

        collections.insert(
            spec.name.clone(),
            MemoryCollection {
                spec: spec.clone(),
                points: BTreeMap::new(),
            },
        );
        debug!(
            "Created in-memory collection {} ({} dimensions)",
            spec.name, spec.vector_size
        );
        Ok(())
    }

    async fn upsert(&self, spec: &CollectionSpec, points: Vec<VectorPoint>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&spec.name)
            .ok_or_else(|| missing_collection(&spec.name))?;

        // Validate the whole batch first so a bad point leaves nothing behind
        if let Some(bad) = points
            .iter()
            .find(|p| p.vector.len() != collection.spec.vector_size)
        {
            return Err(RetrieverError::Database(format!(
                "Wrong vector dimension for point {}: expected {}, got {}",
                bad.id,
                collection.spec.vector_size,
                bad.vector.len()
            )));
        }

        let count = points.len();
        for point in points {
            collection
                .points
                .insert(point.id, (point.vector, point.payload));
        }

        debug!("Upserted {} points into {}", count, spec.name);
        Ok(())
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<PageHit>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| missing_collection(name))?;

        if !collection.spec.supports(request.metric) {
            return Err(RetrieverError::CollectionState(format!(
                "Collection '{}' has no '{}' vectors",
                name, request.metric
            )));
        }

        let mut hits: Vec<PageHit> = collection
            .points
            .iter()
            .filter(|(_, (_, payload))| request.filter.matches(payload))
            .map(|(id, (vector, payload))| PageHit {
                point_id: id.clone(),
                score: request
                    .metric
                    .similarity(request.metric.raw_score(&request.vector, vector)),
                payload: payload.clone(),
            })
            .filter(|hit| hit.score >= request.score_threshold)
            .collect();

        rank_hits(&mut hits);
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn scroll(
        &self,
        name: &str,
        filter: &PointFilter,
        offset: Option<String>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| missing_collection(name))?;

        let start = offset.map_or(Bound::Unbounded, Bound::Included);
        let mut matching = collection
            .points
            .range((start, Bound::Unbounded))
            .filter(|(_, (_, payload))| filter.matches(payload));

        let points: Vec<StoredPoint> = matching
            .by_ref()
            .take(limit)
            .map(|(id, (_, payload))| StoredPoint {
                id: id.clone(),
                payload: payload.clone(),
            })
            .collect();
        let next_offset = matching.next().map(|(id, _)| id.clone());

        Ok(ScrollPage {
            points,
            next_offset,
        })
    }

    async fn delete(&self, name: &str, filter: &PointFilter) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| missing_collection(name))?;

        let before = collection.points.len();
        collection
            .points
            .retain(|_, (_, payload)| !filter.matches(payload));
        debug!(
            "Deleted {} points from {}",
            before - collection.points.len(),
            name
        );
        Ok(())
    }

    async fn count(&self, name: &str, filter: &PointFilter) -> Result<u64> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| missing_collection(name))?;

        Ok(collection
            .points
            .values()
            .filter(|(_, payload)| filter.matches(payload))
            .count() as u64)
    }
}
