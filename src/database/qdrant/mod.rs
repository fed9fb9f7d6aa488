#[cfg(test)]
mod tests;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, QueryPointsBuilder, ScrollPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    CollectionSpec, DistanceMetric, PageHit, PagePayload, PointFilter, ScrollPage, SearchRequest,
    StoredPoint, VectorPoint, VectorStore, payload_fields, rank_hits,
};
use crate::config::QdrantConfig;
use crate::{Result, RetrieverError};

/// Vector store backed by a Qdrant server over gRPC
pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl QdrantStore {
    /// Build a client for the configured server.
    ///
    /// No request is made here; an unreachable server surfaces on first use.
    #[inline]
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        debug!("Creating Qdrant client for {}", config.url);

        let client = Qdrant::from_url(&config.url)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| map_qdrant_error(&e, "Failed to build Qdrant client"))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check that the server answers
    #[inline]
    pub async fn health_check(&self) -> Result<()> {
        let reply = self
            .client
            .health_check()
            .await
            .map_err(|e| map_qdrant_error(&e, "Qdrant health check failed"))?;
        info!("Qdrant {} is healthy (version {})", self.url, reply.version);
        Ok(())
    }

    /// Drop a whole collection with every tenant in it
    #[inline]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| map_qdrant_error(&e, "Failed to delete collection"))?;
        warn!("Deleted collection {}", name);
        Ok(())
    }
}

const fn qdrant_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Euclidean => Distance::Euclid,
        DistanceMetric::Manhattan => Distance::Manhattan,
    }
}

fn map_qdrant_error(error: &QdrantError, action: &str) -> RetrieverError {
    classify_error(action, &error.to_string())
}

fn classify_error(action: &str, message: &str) -> RetrieverError {
    let lower = message.to_lowercase();

    if lower.contains("not existing vector name") || lower.contains("wrong input: vector") {
        RetrieverError::CollectionState(format!("{}: {}", action, message))
    } else if lower.contains("unavailable")
        || lower.contains("transport error")
        || lower.contains("connection refused")
        || lower.contains("connect error")
        || lower.contains("dns error")
        || lower.contains("deadline")
    {
        RetrieverError::Connection(format!("{}: {}", action, message))
    } else {
        RetrieverError::Database(format!("{}: {}", action, message))
    }
}

fn to_qdrant_filter(filter: &PointFilter) -> Filter {
    let mut conditions = vec![Condition::matches(
        payload_fields::TENANT_ID,
        filter.tenant_id.clone(),
    )];

    if let Some(pages) = &filter.page_numbers {
        let pages: Vec<i64> = pages.iter().map(|&p| i64::from(p)).collect();
        conditions.push(Condition::matches(payload_fields::PAGE_NUMBER, pages));
    }

    Filter::must(conditions)
}

fn to_payload(payload: &PagePayload) -> Result<Payload> {
    let value = serde_json::to_value(payload)
        .map_err(|e| RetrieverError::Database(format!("Failed to serialize payload: {}", e)))?;

    Payload::try_from(value)
        .map_err(|e| RetrieverError::Database(format!("Failed to build point payload: {}", e)))
}

fn string_field(payload: &HashMap<String, Value>, key: &str) -> Result<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Ok(s.clone()),
        _ => Err(RetrieverError::Database(format!(
            "Missing or invalid payload field '{}'",
            key
        ))),
    }
}

fn page_number_field(payload: &HashMap<String, Value>) -> Result<u32> {
    match payload
        .get(payload_fields::PAGE_NUMBER)
        .and_then(|v| v.kind.as_ref())
    {
        Some(Kind::IntegerValue(n)) => u32::try_from(*n).map_err(|_| {
            RetrieverError::Database(format!("Page number out of range: {}", n))
        }),
        _ => Err(RetrieverError::Database(format!(
            "Missing or invalid payload field '{}'",
            payload_fields::PAGE_NUMBER
        ))),
    }
}

fn from_payload(payload: &HashMap<String, Value>) -> Result<PagePayload> {
    Ok(PagePayload {
        page_number: page_number_field(payload)?,
        page_text: string_field(payload, payload_fields::PAGE_TEXT)?,
        page_table: string_field(payload, payload_fields::PAGE_TABLE)?,
        tenant_id: string_field(payload, payload_fields::TENANT_ID)?,
    })
}

fn point_id_string(id: Option<&PointId>) -> String {
    match id.and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| map_qdrant_error(&e, "Failed to check collection"))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut vectors_config = VectorsConfigBuilder::default();
        for metric in &spec.metrics {
            vectors_config.add_named_vector_params(
                metric.as_str(),
                VectorParamsBuilder::new(spec.vector_size as u64, qdrant_distance(*metric))
                    .build(),
            );
        }

        match self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&spec.name).vectors_config(vectors_config),
            )
            .await
        {
            Ok(_) => {
                info!(
                    "Created collection {} ({} dimensions, metrics: {:?})",
                    spec.name, spec.vector_size, spec.metrics
                );
                Ok(())
            }
            // Another caller won the creation race
            Err(e) if e.to_string().to_lowercase().contains("already exists") => {
                warn!("Collection {} was created concurrently", spec.name);
                Ok(())
            }
            Err(e) => Err(map_qdrant_error(&e, "Failed to create collection")),
        }
    }

    async fn upsert(&self, spec: &CollectionSpec, points: Vec<VectorPoint>) -> Result<()> {
        let count = points.len();
        let points = points
            .into_iter()
            .map(|point| {
                let vectors: HashMap<String, Vec<f32>> = spec
                    .metrics
                    .iter()
                    .map(|metric| (metric.as_str().to_string(), point.vector.clone()))
                    .collect();
                Ok(PointStruct::new(
                    point.id,
                    vectors,
                    to_payload(&point.payload)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&spec.name, points).wait(true))
            .await
            .map_err(|e| map_qdrant_error(&e, "Failed to upsert points"))?;

        debug!("Upserted {} points into {}", count, spec.name);
        Ok(())
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<PageHit>> {
        let mut query = QueryPointsBuilder::new(name)
            .query(request.vector.clone())
            .using(request.metric.as_str())
            .filter(to_qdrant_filter(&request.filter))
            .limit(request.limit as u64)
            .with_payload(true);

        if let Some(threshold) = request.metric.raw_threshold(request.score_threshold) {
            query = query.score_threshold(threshold);
        }

        let response = self
            .client
            .query(query)
            .await
            .map_err(|e| map_qdrant_error(&e, "Failed to search collection"))?;

        let mut hits = response
            .result
            .iter()
            .map(|point| {
                Ok(PageHit {
                    point_id: point_id_string(point.id.as_ref()),
                    score: request.metric.similarity(point.score),
                    payload: from_payload(&point.payload)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // The server applies the threshold on raw scores; float round-off can
        // let a boundary case through
        hits.retain(|hit| hit.score >= request.score_threshold);
        rank_hits(&mut hits);
        Ok(hits)
    }

    async fn scroll(
        &self,
        name: &str,
        filter: &PointFilter,
        offset: Option<String>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let mut scroll = ScrollPointsBuilder::new(name)
            .filter(to_qdrant_filter(filter))
            .limit(u32::try_from(limit).unwrap_or(u32::MAX))
            .with_payload(true)
            .with_vectors(false);

        if let Some(offset) = offset {
            scroll = scroll.offset(PointId::from(offset));
        }

        let response = self
            .client
            .scroll(scroll)
            .await
            .map_err(|e| map_qdrant_error(&e, "Failed to scroll collection"))?;

        let points = response
            .result
            .iter()
            .map(|point| {
                Ok(StoredPoint {
                    id: point_id_string(point.id.as_ref()),
                    payload: from_payload(&point.payload)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ScrollPage {
            points,
            next_offset: response
                .next_page_offset
                .as_ref()
                .map(|id| point_id_string(Some(id))),
        })
    }

    async fn delete(&self, name: &str, filter: &PointFilter) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(name)
                    .points(to_qdrant_filter(filter))
                    .wait(true),
            )
            .await
            .map_err(|e| map_qdrant_error(&e, "Failed to delete points"))?;

        info!("Deleted points of tenant {} from {}", filter.tenant_id, name);
        Ok(())
    }

    async fn count(&self, name: &str, filter: &PointFilter) -> Result<u64> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(name)
                    .filter(to_qdrant_filter(filter))
                    .exact(true),
            )
            .await
            .map_err(|e| map_qdrant_error(&e, "Failed to count points"))?;

        Ok(response.result.map_or(0, |r| r.count))
    }
}
