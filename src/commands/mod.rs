
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{Config, EmbeddingProvider, StoreBackend};
use crate::database::{PageRecord, QdrantStore};
use crate::embeddings::OllamaClient;
use crate::retriever::{QueryOptions, Retriever};

/// A page as written in an input file: either an object or a
/// `[page_number, page_text, page_table]` triple
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageInput {
    Record(PageRecord),
    Tuple(u32, String, String),
}

impl From<PageInput> for PageRecord {
    #[inline]
    fn from(input: PageInput) -> Self {
        match input {
            PageInput::Record(record) => record,
            PageInput::Tuple(page_number, page_text, page_table) => {
                Self::new(page_number, page_text, page_table)
            }
        }
    }
}

/// Read extracted pages from a JSON array
#[inline]
pub fn load_pages(path: &Path) -> Result<Vec<PageRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pages file: {}", path.display()))?;
    let inputs: Vec<PageInput> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse pages file: {}", path.display()))?;

    Ok(inputs.into_iter().map(PageRecord::from).collect())
}

fn warn_if_ephemeral(config: &Config) {
    if config.retrieval.backend == StoreBackend::Memory {
        warn!("Using the in-memory backend; nothing is kept after this command exits");
    }
}

/// Embed and store every page of a JSON file for a tenant
#[inline]
pub async fn store_pages(config: &Config, path: &Path, tenant_id: &str) -> Result<()> {
    warn_if_ephemeral(config);

    let pages = load_pages(path)?;
    info!("Loaded {} pages from {}", pages.len(), path.display());

    let retriever = Retriever::from_config(config).context("Failed to initialize retriever")?;
    retriever
        .store(&pages, tenant_id)
        .await
        .context("Failed to store pages")?;

    println!(
        "Stored {} pages for tenant '{}' in collection '{}'",
        pages.len(),
        tenant_id,
        config.qdrant.collection
    );
    Ok(())
}

/// Print the best matching pages for a query
#[inline]
pub async fn query_pages(
    config: &Config,
    query: &str,
    tenant_id: &str,
    options: &QueryOptions,
) -> Result<()> {
    warn_if_ephemeral(config);

    let retriever = Retriever::from_config(config).context("Failed to initialize retriever")?;
    let hits = retriever
        .search(query, tenant_id, options)
        .await
        .context("Query failed")?;

    if hits.is_empty() {
        println!("No pages matched for tenant '{}'.", tenant_id);
        return Ok(());
    }

    println!(
        "Top {} pages for tenant '{}' ({} distance):",
        hits.len(),
        tenant_id,
        options.distance
    );
    println!();
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. Page {} (score {:.3})",
            rank + 1,
            hit.payload.page_number,
            hit.score
        );
        println!("   {}", hit.payload.page_text);
        if !hit.payload.page_table.is_empty() {
            println!("   Table: {}", hit.payload.page_table);
        }
        println!();
    }

    Ok(())
}

/// Print matching pages together with their neighbours
#[inline]
pub async fn query_contiguous_pages(
    config: &Config,
    query: &str,
    tenant_id: &str,
    options: &QueryOptions,
    k_before: u32,
    k_after: u32,
) -> Result<()> {
    warn_if_ephemeral(config);

    let retriever = Retriever::from_config(config).context("Failed to initialize retriever")?;
    let pages = retriever
        .query_contiguous(query, tenant_id, options, k_before, k_after)
        .await
        .context("Contiguous query failed")?;

    if pages.is_empty() {
        println!("No pages matched for tenant '{}'.", tenant_id);
        return Ok(());
    }

    for page in &pages {
        println!("--- Page {} ---", page.page_number);
        println!("{}", page.page_text);
        if !page.page_table.is_empty() {
            println!();
            println!("{}", page.page_table);
        }
        println!();
    }

    Ok(())
}

/// Remove all pages of a tenant
#[inline]
pub async fn delete_tenant(config: &Config, tenant_id: &str) -> Result<()> {
    warn_if_ephemeral(config);

    let retriever = Retriever::from_config(config).context("Failed to initialize retriever")?;
    let before = retriever
        .count(tenant_id)
        .await
        .context("Failed to count tenant pages")?;
    retriever
        .delete(tenant_id)
        .await
        .context("Failed to delete tenant pages")?;

    println!("Deleted {} pages of tenant '{}'", before, tenant_id);
    Ok(())
}

/// Show connectivity and collection status
#[inline]
pub async fn show_status(config: &Config, tenant_id: Option<&str>) -> Result<()> {
    println!("📊 PDF Retriever Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embeddings:");
    match config.embedding.provider {
        EmbeddingProvider::Hashing => {
            println!(
                "   ✅ Hashing embedder ({} dimensions, offline)",
                config.embedding.vector_size
            );
        }
        EmbeddingProvider::Ollama => match OllamaClient::new(&config.embedding) {
            Ok(client) => {
                let model = client.model().to_string();
                match tokio::task::spawn_blocking(move || client.health_check()).await {
                    Ok(Ok(())) => {
                        println!(
                            "   ✅ Ollama: Connected ({}:{})",
                            config.embedding.host, config.embedding.port
                        );
                        println!("   📋 Model: {}", model);
                    }
                    Ok(Err(e)) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
                    Err(e) => println!("   ❌ Ollama: Health check did not finish - {}", e),
                }
            }
            Err(e) => println!("   ❌ Ollama: Invalid configuration - {:#}", e),
        },
    }
    println!();

    println!("🔍 Vector Database:");
    if config.retrieval.backend == StoreBackend::Memory {
        println!("   ℹ️  In-memory backend, nothing is persisted");
        return Ok(());
    }

    let store = match QdrantStore::new(&config.qdrant) {
        Ok(store) => store,
        Err(e) => {
            println!("   ❌ Qdrant: {}", e);
            return Ok(());
        }
    };
    if let Err(e) = store.health_check().await {
        println!("   ❌ Qdrant: Failed to connect to {} - {}", store.url(), e);
        return Ok(());
    }
    println!("   ✅ Qdrant: Connected ({})", store.url());

    let retriever = Retriever::from_config(config).context("Failed to initialize retriever")?;
    if retriever.has_collection().await? {
        println!("   📚 Collection '{}' exists", config.qdrant.collection);
        if let Some(tenant_id) = tenant_id {
            let count = retriever.count(tenant_id).await?;
            println!("   📄 Tenant '{}': {} pages", tenant_id, count);
        }
    } else {
        println!(
            "   📭 Collection '{}' not created yet (created on first store)",
            config.qdrant.collection
        );
    }

    Ok(())
}
