#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, MultiSelect, Select};

use super::{Config, ConfigError, EmbeddingConfig, EmbeddingProvider, QdrantConfig, StoreBackend};
use crate::database::DistanceMetric;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 PDF Retriever Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Vector Database").bold().yellow());
    configure_qdrant(&mut config.qdrant)?;

    eprintln!();
    eprintln!("{}", style("Embeddings").bold().yellow());
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config)?;

    if config.embedding.provider == EmbeddingProvider::Ollama {
        eprintln!();
        eprintln!("{}", style("Testing Ollama connection...").yellow());

        if test_ollama_connection(&config.embedding) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before storing pages.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Qdrant:").bold().yellow());
    eprintln!("  URL: {}", style(&config.qdrant.url).cyan());
    eprintln!("  Collection: {}", style(&config.qdrant.collection).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.qdrant.timeout_seconds).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!(
        "  Provider: {}",
        style(format!("{:?}", config.embedding.provider).to_lowercase()).cyan()
    );
    eprintln!(
        "  Vector Size: {}",
        style(config.embedding.vector_size).cyan()
    );
    if config.embedding.provider == EmbeddingProvider::Ollama {
        match config.ollama_url() {
            Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
        }
        eprintln!("  Model: {}", style(&config.embedding.model).cyan());
        eprintln!(
            "  Batch Size: {}",
            style(config.embedding.batch_size).cyan()
        );
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Backend: {}",
        style(format!("{:?}", config.retrieval.backend).to_lowercase()).cyan()
    );
    eprintln!(
        "  Distances: {}",
        style(metric_list(&config.retrieval.distances)).cyan()
    );
    eprintln!(
        "  Embed Tables: {}",
        style(config.retrieval.embed_tables).cyan()
    );
    eprintln!(
        "  Defaults: top_k={} score_threshold={}",
        style(config.retrieval.default_top_k).cyan(),
        style(config.retrieval.default_score_threshold).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_qdrant(qdrant: &mut QdrantConfig) -> Result<()> {
    let url: String = Input::new()
        .with_prompt("Qdrant gRPC URL")
        .default(qdrant.url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = QdrantConfig {
                url: input.clone(),
                ..qdrant.clone()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let collection: String = Input::new()
        .with_prompt("Collection name")
        .default(qdrant.collection.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() || input.contains('/') {
                Err("Collection name cannot be empty or contain '/'")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    qdrant.set_url(url)?;
    qdrant.set_collection(collection)?;

    Ok(())
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let providers = &["ollama", "hashing"];
    let default_index = usize::from(embedding.provider == EmbeddingProvider::Hashing);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(providers)
        .interact()?;

    embedding.provider = if provider_index == 0 {
        EmbeddingProvider::Ollama
    } else {
        EmbeddingProvider::Hashing
    };

    let vector_size: u32 = Input::new()
        .with_prompt("Vector size")
        .default(embedding.vector_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Vector size must be between 64 and 4096")
            }
        })
        .interact_text()?;
    embedding.set_vector_size(vector_size)?;

    if embedding.provider == EmbeddingProvider::Hashing {
        return Ok(());
    }

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(embedding.host.clone())
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_host(host)?;
    embedding.set_port(port)?;
    embedding.set_model(model)?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let backends = &["qdrant", "memory"];
    let default_index = usize::from(config.retrieval.backend == StoreBackend::Memory);

    let backend_index = Select::new()
        .with_prompt("Vector store backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    config.retrieval.backend = if backend_index == 0 {
        StoreBackend::Qdrant
    } else {
        StoreBackend::Memory
    };

    let names: Vec<&str> = DistanceMetric::ALL.iter().map(|m| m.as_str()).collect();
    let selected = MultiSelect::new()
        .with_prompt("Distance metrics to provision (applies to new collections)")
        .items(&names)
        .defaults(&metric_defaults(&config.retrieval.distances))
        .interact()?;

    let distances: Vec<DistanceMetric> = selected
        .into_iter()
        .map(|index| DistanceMetric::ALL[index])
        .collect();
    if distances.is_empty() {
        return Err(ConfigError::NoDistanceMetrics.into());
    }
    config.retrieval.distances = distances;

    config.retrieval.embed_tables = Confirm::new()
        .with_prompt("Include table text in page embeddings?")
        .default(config.retrieval.embed_tables)
        .interact()?;

    Ok(())
}

fn metric_defaults(enabled: &[DistanceMetric]) -> Vec<bool> {
    DistanceMetric::ALL
        .iter()
        .map(|metric| enabled.contains(metric))
        .collect()
}

fn metric_list(metrics: &[DistanceMetric]) -> String {
    metrics
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn test_ollama_connection(embedding: &EmbeddingConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        embedding.protocol, embedding.host, embedding.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
