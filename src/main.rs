use clap::{Parser, Subcommand};
use pdf_retriever::commands::{
    delete_tenant, query_contiguous_pages, query_pages, show_status, store_pages,
};
use pdf_retriever::config::{Config, run_interactive_config, show_config};
use pdf_retriever::{DistanceMetric, QueryOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-retriever")]
#[command(about = "Tenant-scoped vector retrieval over extracted PDF pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct RankArgs {
    /// Distance metric used for ranking
    #[arg(long, value_enum, default_value_t = DistanceMetric::Cosine)]
    distance: DistanceMetric,
    /// Maximum number of pages to return (defaults to the configured value)
    #[arg(long)]
    top_k: Option<usize>,
    /// Minimum similarity between 0 and 1 (defaults to the configured value)
    #[arg(long)]
    score_threshold: Option<f32>,
}

impl RankArgs {
    fn options(self, config: &Config) -> QueryOptions {
        let defaults = QueryOptions::from_config(config);
        defaults
            .with_distance(self.distance)
            .with_top_k(self.top_k.unwrap_or(defaults.top_k))
            .with_score_threshold(self.score_threshold.unwrap_or(defaults.score_threshold))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the vector database, embeddings and retrieval defaults
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed and store pages from a JSON file
    Store {
        /// JSON array of pages, objects or [page_number, page_text, page_table]
        file: PathBuf,
        /// Tenant (company) the pages belong to
        #[arg(long)]
        tenant: String,
    },
    /// Find the pages most similar to a query
    Query {
        query: String,
        #[arg(long)]
        tenant: String,
        #[command(flatten)]
        rank: RankArgs,
    },
    /// Find matching pages and include their neighbours
    QueryContiguous {
        query: String,
        #[arg(long)]
        tenant: String,
        #[command(flatten)]
        rank: RankArgs,
        /// Pages to include before each match
        #[arg(long, default_value_t = 1)]
        k_before: u32,
        /// Pages to include after each match
        #[arg(long, default_value_t = 1)]
        k_after: u32,
    },
    /// Delete every stored page of a tenant
    Delete {
        #[arg(long)]
        tenant: String,
    },
    /// Show connectivity and collection status
    Status {
        /// Also count the pages stored for this tenant
        #[arg(long)]
        tenant: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { show } = cli.command {
        if show {
            show_config()?;
        } else {
            run_interactive_config()?;
        }
        return Ok(());
    }

    let config = Config::load()?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Store { file, tenant } => {
            store_pages(&config, &file, &tenant).await?;
        }
        Commands::Query {
            query,
            tenant,
            rank,
        } => {
            query_pages(&config, &query, &tenant, &rank.options(&config)).await?;
        }
        Commands::QueryContiguous {
            query,
            tenant,
            rank,
            k_before,
            k_after,
        } => {
            query_contiguous_pages(
                &config,
                &query,
                &tenant,
                &rank.options(&config),
                k_before,
                k_after,
            )
            .await?;
        }
        Commands::Delete { tenant } => {
            delete_tenant(&config, &tenant).await?;
        }
        Commands::Status { tenant } => {
            show_status(&config, tenant.as_deref()).await?;
        }
    }

    Ok(())
}
