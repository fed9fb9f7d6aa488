use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrieverError>;

#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Input mismatch: {vectors} vectors for {pages} pages")]
    InputMismatch { vectors: usize, pages: usize },

    #[error("Collection state error: {0}")]
    CollectionState(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod retriever;

pub use database::{DistanceMetric, PageHit, PageRecord};
pub use retriever::{QueryOptions, Retriever, RetrieverSettings};
