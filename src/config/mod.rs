// Configuration management module
// TOML settings in ~/.pdf-retriever plus an interactive editor

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, EmbeddingProvider, QdrantConfig, RetrievalConfig,
    StoreBackend,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
