// Configuration management module
// TOML settings for the embedding model, ingestion batching, search and answering

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ANTHROPIC_API_KEY_ENV, AnthropicConfig, Config, ConfigError, IngestConfig, OllamaConfig,
    SearchConfig, StoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
