// Configuration management module
// Layered settings: defaults, optional TOML file, then environment variables

pub mod settings;

#[cfg(test)]
mod tests;

pub use settings::{
    Config, ConfigError, EmbeddingConfig, EmbeddingMode, IngestConfig, LlmConfig, ProviderKind,
    StoreConfig,
};

/// Get the default configuration file path
#[inline]
pub fn get_config_file() -> Option<std::path::PathBuf> {
    Config::default_config_file()
}
