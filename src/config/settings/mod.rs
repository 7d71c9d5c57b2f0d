
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::database::lancedb::DistanceMetric;

pub const DEFAULT_MAX_TEXT_LENGTH: usize = 8000;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Which embedding backend produces vectors
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint
    Api,
    /// Local Ollama server
    Local,
    /// Model bundled with the binary
    #[default]
    Default,
}

/// Where vectors are computed during ingestion
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// The collection computes vectors from document text at insert time
    #[default]
    Store,
    /// The indexer computes vectors before handing records to the store
    Explicit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Default,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "nomic-embed-text:latest".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub summary_temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            summary_temperature: 0.3,
            max_tokens: None,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub database: String,
    pub collection: String,
    pub distance: DistanceMetric,
    pub search_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./rag_store"),
            database: "rag".to_string(),
            collection: "embeddings".to_string(),
            distance: DistanceMetric::L2,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    pub mode: EmbeddingMode,
    pub batch_size: usize,
    pub max_text_length: usize,
    /// Deepest ATX heading level that starts a new chunk
    pub heading_level: u8,
    /// Drop and recreate the collection before ingesting
    pub reset: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Store,
            batch_size: DEFAULT_BATCH_SIZE,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            heading_level: 1,
            reset: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Unsupported embedding function type: {0} (expected 'api', 'local' or 'default')")]
    UnsupportedProvider(String),
    #[error("Unsupported embedding mode: {0} (expected 'store' or 'explicit')")]
    UnsupportedMode(String),
    #[error("Unsupported distance metric: {0} (expected 'l2' or 'cosine')")]
    UnsupportedDistance(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(usize),
    #[error("Invalid max text length: {0} (must be between 1 and 100000)")]
    InvalidMaxTextLength(usize),
    #[error("Invalid heading level: {0} (must be between 1 and 6)")]
    InvalidHeadingLevel(u8),
    #[error("Invalid search limit: {0} (must be at least 1)")]
    InvalidSearchLimit(usize),
    #[error("Invalid temperature: {0} (must be between 0 and 2)")]
    InvalidTemperature(f32),
    #[error("Invalid collection name: {0:?} (cannot be empty)")]
    InvalidCollectionName(String),
    #[error("Invalid database name: {0:?} (cannot be empty)")]
    InvalidDatabaseName(String),
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnvValue { name: &'static str, value: String },
    #[error("Missing credential: set {0} in the environment or .env file")]
    MissingCredential(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "api" => Ok(Self::Api),
            "local" => Ok(Self::Local),
            "default" => Ok(Self::Default),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl FromStr for EmbeddingMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "store" => Ok(Self::Store),
            "explicit" => Ok(Self::Explicit),
            other => Err(ConfigError::UnsupportedMode(other.to_string())),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment overrides.
    ///
    /// When `config_file` is `None`, the per-user config file is read if it exists.
    #[inline]
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let path = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_file().filter(|path| path.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config
            .apply_env(|name| std::env::var(name).ok())
            .context("Failed to read configuration from environment")?;

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// `<config dir>/rag-search/config.toml`
    #[inline]
    pub fn default_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rag-search").join("config.toml"))
    }

    /// Override settings from environment-style variables.
    ///
    /// `lookup` returns the value of a variable, or `None` when unset. Empty
    /// values count as unset.
    #[inline]
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("EMBEDDING_FUNCTION_TYPE") {
            self.embedding.provider = value.parse()?;
        }
        if let Some(value) = get("EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(value);
        }
        if let Some(value) = get("EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = get("EMBEDDING_MODEL_NAME") {
            self.embedding.model = value;
        }
        if let Some(value) = get("OLLAMA_URL") {
            self.embedding.ollama_url = value;
        }
        if let Some(value) = get("OLLAMA_MODEL") {
            self.embedding.ollama_model = value;
        }

        if let Some(value) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(value);
        }
        if let Some(value) = get("OPENAI_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = get("OPENAI_MODEL_NAME") {
            self.llm.model = value;
        }

        if let Some(value) = get("VECTOR_DB_DIR") {
            self.store.path = PathBuf::from(value);
        }
        if let Some(value) = get("VECTOR_DB_NAME") {
            self.store.database = value;
        }
        if let Some(value) = get("COLLECTION_NAME") {
            self.store.collection = value;
        }
        if let Some(value) = get("DISTANCE_METRIC") {
            self.store.distance = value.parse()?;
        }

        if let Some(value) = get("EMBEDDING_MODE") {
            self.ingest.mode = value.parse()?;
        }
        if let Some(value) = get("INGEST_BATCH_SIZE") {
            self.ingest.batch_size = parse_number("INGEST_BATCH_SIZE", &value)?;
        }
        if let Some(value) = get("MAX_TEXT_LENGTH") {
            self.ingest.max_text_length = parse_number("MAX_TEXT_LENGTH", &value)?;
        }

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.llm.validate()?;
        self.store.validate()?;
        self.ingest.validate()?;
        Ok(())
    }

    /// Directory holding the LanceDB database used for this configuration
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.store.path.join(&self.store.database)
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.base_url)?;
        validate_url(&self.ollama_url)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        if self.ollama_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.ollama_model.clone()));
        }

        Ok(())
    }

    /// API key for the remote provider, required only when that provider is selected
    #[inline]
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential("EMBEDDING_API_KEY"))
    }
}

impl LlmConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.base_url)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        for temperature in [self.temperature, self.summary_temperature] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidTemperature(temperature));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential("OPENAI_API_KEY"))
    }
}

impl StoreConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollectionName(self.collection.clone()));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::InvalidDatabaseName(self.database.clone()));
        }
        if self.search_limit == 0 {
            return Err(ConfigError::InvalidSearchLimit(self.search_limit));
        }
        Ok(())
    }
}

impl IngestConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.max_text_length == 0 || self.max_text_length > 100_000 {
            return Err(ConfigError::InvalidMaxTextLength(self.max_text_length));
        }
        if !(1..=6).contains(&self.heading_level) {
            return Err(ConfigError::InvalidHeadingLevel(self.heading_level));
        }
        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

fn parse_number(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvValue {
            name,
            value: value.to_string(),
        })
}
