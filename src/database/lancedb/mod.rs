// LanceDB vector database module
// Handles connections, record types and similarity scoring for stored embeddings


pub mod vector_store;

use lancedb::{Connection, DistanceType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::RagError;
use crate::config::ConfigError;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Stable identifier, see [`record_id`]
    pub id: String,
    /// The chunk text
    pub document: String,
    /// Precomputed vector; `None` lets the collection embed the document itself
    pub vector: Option<Vec<f32>>,
    pub metadata: ChunkMetadata,
}

/// Metadata stored alongside each embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the source file, relative to the ingested directory
    pub source_file: String,
    /// Zero-based position of the chunk within its file
    pub chunk_index: u32,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(
        source_file: &str,
        chunk_index: u32,
        document: String,
        vector: Option<Vec<f32>>,
    ) -> Self {
        Self {
            id: record_id(source_file, chunk_index),
            document,
            vector,
            metadata: ChunkMetadata {
                source_file: source_file.to_string(),
                chunk_index,
            },
        }
    }
}

/// Identifier for the chunk at `chunk_index` of `source_file`
#[inline]
pub fn record_id(source_file: &str, chunk_index: u32) -> String {
    format!("{}_{}", source_file, chunk_index)
}

/// Distance metric a collection is configured with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    Cosine,
}

impl DistanceMetric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = ConfigError;

    #[inline]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            other => Err(ConfigError::UnsupportedDistance(other.to_string())),
        }
    }
}

impl From<DistanceMetric> for DistanceType {
    #[inline]
    fn from(metric: DistanceMetric) -> Self {
        match metric {
            DistanceMetric::L2 => Self::L2,
            DistanceMetric::Cosine => Self::Cosine,
        }
    }
}

/// Display score derived from a raw distance.
///
/// Strictly decreasing in `distance`, equal to 1 at distance 0. Never used for ranking.
/// Expects a non-negative distance, as produced by L2 and cosine.
#[inline]
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub id: String,
    pub document: String,
    pub similarity: f32,
    pub source_file: String,
    pub chunk_index: u32,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_embeddings: u64,
    pub unique_source_files: usize,
}

/// Open LanceDB connections keyed by `(path, database_name)`.
///
/// Owned by the entry point and passed down; connections live as long as the pool.
#[derive(Default)]
pub struct ConnectionPool {
    connections: HashMap<(PathBuf, String), Connection>,
}

impl ConnectionPool {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `database_name` under `path`, reusing an existing connection when present
    #[inline]
    pub async fn connect(
        &mut self,
        path: &Path,
        database_name: &str,
    ) -> Result<Connection, RagError> {
        let key = (path.to_path_buf(), database_name.to_string());
        if let Some(connection) = self.connections.get(&key) {
            debug!(
                "Reusing LanceDB connection: path={}, database={}",
                path.display(),
                database_name
            );
            return Ok(connection.clone());
        }

        let db_path = path.join(database_name);
        std::fs::create_dir_all(&db_path).map_err(|e| {
            RagError::Database(format!(
                "Failed to create vector database directory {}: {}",
                db_path.display(),
                e
            ))
        })?;

        info!(
            "Connecting to LanceDB: path={}, database={}",
            path.display(),
            database_name
        );
        let connection = lancedb::connect(&db_path.to_string_lossy())
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        self.connections.insert(key, connection.clone());
        Ok(connection)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
