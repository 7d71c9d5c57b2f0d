// Database module
// Vector storage for chunk embeddings, backed by an embedded LanceDB instance

pub mod lancedb;

pub use self::lancedb::{
    ChunkMetadata, CollectionStats, ConnectionPool, DistanceMetric, EmbeddingRecord, QueryResult,
    vector_store::Collection,
};
