
use super::{
    CollectionStats, DistanceMetric, EmbeddingRecord, QueryResult, similarity_from_distance,
};
use crate::RagError;
use crate::embeddings::EmbeddingProvider;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Upper bound on rows scanned when counting distinct source files
pub const STATS_SAMPLE_LIMIT: usize = 10_000;

const DISTANCE_METADATA_KEY: &str = "distance_metric";

/// A named LanceDB table with a fixed vector dimension and distance metric
pub struct Collection {
    table: Table,
    name: String,
    dimension: usize,
    metric: DistanceMetric,
    embedder: Option<Arc<EmbeddingProvider>>,
}

impl Collection {
    /// Get a collection by name, creating it if needed.
    ///
    /// With `reset` set, an existing collection is dropped first and every
    /// stored record is lost. Without it, an existing collection is reused and
    /// must have been created with the same `dimension`.
    #[inline]
    pub async fn get_or_create(
        connection: &Connection,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
        reset: bool,
    ) -> Result<Self, RagError> {
        if dimension == 0 {
            return Err(RagError::Database(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }

        let exists = Self::exists(connection, name).await?;

        if exists && reset {
            info!("Collection '{}' already exists, deleting old data", name);
            connection
                .drop_table(name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        } else if exists {
            let collection = Self::open(connection, name).await?;
            if collection.dimension != dimension {
                return Err(RagError::Database(format!(
                    "Collection '{}' has dimension {} but embeddings have dimension {}; re-ingest with reset enabled",
                    name, collection.dimension, dimension
                )));
            }
            info!(
                "Reusing collection '{}' (dimension: {}, metric: {})",
                name, collection.dimension, collection.metric
            );
            return Ok(collection);
        }

        let table = connection
            .create_empty_table(name, create_schema(dimension, metric)?)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        info!(
            "Collection '{}' ready (dimension: {}, metric: {})",
            name, dimension, metric
        );

        Ok(Self {
            table,
            name: name.to_string(),
            dimension,
            metric,
            embedder: None,
        })
    }

    /// Open an existing collection, reading its dimension and metric from the stored schema
    #[inline]
    pub async fn open(connection: &Connection, name: &str) -> Result<Self, RagError> {
        let table = connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table '{}': {}", name, e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        let dimension = detect_vector_dimension(&schema)?;
        let metric = match schema.metadata().get(DISTANCE_METADATA_KEY) {
            Some(value) => value
                .parse()
                .map_err(|e| RagError::Database(format!("Invalid stored metric: {}", e)))?,
            None => {
                warn!(
                    "Collection '{}' has no stored distance metric, assuming {}",
                    name,
                    DistanceMetric::default()
                );
                DistanceMetric::default()
            }
        };

        debug!(
            "Opened collection '{}' (dimension: {}, metric: {})",
            name, dimension, metric
        );

        Ok(Self {
            table,
            name: name.to_string(),
            dimension,
            metric,
            embedder: None,
        })
    }

    /// Check whether a collection with this name exists
    #[inline]
    pub async fn exists(connection: &Connection, name: &str) -> Result<bool, RagError> {
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|table| table == name))
    }

    /// Let the collection compute vectors for records inserted without one
    #[inline]
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Insert or overwrite records as a single batch, keyed on record id.
    ///
    /// Records without a vector are embedded with the attached provider.
    /// Returns the number of records written.
    #[inline]
    pub async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<usize, RagError> {
        if records.is_empty() {
            debug!("No records to insert");
            return Ok(0);
        }

        let count = records.len();
        match self.try_insert(records).await {
            Ok(()) => {
                debug!("Inserted {} records into '{}'", count, self.name);
                Ok(count)
            }
            Err(e) => {
                error!("Error inserting {} records into '{}': {}", count, self.name, e);
                Err(e)
            }
        }
    }

    async fn try_insert(&self, records: Vec<EmbeddingRecord>) -> Result<(), RagError> {
        let vectors = self.resolve_vectors(&records)?;
        let record_batch = create_record_batch(&records, &vectors, self.dimension, self.metric)?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = self.table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        Ok(())
    }

    /// Vectors for every record, in order, embedding documents that lack one
    fn resolve_vectors(&self, records: &[EmbeddingRecord]) -> Result<Vec<Vec<f32>>, RagError> {
        let missing: Vec<String> = records
            .iter()
            .filter(|record| record.vector.is_none())
            .map(|record| record.document.clone())
            .collect();

        let computed = if missing.is_empty() {
            Vec::new()
        } else {
            let embedder = self.embedder.as_ref().ok_or_else(|| {
                RagError::Database(format!(
                    "Collection '{}' has no embedding provider for {} records without vectors",
                    self.name,
                    missing.len()
                ))
            })?;
            embedder.embed(&missing)?
        };
        let mut computed = computed.into_iter();

        let mut vectors = Vec::with_capacity(records.len());
        for record in records {
            let vector = match &record.vector {
                Some(vector) => vector.clone(),
                None => computed.next().ok_or_else(|| {
                    RagError::Embedding(format!("Provider returned no vector for '{}'", record.id))
                })?,
            };

            if vector.len() != self.dimension {
                return Err(RagError::Database(format!(
                    "Record '{}' has dimension {} but collection '{}' expects {}",
                    record.id,
                    vector.len(),
                    self.name,
                    self.dimension
                )));
            }
            vectors.push(vector);
        }

        Ok(vectors)
    }

    /// Find the `limit` nearest records to `query_vector`, nearest first.
    ///
    /// An empty collection yields an empty result.
    #[inline]
    pub async fn query(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<QueryResult>, RagError> {
        debug!("Searching '{}' with limit: {}", self.name, limit);

        if limit == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension {
            return Err(RagError::Database(format!(
                "Query vector has dimension {} but collection '{}' expects {}",
                query_vector.len(),
                self.name,
                self.dimension
            )));
        }

        let mut results = self
            .table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(self.metric.into())
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut query_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            query_results.extend(parse_query_batch(&batch)?);
        }

        debug!("Search returned {} results", query_results.len());
        Ok(query_results)
    }

    /// Total number of stored records
    #[inline]
    pub async fn count(&self) -> Result<u64, RagError> {
        let count = self
            .table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    /// Record count and distinct source files; zero counts if the store cannot be read
    #[inline]
    pub async fn stats(&self) -> CollectionStats {
        match self.try_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Error getting stats for '{}': {}", self.name, e);
                CollectionStats::default()
            }
        }
    }

    async fn try_stats(&self) -> Result<CollectionStats, RagError> {
        let total_embeddings = self.count().await?;

        let mut stream = self
            .table
            .query()
            .select(Select::columns(&["source_file"]))
            .limit(STATS_SAMPLE_LIMIT)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to scan collection: {}", e)))?;

        let mut source_files = HashSet::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read scan stream: {}", e)))?
        {
            let column = string_column(&batch, "source_file")?;
            for row in 0..batch.num_rows() {
                if !column.is_null(row) && !column.value(row).is_empty() {
                    source_files.insert(column.value(row).to_string());
                }
            }
        }

        Ok(CollectionStats {
            total_embeddings,
            unique_source_files: source_files.len(),
        })
    }
}

/// Arrow list size for a vector dimension
fn list_size(dimension: usize) -> Result<i32, RagError> {
    i32::try_from(dimension).map_err(|_| {
        RagError::Database(format!("Vector dimension {} is too large", dimension))
    })
}

/// Schema with the given vector dimension, tagged with the distance metric
fn create_schema(dimension: usize, metric: DistanceMetric) -> Result<Arc<Schema>, RagError> {
    let metadata = HashMap::from([(
        DISTANCE_METADATA_KEY.to_string(),
        metric.as_str().to_string(),
    )]);

    Ok(Arc::new(Schema::new_with_metadata(
        vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    list_size(dimension)?,
                ),
                false,
            ),
            Field::new("source_file", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
        ],
        metadata,
    )))
}

fn detect_vector_dimension(schema: &Schema) -> Result<usize, RagError> {
    for field in schema.fields() {
        if field.name() == "vector" {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                return usize::try_from(*size).map_err(|_| {
                    RagError::Database(format!("Invalid vector dimension {}", size))
                });
            }
        }
    }

    Err(RagError::Database(
        "Could not find vector column or determine dimension".to_string(),
    ))
}

fn create_record_batch(
    records: &[EmbeddingRecord],
    vectors: &[Vec<f32>],
    dimension: usize,
    metric: DistanceMetric,
) -> Result<RecordBatch, RagError> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut documents = Vec::with_capacity(len);
    let mut source_files = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        documents.push(record.document.as_str());
        source_files.push(record.metadata.source_file.as_str());
        chunk_indices.push(record.metadata.chunk_index);
    }

    let mut flat_values = Vec::with_capacity(len * dimension);
    for vector in vectors {
        flat_values.extend_from_slice(vector);
    }
    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, list_size(dimension)?, Arc::new(values_array), None)
            .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(documents)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(source_files)),
        Arc::new(UInt32Array::from(chunk_indices)),
    ];

    RecordBatch::try_new(create_schema(dimension, metric)?, arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

fn string_column<'batch>(
    batch: &'batch RecordBatch,
    name: &str,
) -> Result<&'batch StringArray, RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_query_batch(batch: &RecordBatch) -> Result<Vec<QueryResult>, RagError> {
    let ids = string_column(batch, "id")?;
    let documents = string_column(batch, "document")?;
    let source_files = string_column(batch, "source_file")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| RagError::Database("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database("Invalid chunk_index column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| RagError::Database("Invalid _distance column type".to_string()))?;

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if distances.is_null(row) {
            return Err(RagError::Database(format!(
                "Missing distance for result '{}'",
                ids.value(row)
            )));
        }
        let distance = distances.value(row);

        results.push(QueryResult {
            id: ids.value(row).to_string(),
            document: documents.value(row).to_string(),
            similarity: similarity_from_distance(distance),
            source_file: source_files.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            distance,
        });
    }

    Ok(results)
}
