// Indexer module
// Turns a directory of markdown files into stored embeddings


use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use tracing::{debug, info, warn};

use crate::RagError;
use crate::config::{EmbeddingMode, IngestConfig, StoreConfig};
use crate::database::lancedb::{DistanceMetric, EmbeddingRecord, vector_store::Collection};
use crate::embeddings::chunking::{
    Chunk, ChunkingConfig, DocumentSet, load_markdown_files, prepare_chunks,
};
use crate::embeddings::{EmbeddingOutcome, EmbeddingProvider};

/// Sequential ingestion pipeline: load, chunk, embed, insert in fixed-size batches
pub struct Indexer {
    provider: Arc<EmbeddingProvider>,
    collection_name: String,
    metric: DistanceMetric,
    settings: IngestConfig,
}

/// Counts from one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub chunks_total: usize,
    pub chunks_inserted: usize,
    /// Chunks dropped because their embedding failed
    pub chunks_skipped: usize,
    pub batches_inserted: usize,
}

impl Indexer {
    #[inline]
    pub fn new(
        provider: Arc<EmbeddingProvider>,
        store: &StoreConfig,
        settings: &IngestConfig,
    ) -> Self {
        Self {
            provider,
            collection_name: store.collection.clone(),
            metric: store.distance,
            settings: settings.clone(),
        }
    }

    /// Ingest every markdown file under `directory` into the configured collection.
    ///
    /// The provider's dimension is probed once before the collection is
    /// created (or reset). Insert failures abort the run.
    #[inline]
    pub async fn ingest(
        &self,
        connection: &Connection,
        directory: &Path,
    ) -> Result<IngestReport, RagError> {
        info!("Ingesting markdown files from {}", directory.display());
        let documents = load_markdown_files(directory, &ChunkingConfig::from(&self.settings))?;

        let dimension = self.provider.probe_dimension()?;
        let mut collection = Collection::get_or_create(
            connection,
            &self.collection_name,
            dimension,
            self.metric,
            self.settings.reset,
        )
        .await?;
        if self.settings.mode == EmbeddingMode::Store {
            collection = collection.with_embedder(Arc::clone(&self.provider));
        }

        let report = self.index_documents(&collection, &documents).await?;
        info!(
            "Ingestion complete: {} chunks inserted from {} files ({} skipped)",
            report.chunks_inserted, report.files_loaded, report.chunks_skipped
        );
        Ok(report)
    }

    /// Insert all chunks of `documents` into `collection`, one insert call per batch
    #[inline]
    pub async fn index_documents(
        &self,
        collection: &Collection,
        documents: &DocumentSet,
    ) -> Result<IngestReport, RagError> {
        let chunks: Vec<Chunk> = prepare_chunks(documents, self.settings.max_text_length).collect();
        let mut report = IngestReport {
            files_found: documents.files_found,
            files_loaded: documents.documents.len(),
            files_skipped: documents.files_skipped,
            chunks_total: chunks.len(),
            ..IngestReport::default()
        };

        if chunks.is_empty() {
            info!("No chunks to ingest");
            return Ok(report);
        }

        let bar = progress_bar(chunks.len());
        for batch in chunks.chunks(self.settings.batch_size.max(1)) {
            let records = self.build_records(batch, &mut report);
            bar.inc(batch.len() as u64);
            if records.is_empty() {
                debug!("Every chunk in batch failed to embed, nothing to insert");
                continue;
            }

            let inserted = collection.insert(records).await?;
            report.chunks_inserted += inserted;
            report.batches_inserted += 1;
            debug!(
                "Batch {} inserted ({} records)",
                report.batches_inserted, inserted
            );
        }
        bar.finish_and_clear();

        Ok(report)
    }

    fn build_records(&self, batch: &[Chunk], report: &mut IngestReport) -> Vec<EmbeddingRecord> {
        match self.settings.mode {
            EmbeddingMode::Store => batch
                .iter()
                .map(|chunk| {
                    EmbeddingRecord::new(
                        &chunk.source_file,
                        chunk.chunk_index,
                        chunk.text.clone(),
                        None,
                    )
                })
                .collect(),
            EmbeddingMode::Explicit => {
                let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
                let outcomes = self.provider.embed_each(&texts);

                batch
                    .iter()
                    .zip(outcomes)
                    .filter_map(|(chunk, outcome)| match outcome {
                        EmbeddingOutcome::Embedded(vector) => Some(EmbeddingRecord::new(
                            &chunk.source_file,
                            chunk.chunk_index,
                            chunk.text.clone(),
                            Some(vector),
                        )),
                        EmbeddingOutcome::Failed { reason } => {
                            warn!(
                                "Skipping chunk {} of {}: {}",
                                chunk.chunk_index, chunk.source_file, reason
                            );
                            report.chunks_skipped += 1;
                            None
                        }
                    })
                    .collect()
            }
        }
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {bar:40}")
    {
        bar.set_style(style);
    }
    bar
}
