// Query module
// Retrieves nearest chunks for a question and hands them to the language model

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, info};

use crate::RagError;
use crate::database::lancedb::{QueryResult, vector_store::Collection};
use crate::embeddings::EmbeddingProvider;
use crate::llm::LlmClient;

/// Embeds queries with the same provider used at ingestion and searches one collection
pub struct Retriever {
    collection: Collection,
    provider: Arc<EmbeddingProvider>,
}

/// A generated answer together with the chunks it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<QueryResult>,
}

impl Retriever {
    #[inline]
    pub fn new(collection: Collection, provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            collection,
            provider,
        }
    }

    /// The `limit` chunks nearest to `query`, nearest first
    #[inline]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>, RagError> {
        debug!("Embedding query: {}", query);
        let query_vector = self.provider.embed_one(query)?;
        self.collection.query(&query_vector, limit).await
    }

    /// Retrieve context for `question` and ask the language model to answer it
    #[inline]
    pub async fn ask(
        &self,
        llm: &LlmClient,
        question: &str,
        limit: usize,
    ) -> Result<Answer, RagError> {
        let sources = self.search(question, limit).await?;
        info!("Retrieved {} chunks for question", sources.len());

        let context = format_context(&sources);
        let text = llm.answer(&context, question);

        Ok(Answer { text, sources })
    }
}

/// Render retrieved chunks as a numbered context block, nearest first
#[inline]
pub fn format_context(results: &[QueryResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            format!(
                "[{}] (source: {}, chunk {})\n{}",
                idx + 1,
                result.source_file,
                result.chunk_index,
                result.document
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
