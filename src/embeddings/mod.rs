// Embeddings module
// Markdown chunking plus the providers that turn text into vectors


pub mod bundled;
pub mod chunking;
pub mod ollama;
pub mod openai;

pub use bundled::BundledModel;
pub use chunking::{
    Chunk, ChunkingConfig, DocumentSet, load_markdown_files, prepare_chunks, split_markdown,
    truncate_text,
};
pub use ollama::OllamaClient;
pub use openai::OpenAiEmbedder;

use tracing::{debug, info, warn};

use crate::RagError;
use crate::config::{EmbeddingConfig, ProviderKind};

/// Text used to discover a provider's vector dimension
const PROBE_TEXT: &str = "test";

/// Concrete embedding backend, chosen once from configuration
#[derive(Debug)]
pub enum EmbeddingBackend {
    Remote(OpenAiEmbedder),
    Local(OllamaClient),
    Bundled(BundledModel),
}

impl EmbeddingBackend {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        match self {
            Self::Remote(client) => client.embed(texts),
            Self::Local(client) => client.generate_embeddings_batch(texts),
            Self::Bundled(model) => model.embed(texts),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Remote(client) => format!("api ({})", client.model()),
            Self::Local(client) => format!("local ({})", client.model()),
            Self::Bundled(model) => format!("default ({})", model.model()),
        }
    }
}

/// Result of embedding one text when failures are tolerated
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Embedded(Vec<f32>),
    Failed { reason: String },
}

/// Maps texts to fixed-dimension vectors, truncating overlong input first
#[derive(Debug)]
pub struct EmbeddingProvider {
    backend: EmbeddingBackend,
    max_text_length: usize,
}

impl EmbeddingProvider {
    #[inline]
    pub fn new(backend: EmbeddingBackend, max_text_length: usize) -> Self {
        Self {
            backend,
            max_text_length,
        }
    }

    #[inline]
    pub fn name(&self) -> String {
        self.backend.describe()
    }

    /// One vector per input text, in input order.
    ///
    /// Empty input returns an empty list without contacting the backend.
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|text| truncate_text(text, self.max_text_length).to_string())
            .collect();
        let vectors = self.backend.embed(&truncated)?;

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings but received {}",
                texts.len(),
                vectors.len()
            )));
        }
        if let Some(first) = vectors.first() {
            if first.is_empty() || vectors.iter().any(|vector| vector.len() != first.len()) {
                return Err(RagError::Embedding(
                    "Provider returned vectors of inconsistent dimension".to_string(),
                ));
            }
        }

        debug!("Embedded {} texts with {}", texts.len(), self.name());
        Ok(vectors)
    }

    #[inline]
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::Embedding("Provider returned no embedding".to_string()))
    }

    /// Embed each text independently of the others' failures.
    ///
    /// The whole batch is sent first. If that request fails, each text is sent
    /// once on its own to isolate the bad inputs; nothing is retried after that,
    /// and texts that fail on their own come back as [`EmbeddingOutcome::Failed`].
    #[inline]
    pub fn embed_each(&self, texts: &[String]) -> Vec<EmbeddingOutcome> {
        match self.embed(texts) {
            Ok(vectors) => vectors.into_iter().map(EmbeddingOutcome::Embedded).collect(),
            Err(e) => {
                warn!(
                    "Batch embedding of {} texts failed, embedding individually: {}",
                    texts.len(),
                    e
                );
                texts
                    .iter()
                    .map(|text| match self.embed_one(text) {
                        Ok(vector) => EmbeddingOutcome::Embedded(vector),
                        Err(e) => EmbeddingOutcome::Failed {
                            reason: e.to_string(),
                        },
                    })
                    .collect()
            }
        }
    }

    /// Discover the vector dimension by embedding a probe text
    #[inline]
    pub fn probe_dimension(&self) -> Result<usize, RagError> {
        let dimension = self.embed_one(PROBE_TEXT)?.len();
        info!("Embedding provider {} has dimension {}", self.name(), dimension);
        Ok(dimension)
    }
}

/// Build the provider selected by `config.provider`.
///
/// The `api` provider requires an API key.
#[inline]
pub fn create_embedding_provider(
    config: &EmbeddingConfig,
    max_text_length: usize,
) -> Result<EmbeddingProvider, RagError> {
    let backend = match config.provider {
        ProviderKind::Api => {
            info!("Using OpenAI-compatible embedding API at {}", config.base_url);
            EmbeddingBackend::Remote(OpenAiEmbedder::new(config)?)
        }
        ProviderKind::Local => {
            info!("Using Ollama embeddings at {}", config.ollama_url);
            EmbeddingBackend::Local(OllamaClient::new(config)?)
        }
        ProviderKind::Default => {
            info!("Using bundled embedding model");
            EmbeddingBackend::Bundled(BundledModel::load()?)
        }
    };

    Ok(EmbeddingProvider::new(backend, max_text_length))
}
