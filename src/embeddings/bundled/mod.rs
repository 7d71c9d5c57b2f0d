use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::RagError;

const MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Sentence-embedding model run in-process through ONNX Runtime.
///
/// Weights are downloaded to the fastembed cache on first use.
pub struct BundledModel {
    model: Mutex<TextEmbedding>,
}

impl BundledModel {
    #[inline]
    pub fn load() -> Result<Self, RagError> {
        info!("Loading bundled embedding model {}", MODEL_NAME);
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| {
            RagError::Embedding(format!("Failed to load embedding model {}: {}", MODEL_NAME, e))
        })?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        MODEL_NAME
    }

    #[inline]
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        debug!("Embedding {} texts with {}", texts.len(), MODEL_NAME);
        let mut model = self
            .model
            .lock()
            .map_err(|_| RagError::Embedding("Embedding model lock poisoned".to_string()))?;

        model.embed(texts.to_vec(), None).map_err(|e| {
            RagError::Embedding(format!("Embedding with {} failed: {}", MODEL_NAME, e))
        })
    }
}

impl std::fmt::Debug for BundledModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundledModel")
            .field("model", &MODEL_NAME)
            .finish()
    }
}
