
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::openai::{build_agent, post_json};
use crate::RagError;
use crate::config::EmbeddingConfig;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let base_url = Url::parse(&config.ollama_url).map_err(|e| {
            RagError::Config(format!("Invalid Ollama URL '{}': {}", config.ollama_url, e))
        })?;

        Ok(Self {
            base_url,
            model: config.ollama_model.clone(),
            agent: build_agent(config.timeout_seconds),
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate embeddings for multiple text inputs in a single request
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| RagError::Config(format!("Failed to build embedding URL: {}", e)))?;

        let request = BatchEmbedRequest {
            model: &self.model,
            inputs: texts,
        };
        let response_text = post_json(&self.agent, url.as_str(), None, &request)?;

        let batch_response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| {
                RagError::Embedding(format!("Failed to parse batch embedding response: {}", e))
            })?;

        if batch_response.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                batch_response.embeddings.len()
            )));
        }

        debug!("Generated {} embeddings", batch_response.embeddings.len());
        Ok(batch_response.embeddings)
    }
}
