#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::RagError;
use crate::config::EmbeddingConfig;

/// Client for an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbedder {
    /// Build a client from config; fails when no API key is configured
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let api_key = config.require_api_key()?.to_string();

        Ok(Self {
            endpoint: endpoint_url(&config.base_url, "embeddings"),
            api_key,
            model: config.model.clone(),
            agent: build_agent(config.timeout_seconds),
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed all `texts` in one request, preserving input order
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        debug!(
            "Requesting {} embeddings from {} (model: {})",
            texts.len(),
            self.endpoint,
            self.model
        );

        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let response_text = post_json(&self.agent, &self.endpoint, Some(&self.api_key), &request)?;

        let mut response: EmbeddingsResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                RagError::Embedding(format!("Failed to parse embedding response: {}", e))
            })?;
        response.data.sort_by_key(|item| item.index);

        Ok(response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}

/// `base_url` with `path` appended, tolerating a trailing slash on the base
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

pub(crate) fn build_agent(timeout_seconds: u64) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(timeout_seconds)))
        .http_status_as_error(false)
        .build()
        .into()
}

/// POST a JSON body and return the response text.
///
/// Transport failures and non-success statuses both become [`RagError::Network`].
pub(crate) fn post_json<T: Serialize>(
    agent: &ureq::Agent,
    url: &str,
    bearer_token: Option<&str>,
    body: &T,
) -> Result<String, RagError> {
    let request_json = serde_json::to_string(body)
        .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to serialize request: {}", e)))?;

    let mut request = agent
        .post(url)
        .header("Content-Type", "application/json");
    if let Some(token) = bearer_token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }

    let mut response = request
        .send(&request_json)
        .map_err(|e| RagError::Network(format!("Request to {} failed: {}", url, e)))?;

    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| RagError::Network(format!("Failed to read response from {}: {}", url, e)))?;

    if !status.is_success() {
        return Err(RagError::Network(format!(
            "{} returned HTTP {}: {}",
            url,
            status.as_u16(),
            text.trim()
        )));
    }

    Ok(text)
}
