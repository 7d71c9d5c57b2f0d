
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::RagError;
use crate::config::LlmConfig;
use crate::embeddings::openai::{build_agent, endpoint_url, post_json};

pub const ANSWER_ERROR_PREFIX: &str = "Sorry, an error occurred while generating the answer: ";
pub const SUMMARY_ERROR_PREFIX: &str = "Error occurred while generating summary: ";

const ANSWER_SYSTEM_PROMPT: &str = "You are an intelligent assistant that can answer user questions based on provided context information.
Please provide accurate and detailed answers based on the given context content.
If there is insufficient information in the context to answer the question, please honestly indicate this.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a professional text summarization assistant. Please generate concise and accurate summaries for user-provided text.
The summary should contain the main points and key information of the text.";

/// Chat client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct LlmClient {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    summary_temperature: f32,
    max_tokens: Option<u32>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    /// Build a client from config; fails when no API key is configured
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self, RagError> {
        let api_key = config.require_api_key()?.to_string();

        Ok(Self {
            endpoint: endpoint_url(&config.base_url, "chat/completions"),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            summary_temperature: config.summary_temperature,
            max_tokens: config.max_tokens,
            agent: build_agent(config.timeout_seconds),
        })
    }

    /// Answer `question` from `context`.
    ///
    /// Never fails: errors come back as text starting with [`ANSWER_ERROR_PREFIX`].
    #[inline]
    pub fn answer(&self, context: &str, question: &str) -> String {
        let prompt = answer_prompt(context, question);
        match self.complete(
            ANSWER_SYSTEM_PROMPT,
            &prompt,
            self.temperature,
            self.max_tokens,
        ) {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error generating LLM response: {}", e);
                format!("{}{}", ANSWER_ERROR_PREFIX, e)
            }
        }
    }

    /// Summarize `text`.
    ///
    /// Never fails: errors come back as text starting with [`SUMMARY_ERROR_PREFIX`].
    #[inline]
    pub fn summarize(&self, text: &str) -> String {
        let prompt = summary_prompt(text);
        match self.complete(SUMMARY_SYSTEM_PROMPT, &prompt, self.summary_temperature, None) {
            Ok(summary) => summary,
            Err(e) => {
                error!("Error generating summary: {}", e);
                format!("{}{}", SUMMARY_ERROR_PREFIX, e)
            }
        }
    }

    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, RagError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
            max_tokens,
        };

        debug!(
            "Requesting chat completion from {} (model: {}, temperature: {})",
            self.endpoint, self.model, temperature
        );
        let response_text = post_json(&self.agent, &self.endpoint, Some(&self.api_key), &request)?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Llm(format!("Failed to parse chat response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::Llm("Chat response contained no message".to_string()))
    }
}

fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Please answer the question based on the following context information:

<Context>
{context}
</Context>

<Question>
{question}
</Question>

Please provide an accurate and helpful answer:"
    )
}

fn summary_prompt(text: &str) -> String {
    format!(
        "Please generate a summary for the following text:

{text}

Summary:"
    )
}
