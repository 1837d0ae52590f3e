
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{AnswerService, ContextMessage, format_context};
use crate::config::AnthropicConfig;
use crate::{AgentError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant that answers questions based on provided chat context.";

/// Answer service backed by the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ClaudeClient {
    /// Build a client from config; the API key falls back to `ANTHROPIC_API_KEY`
    #[inline]
    pub fn new(config: &AnthropicConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AgentError::Config(e.to_string()))?;
        let api_key = config
            .resolve_api_key()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        let endpoint = Url::parse(&config.base_url)
            .and_then(|base| base.join("/v1/messages"))
            .map_err(|e| AgentError::Config(format!("Invalid Anthropic URL: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            agent,
        })
    }

    fn send(&self, request: &MessagesRequest<'_>) -> anyhow::Result<String> {
        let body = serde_json::to_string(request).context("Failed to serialize request")?;

        let response_text = self
            .agent
            .post(self.endpoint.as_str())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow::anyhow!("Request to {} failed: {}", self.endpoint, e))?;

        let response: MessagesResponse =
            serde_json::from_str(&response_text).context("Failed to parse response")?;

        response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .context("Response contained no text block")
    }
}

/// Prompt wrapping the question and formatted context
#[inline]
pub fn build_prompt(question: &str, context: &[ContextMessage]) -> String {
    format!(
        "You are a helpful AI assistant. Please answer the question based on the following chat context.\n\
         The context is a conversation between people, with each line formatted as \"Name (Time): Message\".\n\
         \n\
         Context:\n\
         {}\n\
         \n\
         Question: {}\n\
         \n\
         Please provide a clear and concise answer based on the context. If the context doesn't contain enough information to answer the question, please say so.",
        format_context(context),
        question
    )
}

impl AnswerService for ClaudeClient {
    #[inline]
    fn answer(&self, question: &str, context: &[ContextMessage]) -> Result<String> {
        let prompt = build_prompt(question, context);
        debug!(
            "Asking {} with {} context messages",
            self.model,
            context.len()
        );

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        self.send(&request)
            .map_err(|e| AgentError::Answer(format!("{:#}", e)))
    }
}
