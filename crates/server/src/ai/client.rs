//! Language model boundary and the Anthropic Messages API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

const API_PATH: &str = "/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Errors from a language model call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("Language model request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Language model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("No text content in response")]
    EmptyResponse,

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),
}

impl From<trialqa_core::CoreError> for LlmError {
    fn from(err: trialqa_core::CoreError) -> Self {
        LlmError::Prompt(err.to_string())
    }
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::Decode(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

/// A model that completes a prompt with text.
///
/// Shared by every stage; implementations must be stateless between calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Client for the Anthropic Claude Messages API
#[derive(Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Individual content block within a response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Request body for the Messages API
#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

/// Response from the Messages API
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[allow(dead_code)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Error detail from the Messages API
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ClaudeClient {
    /// Create a new client from model configuration
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}{}", config.base_url.trim_end_matches('/'), API_PATH),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Send a single user message and return the raw API response
    pub async fn send(&self, user_message: &str) -> Result<ApiResponse, LlmError> {
        let request = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api { status, message });
        }

        response.json::<ApiResponse>().await.map_err(LlmError::from)
    }
}

/// Extract the first non-blank text block from an API response
pub fn extract_text(response: &ApiResponse) -> Result<String, LlmError> {
    response
        .content
        .iter()
        .find_map(|block| match block {
            ContentBlock::Text { text } if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        })
        .ok_or(LlmError::EmptyResponse)
}

#[async_trait]
impl LanguageModel for ClaudeClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.send(prompt).await?;
        tracing::debug!(
            model = %self.model,
            stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
            "Language model call finished"
        );
        extract_text(&response)
    }
}
