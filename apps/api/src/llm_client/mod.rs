/// LLM Client — the single point of entry for all inference API calls.
///
/// Speaks the OpenAI-compatible chat-completions protocol (Groq by default).
/// One request per answer: failures are surfaced to the caller, never retried.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 256;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for the inference endpoint")]
    MisconfiguredCredentials,

    #[error("inference endpoint unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("inference endpoint returned no answer")]
    UpstreamEmptyResponse,
}

/// Answers a fully built prompt.
///
/// Carried in `AppState` as `Arc<dyn AnswerService>`.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn answer(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed content of the first choice, if non-blank.
    pub fn answer(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::UpstreamUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnswerService for LlmClient {
    async fn answer(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::MisconfiguredCredentials)?;

        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                warn!("LLM request failed: {e}");
                LlmError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            return Err(LlmError::UpstreamUnavailable(format!("status {status}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("invalid response body: {e}")))?;

        let answer = completion
            .answer()
            .ok_or(LlmError::UpstreamEmptyResponse)?
            .to_string();

        debug!("LLM call succeeded: {} chars", answer.len());
        Ok(answer)
    }
}
