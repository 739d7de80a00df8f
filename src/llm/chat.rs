//! Client for OpenAI-compatible chat-completion APIs (Groq by default).

use crate::config::LlmConfig;
use crate::error::{GraphragError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: usize,
}

impl ChatClient {
    /// Create a client for `model` against the Groq endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GraphragError::InvalidInput("LLM API key is empty".to_string()));
        }

        Ok(Self {
            http: build_client(Duration::from_secs(120))?,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            max_retries: 0,
        })
    }

    /// Create a client from the `[llm]` config section.
    pub fn from_config(config: &LlmConfig, api_key: String) -> Result<Self> {
        let mut client = Self::new(api_key, config.model.clone())?
            .with_base_url(&config.base_url)
            .with_max_retries(config.max_retries);
        client.http = build_client(config.timeout())?;
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Send `messages` and return the first choice's content.
    ///
    /// 429 and 5xx responses are retried up to `max_retries` times with
    /// exponential backoff starting at 500ms and capped at 30s.
    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut attempt = 0;

        loop {
            match self.try_completion(messages).await {
                Ok(content) => return Ok(content),
                Err((Some(status), e)) if is_retryable(status) && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = retry_backoff(attempt);
                    log::warn!(
                        "LLM call failed ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.max_retries,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err((_, e)) => return Err(e),
            }
        }
    }

    /// Single-turn convenience wrapper.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat_completion(&[ChatMessage::user(prompt)]).await
    }

    async fn try_completion(
        &self,
        messages: &[ChatMessage],
    ) -> std::result::Result<String, (Option<StatusCode>, GraphragError)> {
        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        log::debug!("Sending chat completion to {} ({})", self.base_url, self.model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| (None, GraphragError::Llm(format!("Request failed: {}", e))))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| (Some(status), GraphragError::Llm(format!("Failed to read response: {}", e))))?;

        if !status.is_success() {
            return Err((
                Some(status),
                GraphragError::Llm(format!("API error {}: {}", status, text)),
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| (None, GraphragError::Llm(format!("Failed to parse response: {}", e))))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| (None, GraphragError::Llm("Response contained no choices".to_string())))
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GraphragError::Http(format!("Failed to build HTTP client: {}", e)))
}

fn retry_backoff(attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    let millis = 500u64.saturating_mul(2u64.saturating_pow(exponent));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
