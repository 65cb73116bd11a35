/// LLM client: the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the chat API directly.
/// Embeddings go through `retrieval::embedder`, which reuses this module's
/// HTTP plumbing and retry executor.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

pub mod prompts;
pub mod retry;

use prompts::{build_user_message, QA_SYSTEM};
use retry::{with_backoff, RetryPolicy};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("LLM returned no choices")]
    EmptyChoices,
}

impl LlmError {
    /// Whether another attempt might succeed without changing the request.
    ///
    /// Server-side failures (5xx) and 408/409 are retried. Every other 4xx
    /// means the request itself is wrong and is returned straight away.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::Connection(_) | LlmError::RateLimited(_) => true,
            LlmError::Api { status, .. } => *status >= 500 || matches!(*status, 408 | 409),
            LlmError::Config(_)
            | LlmError::Http(_)
            | LlmError::InvalidResponse(_)
            | LlmError::EmptyChoices => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            // A body error means the connection dropped mid-response.
            LlmError::Connection(err.to_string())
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Http(err)
        }
    }
}

/// Maps a non-success HTTP status plus body to the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<OpenAiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status.as_u16() {
        429 => LlmError::RateLimited(message),
        code => LlmError::Api {
            status: code,
            message,
        },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first completion choice, verbatim.
    pub fn into_text(self) -> Result<String, LlmError> {
        let usage = self.usage;
        let text = self
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyChoices)?
            .message
            .content
            .unwrap_or_default();
        if let Some(usage) = usage {
            debug!(
                "Chat call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP plumbing
// ────────────────────────────────────────────────────────────────────────────

/// Authenticated JSON-over-HTTP access to an OpenAI-compatible API.
/// Performs exactly one request per call; retrying is the caller's job.
#[derive(Clone)]
pub struct OpenAiHttp {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiHttp {
    /// Fails fast when the credential is missing or blank.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("API key is not configured".to_string()));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

/// One chat-completion round trip. Swappable so the retry behaviour can be
/// exercised without a network.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn create(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}

#[async_trait]
impl ChatTransport for OpenAiHttp {
    async fn create(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.post_json("chat/completions", request).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The chat client used by every QA pipeline.
/// Wraps a transport with the retry policy and the question-answering prompt.
#[derive(Clone)]
pub struct LlmClient {
    transport: Arc<dyn ChatTransport>,
    model: String,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = OpenAiHttp::new(config)?;
        Ok(Self::with_transport(
            Arc::new(http),
            config.chat_model.clone(),
            config.retry.clone(),
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn ChatTransport>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            retry,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `messages` and returns the first choice's text.
    /// Transient failures are retried per the configured policy.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
        };
        let transport = &self.transport;
        let request = &request;
        let response =
            with_backoff(&self.retry, "Chat completion", move || transport.create(request))
                .await?;
        response.into_text()
    }

    /// Answers `question` using `docs` as the only reference material.
    /// The reply is expected to end with a `SOURCES:` section.
    pub async fn send_chat_message(&self, docs: &str, question: &str) -> Result<String, LlmError> {
        let messages = vec![
            ChatMessage::system(QA_SYSTEM),
            ChatMessage::user(build_user_message(docs, question)),
        ];
        self.chat(messages).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays a fixed script of results and records every request it sees.
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn create(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted transport ran out of responses");
            next.map(|text| ChatResponse {
                choices: vec![Choice {
                    message: ChoiceMessage {
                        content: Some(text),
                    },
                }],
                usage: None,
            })
        }
    }
}
