use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::retry::RetryPolicy;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Application configuration loaded from environment variables.
/// Built once at startup and handed to every constructor that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub search_top_k: usize,
    pub max_upload_bytes: usize,
    pub max_full_content_chars: usize,
    pub port: u16,
    pub rust_log: String,
}

/// Everything the chat and embeddings clients need to reach the API.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub retry: RetryPolicy,
}

// Hand-written so the credential never ends up in logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: optional_env("LLM_MAX_ATTEMPTS", defaults.max_attempts)?,
            multiplier: defaults.multiplier,
            min_delay: Duration::from_secs(optional_env(
                "LLM_BACKOFF_MIN_SECS",
                defaults.min_delay.as_secs(),
            )?),
            max_delay: Duration::from_secs(optional_env(
                "LLM_BACKOFF_MAX_SECS",
                defaults.max_delay.as_secs(),
            )?),
        };
        let llm = LlmConfig {
            api_key: require_env("OPENAI_API_KEY")?,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
            chat_model: std::env::var("CHAT_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            retry,
        };

        let config = Config {
            llm,
            search_top_k: optional_env("SEARCH_TOP_K", 5)?,
            max_upload_bytes: optional_env("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            max_full_content_chars: optional_env("MAX_FULL_CONTENT_CHARS", 60_000)?,
            port: optional_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would break the retry executor or make every
    /// search empty.
    pub fn validate(&self) -> Result<()> {
        let retry = &self.llm.retry;
        if retry.max_attempts == 0 {
            bail!("LLM_MAX_ATTEMPTS must be at least 1");
        }
        // Duration::clamp panics when min > max
        if retry.min_delay > retry.max_delay {
            bail!("LLM_BACKOFF_MIN_SECS must not exceed LLM_BACKOFF_MAX_SECS");
        }
        if self.search_top_k == 0 {
            bail!("SEARCH_TOP_K must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
impl Config {
    /// Defaults with a dummy credential.
    pub fn for_tests() -> Self {
        Config {
            llm: LlmConfig {
                api_key: "sk-test".to_string(),
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                chat_model: DEFAULT_CHAT_MODEL.to_string(),
                embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
                retry: RetryPolicy::default(),
            },
            search_top_k: 5,
            max_upload_bytes: 1024 * 1024,
            max_full_content_chars: 60_000,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.trim().is_empty() {
        bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
