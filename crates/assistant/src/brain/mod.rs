//! Generative-text client used when a query is not arithmetic.
//!
//! `LLMClient` wraps a provider with a bounded constant-delay retry. It never
//! fails outward: missing configuration and exhausted retries both turn into a
//! fixed, speakable sentence.

use std::{sync::Arc, time::Duration};

use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod providers;

pub use providers::{GeminiProvider, LLMProviderTrait, ProviderError};

pub const CONFIG_ERROR_REPLY: &str = "Configuration error: missing API key or model.";
pub const APOLOGY_REPLY: &str =
    "Sorry, there was a temporary issue connecting to the assistant. Please try again.";

pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 800;

/// Configuration for the generative-text backend
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
pub struct LLMConfig {
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            api_base: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl LLMConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Build the persona prompt sent for a general query.
pub fn persona_prompt(command: &str, assistant_name: &str, user_name: &str) -> String {
    format!(
        "You are {assistant_name}, a helpful and intelligent virtual assistant created by {user_name}. \
Your goal is to answer the user's question clearly, logically, and conversationally. \
Always reason through the question before answering, and explain your thought process naturally. \
Avoid robotic responses and unnecessary JSON or markdown unless asked. \
If, and only if, the user asks for the current date, time, day of the week or month, \
reply with nothing but one JSON object such as {{\"type\": \"get-time\"}} using one of \
\"get-date\", \"get-time\", \"get-day\" or \"get-month\". \
The user said: \"{command}\""
    )
}

/// Retrying wrapper around a provider
#[derive(Clone)]
pub struct LLMClient {
    provider: Arc<dyn LLMProviderTrait>,
    max_retries: usize,
    retry_delay: Duration,
}

impl std::fmt::Debug for LLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMClient")
            .field("provider", &self.provider.name())
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl LLMClient {
    pub fn new(provider: Arc<dyn LLMProviderTrait>, max_retries: usize, retry_delay: Duration) -> Self {
        Self {
            provider,
            max_retries,
            retry_delay,
        }
    }

    /// Gemini-backed client from configuration
    pub fn from_config(config: &LLMConfig) -> Self {
        let mut provider = GeminiProvider::new(config.api_key.clone(), config.model.clone());
        if let Some(base) = &config.api_base {
            provider = provider.with_api_base(base.clone());
        }
        Self::new(Arc::new(provider), config.max_retries, config.retry_delay())
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Generate text for `prompt`.
    ///
    /// Makes at most `1 + max_retries` attempts with a constant pause between
    /// them. Returns [`CONFIG_ERROR_REPLY`] without any network call when the
    /// provider is unconfigured and [`APOLOGY_REPLY`] once attempts run out.
    pub async fn generate(&self, prompt: &str) -> String {
        if !self.provider.is_configured() {
            tracing::warn!("{} provider is not configured", self.provider.name());
            return CONFIG_ERROR_REPLY.to_string();
        }

        let result = (|| async { self.provider.generate(prompt).await })
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.retry_delay)
                    .with_max_times(self.max_retries),
            )
            .when(|e: &ProviderError| e.should_retry())
            .notify(|err: &ProviderError, dur: Duration| {
                tracing::warn!(
                    "{} call failed, retrying after {:.2}s: {}",
                    self.provider.name(),
                    dur.as_secs_f64(),
                    err
                );
            })
            .await;

        match result {
            Ok(text) => text,
            Err(ProviderError::ConfigError(message)) => {
                tracing::warn!("{} configuration error: {}", self.provider.name(), message);
                CONFIG_ERROR_REPLY.to_string()
            }
            Err(e) => {
                tracing::error!(
                    "{} failed after {} attempts: {}",
                    self.provider.name(),
                    self.max_retries + 1,
                    e
                );
                APOLOGY_REPLY.to_string()
            }
        }
    }
}
