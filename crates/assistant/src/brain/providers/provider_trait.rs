//! Provider trait and error type for text generation backends

use async_trait::async_trait;

/// Error type for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Empty response from provider")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProviderError {
    /// Transport problems, bad statuses and empty payloads are worth another
    /// attempt; missing configuration is not.
    pub fn should_retry(&self) -> bool {
        !matches!(self, ProviderError::ConfigError(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::RequestFailed(err.to_string())
    }
}

/// A hosted model that turns one prompt into one block of text
#[async_trait]
pub trait LLMProviderTrait: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Whether credentials and model are present
    fn is_configured(&self) -> bool;

    /// Generate text for `prompt`. Implementations return the trimmed text and
    /// treat an empty payload as `ProviderError::EmptyResponse`.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
