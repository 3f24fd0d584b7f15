//! Google Gemini `generateContent` provider

use async_trait::async_trait;
use reqwest::Client;

use super::provider_trait::{LLMProviderTrait, ProviderError};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API provider
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    model: Option<String>,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let model = model.filter(|m| !m.trim().is_empty());

        if api_key.is_none() || model.is_none() {
            tracing::warn!("Gemini provider created without API key or model - queries will return a configuration error");
        } else {
            tracing::info!(
                "Gemini provider initialized with model {}",
                model.as_deref().unwrap_or_default()
            );
        }

        Self {
            client: Client::new(),
            api_key,
            model,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point at a different base URL (proxies, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model
        )
    }

    fn request_body(prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        })
    }

    /// Pull `candidates[0].content.parts[0].text` out of a response
    fn parse_response(json: &serde_json::Value) -> Result<String, ProviderError> {
        let text = json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl LLMProviderTrait for GeminiProvider {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.model.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let (Some(api_key), Some(model)) = (self.api_key.as_deref(), self.model.as_deref()) else {
            return Err(ProviderError::ConfigError(
                "GEMINI_API_KEY and GEMINI_MODEL must be set".to_string(),
            ));
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Self::parse_response(&json)
    }
}
