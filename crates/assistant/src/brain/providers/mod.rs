//! LLM provider implementations

pub mod gemini;
pub mod provider_trait;

pub use gemini::GeminiProvider;
pub use provider_trait::{LLMProviderTrait, ProviderError};
