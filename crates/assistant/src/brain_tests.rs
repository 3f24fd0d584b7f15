//! Tests for the generative-text client

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

    use crate::brain::{
        APOLOGY_REPLY, CONFIG_ERROR_REPLY, GeminiProvider, LLMClient, LLMConfig, LLMProviderTrait,
        ProviderError, persona_prompt,
    };

    /// Fails `failures` times, then answers.
    struct FlakyProvider {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMProviderTrait for FlakyProvider {
        fn name(&self) -> &'static str {
            "Flaky"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ProviderError::RequestFailed("connection reset".to_string()))
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    async fn fake_gemini(status: StatusCode, text: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/models/{model}",
                post(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        status,
                        Json(serde_json::json!({
                            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
                        })),
                    )
                }),
            )
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn config_for(base: &str) -> LLMConfig {
        LLMConfig {
            api_key: Some("test-key".to_string()),
            model: Some("gemini-test".to_string()),
            api_base: Some(base.to_string()),
            max_retries: 2,
            retry_delay_ms: 5,
        }
    }

    #[test]
    fn test_llm_config_default() {
        let config = LLMConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay(), Duration::from_millis(800));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_persona_prompt_wording() {
        let prompt = persona_prompt("tell me a joke", "Nova", "Ada");
        assert!(prompt.starts_with(
            "You are Nova, a helpful and intelligent virtual assistant created by Ada."
        ));
        assert!(prompt.contains("\"get-time\""));
        assert!(prompt.ends_with("The user said: \"tell me a joke\""));
    }

    #[tokio::test]
    async fn test_unconfigured_client_makes_no_request() {
        let (base, hits) = fake_gemini(StatusCode::OK, "hello").await;
        let mut config = config_for(&base);
        config.api_key = None;

        let client = LLMClient::from_config(&config);
        assert!(!client.is_configured());
        assert_eq!(client.generate("hi").await, CONFIG_ERROR_REPLY);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_generation_is_trimmed() {
        let (base, hits) = fake_gemini(StatusCode::OK, "  Hello from the model.\n").await;
        let client = LLMClient::from_config(&config_for(&base));

        assert_eq!(client.generate("hi").await, "Hello from the model.");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persistent_failure_retries_then_apologizes_once() {
        let (base, hits) = fake_gemini(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let client = LLMClient::from_config(&config_for(&base));

        let reply = client.generate("hi").await;
        assert_eq!(reply, APOLOGY_REPLY);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_payload_counts_as_failure() {
        let (base, hits) = fake_gemini(StatusCode::OK, "   ").await;
        let client = LLMClient::from_config(&config_for(&base));

        assert_eq!(client.generate("hi").await, APOLOGY_REPLY);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_constant_delay() {
        let provider = Arc::new(FlakyProvider {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let client = LLMClient::new(provider.clone(), 2, Duration::from_millis(800));

        let started = tokio::time::Instant::now();
        let reply = client.generate("hi").await;

        assert_eq!(reply, "recovered");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1600));
        assert!(started.elapsed() < Duration::from_millis(2400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_respected() {
        let provider = Arc::new(FlakyProvider {
            failures: 10,
            calls: AtomicUsize::new(0),
        });
        let client = LLMClient::new(provider.clone(), 2, Duration::from_millis(800));

        assert_eq!(client.generate("hi").await, APOLOGY_REPLY);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_gemini_provider_reports_configuration() {
        let provider = GeminiProvider::new(Some("k".to_string()), Some("m".to_string()));
        assert!(provider.is_configured());
        assert_eq!(provider.name(), "Gemini");
    }
}
