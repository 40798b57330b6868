//! Anthropic messages API judge client.
//!
//! One client serves every configured judge model; the model id travels per
//! request. Requests are rate limited and retried with exponential backoff;
//! failures surface as transient provider errors which the judge service
//! records as ERROR votes.

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::RetryConfig;
use crate::domain::ports::JudgeClient;

use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicJudgeConfig {
    /// API key. Falls back to `ANTHROPIC_API_KEY` env var.
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for AnthropicJudgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

impl AnthropicJudgeConfig {
    fn resolve_api_key(&self) -> HealResult<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                HealError::Configuration(
                    "Anthropic API key not set. Set ANTHROPIC_API_KEY or configure api_key."
                        .to_string(),
                )
            })
    }
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug)]
pub struct AnthropicJudgeClient {
    config: AnthropicJudgeConfig,
    client: reqwest::Client,
    api_key: String,
    rate_limiter: TokenBucketRateLimiter,
    retry: RetryPolicy,
}

impl AnthropicJudgeClient {
    /// Fails only on misconfiguration (missing key); fatal at startup.
    pub fn new(config: AnthropicJudgeConfig, retry: &RetryConfig) -> HealResult<Self> {
        let api_key = config.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HealError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            rate_limiter: TokenBucketRateLimiter::new(retry.requests_per_second),
            retry: RetryPolicy::new(retry),
            config,
        })
    }

    async fn send(&self, model: &str, prompt: &str) -> HealResult<String> {
        let request = MessageRequest {
            model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| HealError::provider("anthropic", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(HealError::provider(
                "anthropic",
                format!("API returned {status}: {body}"),
            ));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| HealError::provider("anthropic", format!("malformed response: {e}")))?;

        let text = message
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }
}

#[async_trait]
impl JudgeClient for AnthropicJudgeClient {
    async fn complete(&self, model: &str, prompt: &str) -> HealResult<String> {
        self.rate_limiter.acquire().await;
        self.retry.execute(|| self.send(model, prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server_url: &str) -> AnthropicJudgeClient {
        AnthropicJudgeClient::new(
            AnthropicJudgeConfig {
                api_key: Some("test-key".to_string()),
                base_url: server_url.to_string(),
                ..AnthropicJudgeConfig::default()
            },
            &RetryConfig {
                max_retries: 1,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                requests_per_second: 100.0,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn extracts_text_blocks_from_the_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(
                r#"{"content":[{"type":"text","text":"VERDICT: approve"},{"type":"text","text":"REASONING: ok"}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let text = client.complete("claude-3-5-haiku-20241022", "judge this").await.unwrap();
        assert!(text.contains("VERDICT: approve"));
        assert!(text.contains("REASONING: ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_surface_as_provider_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(500)
            .with_body("overloaded")
            .expect(2) // initial call + one retry
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client
            .complete("claude-3-5-haiku-20241022", "judge this")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        // Only meaningful when the environment doesn't provide a key.
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return;
        }
        let err = AnthropicJudgeClient::new(
            AnthropicJudgeConfig::default(),
            &RetryConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HealError::Configuration(_)));
    }
}
