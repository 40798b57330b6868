//! OpenAI-compatible embedding provider adapter.
//!
//! Works against the `/embeddings` endpoint of any OpenAI-compatible
//! server. Failures are transient provider errors: the lookup service logs
//! them and skips the semantic tier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::EmbeddingProvider;

pub struct OpenAiEmbeddingProvider {
    config: EmbeddingConfig,
    client: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingProvider {
    /// Fails only on misconfiguration (missing key); fatal at startup.
    pub fn new(config: EmbeddingConfig, api_key: Option<String>) -> HealResult<Self> {
        let api_key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                HealError::Configuration(
                    "OpenAI API key not set. Set OPENAI_API_KEY or configure api_key.".to_string(),
                )
            })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HealError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> HealResult<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: &self.config.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| HealError::provider("openai", format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(HealError::provider(
                "openai",
                format!("API returned {status}: {body}"),
            ));
        }

        let mut result: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| HealError::provider("openai", format!("malformed response: {e}")))?;

        result.data.sort_by_key(|d| d.index);
        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| HealError::provider("openai", "empty embedding response"))
    }
}
