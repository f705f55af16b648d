//! Anthropic Messages API client.
//!
//! Prompt caching is declarative: the shared context travels in every request as a system
//! block marked `cache_control: ephemeral`, and Anthropic reuses the prefix for about five
//! minutes. Creating a cache therefore needs no request of its own.

use super::{
    build_provider_http_client, error_from_response, map_http_error, CompletionRequest,
    CompletionResponse, ContextCacheHandle, ModelProviderClient, ProviderType, TokenUsage,
};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const EPHEMERAL_CACHE_TTL_SECS: i64 = 300;

#[derive(Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl MessagesRequest {
    fn from_request(model: &str, request: &CompletionRequest) -> Self {
        let mut system = Vec::with_capacity(2);
        if let Some(text) = request.system.as_deref().filter(|s| !s.is_empty()) {
            system.push(SystemBlock {
                kind: "text",
                text: text.to_string(),
                cache_control: None,
            });
        }
        if let Some(context) = request.context.as_deref().filter(|c| !c.is_empty()) {
            system.push(SystemBlock {
                kind: "text",
                text: context.to_string(),
                cache_control: request
                    .cache
                    .as_ref()
                    .map(|_| CacheControl { kind: "ephemeral" }),
            });
        }

        Self {
            model: model.to_string(),
            max_tokens: request.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages: vec![Message {
                role: "user",
                content: request.prompt.clone(),
            }],
            temperature: request.options.temperature.map(|t| t.min(1.0)),
            top_p: request.options.top_p,
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
}

/// Anthropic provider client
pub struct AnthropicClient {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Result<Self, ApiError> {
        let client = build_provider_http_client()?;
        let base_url = base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string());
        Ok(Self {
            client,
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelProviderClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError> {
        let body = MessagesRequest::from_request(&self.model, &request);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let completion: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let content: String = completion
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if content.trim().is_empty() {
            return Err(ApiError::ProviderError(
                "Anthropic returned no text content".to_string(),
            ));
        }

        let usage = completion
            .usage
            .map(|u| {
                let prompt_tokens =
                    u.input_tokens + u.cache_read_input_tokens + u.cache_creation_input_tokens;
                TokenUsage {
                    prompt_tokens,
                    completion_tokens: u.output_tokens,
                    total_tokens: prompt_tokens + u.output_tokens,
                    cached_tokens: u.cache_read_input_tokens,
                }
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: completion.model,
            usage,
            finish_reason: completion.stop_reason,
        })
    }

    fn supports_context_cache(&self) -> bool {
        true
    }

    async fn create_context_cache(
        &self,
        _system: Option<&str>,
        _context: &str,
        _ttl: Duration,
    ) -> Result<ContextCacheHandle, ApiError> {
        Ok(ContextCacheHandle {
            provider: ProviderType::Anthropic,
            name: "ephemeral".to_string(),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(EPHEMERAL_CACHE_TTL_SECS)),
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            id: String,
        }

        let models: ModelsResponse = response.json().await.map_err(|e| {
            ApiError::ProviderError(format!("Failed to parse models response: {}", e))
        })?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}
