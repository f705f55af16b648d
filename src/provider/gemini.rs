//! Gemini `generateContent` client with explicit context caching (`cachedContents`).

use super::{
    build_provider_http_client, error_from_response, map_http_error, CompletionRequest,
    CompletionResponse, ContextCacheHandle, ModelProviderClient, ProviderType, TokenUsage,
};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_VERSION: &str = "v1beta";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Part {
    text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, texts: Vec<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: texts.into_iter().map(|text| Part { text }).collect(),
        }
    }
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_content: Option<String>,
}

impl GenerateContentRequest {
    fn from_request(request: &CompletionRequest) -> Self {
        let generation_config = GenerationConfig {
            temperature: request.options.temperature,
            max_output_tokens: request.options.max_tokens,
            top_p: request.options.top_p,
        };

        // A cached request may not repeat the system instruction or the cached context.
        if let Some(cache) = &request.cache {
            return Self {
                system_instruction: None,
                contents: vec![Content::text(Some("user"), vec![request.prompt.clone()])],
                generation_config,
                cached_content: Some(cache.name.clone()),
            };
        }

        let mut texts = Vec::with_capacity(2);
        if let Some(context) = request.context.as_deref().filter(|c| !c.is_empty()) {
            texts.push(context.to_string());
        }
        texts.push(request.prompt.clone());

        Self {
            system_instruction: system_content(request.system.as_deref()),
            contents: vec![Content::text(Some("user"), texts)],
            generation_config,
            cached_content: None,
        }
    }
}

fn system_content(system: Option<&str>) -> Option<Content> {
    system
        .filter(|s| !s.is_empty())
        .map(|s| Content::text(None, vec![s.to_string()]))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
    #[serde(default)]
    cached_content_token_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCachedContentRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    ttl: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedContent {
    name: String,
    #[serde(default)]
    expire_time: Option<String>,
}

/// Gemini provider client
pub struct GeminiClient {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Result<Self, ApiError> {
        let client = build_provider_http_client()?;
        let base_url =
            base_url.unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());
        // Accept both "gemini-..." and "models/gemini-..."
        let model = model.trim_start_matches("models/").to_string();

        Ok(Self {
            client,
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_VERSION, path)
    }
}

#[async_trait]
impl ModelProviderClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError> {
        let body = GenerateContentRequest::from_request(&request);
        let url = self.url(&format!("models/{}:generateContent", self.model));

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let completion: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let candidate = match completion.candidates.into_iter().next() {
            Some(candidate) => candidate,
            None => {
                let reason = completion
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "no candidates returned".to_string());
                return Err(ApiError::ProviderError(format!(
                    "Gemini returned no content: {}",
                    reason
                )));
            }
        };

        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ApiError::ProviderError(format!(
                "Gemini returned empty content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = completion.usage_metadata.unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: completion.model_version.unwrap_or_else(|| self.model.clone()),
            usage: TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
                cached_tokens: usage.cached_content_token_count,
            },
            finish_reason: candidate.finish_reason,
        })
    }

    fn supports_context_cache(&self) -> bool {
        true
    }

    async fn create_context_cache(
        &self,
        system: Option<&str>,
        context: &str,
        ttl: Duration,
    ) -> Result<ContextCacheHandle, ApiError> {
        let body = CreateCachedContentRequest {
            model: format!("models/{}", self.model),
            system_instruction: system_content(system),
            contents: vec![Content::text(Some("user"), vec![context.to_string()])],
            ttl: format!("{}s", ttl.as_secs().max(1)),
        };

        let response = self
            .client
            .post(self.url("cachedContents"))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let cached: CachedContent = response.json().await.map_err(|e| {
            ApiError::ProviderError(format!("Failed to parse cached content response: {}", e))
        })?;

        let expires_at = cached
            .expire_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(ContextCacheHandle {
            provider: ProviderType::Gemini,
            name: cached.name,
            expires_at,
        })
    }

    async fn delete_context_cache(&self, handle: &ContextCacheHandle) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&handle.name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        let response = self
            .client
            .get(self.url("models"))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ModelsResponse {
            #[serde(default)]
            models: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ModelInfo {
            name: String,
            #[serde(default)]
            supported_generation_methods: Vec<String>,
        }

        let models: ModelsResponse = response.json().await.map_err(|e| {
            ApiError::ProviderError(format!("Failed to parse models response: {}", e))
        })?;

        Ok(models
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }
}
