//! Model Provider Abstraction
//!
//! One client interface over OpenAI, Azure OpenAI, Gemini and Anthropic. Every request has
//! the same shape: a system instruction, a large shared context (settings and plot) that
//! providers may cache server-side, and a short task prompt.

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod anthropic;
pub mod azure;
pub mod gemini;
pub mod openai;
pub mod profile;
pub mod resolve;

pub use anthropic::AnthropicClient;
pub use azure::AzureOpenAIClient;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use profile::ProviderType;
pub use resolve::{
    resolve_settings, EnvSource, ProcessEnv, Resolved, ResolvedSettings, SettingSource, TaskKind,
};

/// Completion options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,  // Maximum tokens to generate
    pub top_p: Option<f32>,       // Nucleus sampling
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Prompt tokens served from a provider-side cache
    #[serde(default)]
    pub cached_tokens: u32,
}

/// Provider-side cached context
#[derive(Debug, Clone, PartialEq)]
pub struct ContextCacheHandle {
    pub provider: ProviderType,
    /// Provider resource name (`cachedContents/...` for Gemini)
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ContextCacheHandle {
    /// True when the cache expires within `margin` from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero());
                expires_at <= Utc::now() + margin
            }
            None => false,
        }
    }
}

/// A single completion request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    /// Shared, cacheable context placed before the prompt
    pub context: Option<String>,
    pub prompt: String,
    pub options: CompletionOptions,
    /// When set, the provider serves `system` and `context` from this cache
    pub cache: Option<ContextCacheHandle>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of characters sent inline (system, context and prompt).
    pub fn inline_chars(&self) -> usize {
        let cached = self.cache.is_some();
        let system = if cached { 0 } else { self.system.as_deref().map_or(0, |s| s.chars().count()) };
        let context = if cached { 0 } else { self.context.as_deref().map_or(0, |s| s.chars().count()) };
        system + context + self.prompt.chars().count()
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// Model provider client trait
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError>;

    /// Whether the provider can hold `system` + `context` server-side
    fn supports_context_cache(&self) -> bool {
        false
    }

    /// Store the shared context with the provider for `ttl`
    async fn create_context_cache(
        &self,
        _system: Option<&str>,
        _context: &str,
        _ttl: Duration,
    ) -> Result<ContextCacheHandle, ApiError> {
        Err(ApiError::CacheUnsupported(self.provider_name().to_string()))
    }

    /// Release a cache created by `create_context_cache`
    async fn delete_context_cache(&self, _handle: &ContextCacheHandle) -> Result<(), ApiError> {
        Ok(())
    }

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// List available models from the provider
    async fn list_models(&self) -> Result<Vec<String>, ApiError>;
}

/// Joins context and prompt for providers without a separate context slot.
pub(crate) fn inline_user_content(request: &CompletionRequest) -> String {
    match request.context.as_deref() {
        Some(context) if !context.is_empty() => format!("{}\n\n{}", context, request.prompt),
        _ => request.prompt.clone(),
    }
}

// Helper function to map transport errors to ApiError
pub(crate) fn map_http_error(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        map_status_error(status.as_u16(), error.to_string())
    } else if error.is_timeout() {
        ApiError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

pub(crate) fn map_status_error(status: u16, body: String) -> ApiError {
    match status {
        401 | 403 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", body)),
        429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", body)),
        404 => ApiError::ProviderModelNotFound(format!("Not found: {}", body)),
        _ => ApiError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

/// Turn a non-success response into an error carrying its body.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    map_status_error(status, body)
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn build_provider_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

/// Provider factory for creating provider clients
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(
        settings: &ResolvedSettings,
    ) -> Result<Box<dyn ModelProviderClient>, ApiError> {
        let model = settings.model.value.clone();
        let api_key = settings.api_key.value.clone();
        let endpoint = settings.endpoint_value();

        match settings.provider.value {
            ProviderType::OpenAI => Ok(Box::new(OpenAIClient::new(model, api_key, endpoint)?)),
            ProviderType::Gemini => Ok(Box::new(GeminiClient::new(model, api_key, endpoint)?)),
            ProviderType::Anthropic => {
                Ok(Box::new(AnthropicClient::new(model, api_key, endpoint)?))
            }
            ProviderType::Azure => {
                let endpoint = endpoint.ok_or_else(|| {
                    ApiError::ProviderNotConfigured("Azure OpenAI endpoint is not set".to_string())
                })?;
                let deployment = settings.deployment.clone().unwrap_or_else(|| model.clone());
                let api_version = settings
                    .api_version
                    .clone()
                    .unwrap_or_else(|| resolve::DEFAULT_AZURE_API_VERSION.to_string());
                Ok(Box::new(AzureOpenAIClient::new(
                    endpoint,
                    deployment,
                    api_key,
                    api_version,
                    model,
                )?))
            }
        }
    }
}

/// How the mock answers cache requests
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCacheMode {
    Unsupported,
    Supported,
    FailCreate,
}

// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<String, ApiError>>>,
    requests: std::sync::Arc<parking_lot::Mutex<Vec<CompletionRequest>>>,
    cache_mode: MockCacheMode,
    caches_created: std::sync::Arc<parking_lot::Mutex<usize>>,
    caches_deleted: std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
    cache_lifetime: Option<Duration>,
    provider_name: String,
    model_name: String,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(provider_name: String, model_name: String, responses: Vec<String>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Default::default(),
            cache_mode: MockCacheMode::Unsupported,
            caches_created: Default::default(),
            caches_deleted: Default::default(),
            cache_lifetime: None,
            provider_name,
            model_name,
        }
    }

    pub fn with_cache_mode(mut self, mode: MockCacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Created caches expire after `lifetime` instead of the requested TTL
    pub fn with_cache_lifetime(mut self, lifetime: Duration) -> Self {
        self.cache_lifetime = Some(lifetime);
        self
    }

    /// Queue an error to be returned by the next `complete` call
    pub fn push_error(&self, error: ApiError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> std::sync::Arc<parking_lot::Mutex<Vec<CompletionRequest>>> {
        std::sync::Arc::clone(&self.requests)
    }

    pub fn caches_created(&self) -> std::sync::Arc<parking_lot::Mutex<usize>> {
        std::sync::Arc::clone(&self.caches_created)
    }

    /// Names of deleted caches, in deletion order
    pub fn caches_deleted(&self) -> std::sync::Arc<parking_lot::Mutex<Vec<String>>> {
        std::sync::Arc::clone(&self.caches_deleted)
    }
}

#[cfg(test)]
#[async_trait]
impl ModelProviderClient for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError> {
        let cached = request.cache.is_some();
        self.requests.lock().push(request);
        let next = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("Mock response".to_string()));
        let content = next?;

        Ok(CompletionResponse {
            content,
            model: self.model_name.clone(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
                cached_tokens: if cached { 8 } else { 0 },
            },
            finish_reason: Some("stop".to_string()),
        })
    }

    fn supports_context_cache(&self) -> bool {
        self.cache_mode != MockCacheMode::Unsupported
    }

    async fn create_context_cache(
        &self,
        _system: Option<&str>,
        _context: &str,
        ttl: Duration,
    ) -> Result<ContextCacheHandle, ApiError> {
        match self.cache_mode {
            MockCacheMode::Supported => {
                let mut created = self.caches_created.lock();
                *created += 1;
                let lifetime = self.cache_lifetime.unwrap_or(ttl);
                Ok(ContextCacheHandle {
                    provider: ProviderType::Gemini,
                    name: format!("cachedContents/mock-{}", *created),
                    expires_at: Some(
                        Utc::now()
                            + chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::zero()),
                    ),
                })
            }
            MockCacheMode::FailCreate => Err(ApiError::ProviderRequestFailed(
                "Request failed with status 400: cached content is too small".to_string(),
            )),
            MockCacheMode::Unsupported => Err(ApiError::CacheUnsupported(self.provider_name.clone())),
        }
    }

    async fn delete_context_cache(&self, handle: &ContextCacheHandle) -> Result<(), ApiError> {
        self.caches_deleted.lock().push(handle.name.clone());
        Ok(())
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        Ok(vec![self.model_name.clone()])
    }
}
