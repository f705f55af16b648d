//! Azure OpenAI client: OpenAI wire format addressed by deployment.

use super::openai::{send_chat_completion, ChatCompletionRequest, ModelsResponse};
use super::{
    build_provider_http_client, error_from_response, map_http_error, CompletionRequest,
    CompletionResponse, ModelProviderClient,
};
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;

/// Azure OpenAI provider client
pub struct AzureOpenAIClient {
    client: Client,
    endpoint: String,
    deployment: String,
    api_key: String,
    api_version: String,
    model: String,
}

impl AzureOpenAIClient {
    pub fn new(
        endpoint: String,
        deployment: String,
        api_key: String,
        api_version: String,
        model: String,
    ) -> Result<Self, ApiError> {
        if deployment.trim().is_empty() {
            return Err(ApiError::ProviderNotConfigured(
                "Azure OpenAI deployment name is empty".to_string(),
            ));
        }
        Ok(Self {
            client: build_provider_http_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment,
            api_key,
            api_version,
            model,
        })
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl ModelProviderClient for AzureOpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError> {
        let body = ChatCompletionRequest::from_request(None, &request);
        let builder = self
            .client
            .post(self.chat_url())
            .header("api-key", &self.api_key);
        send_chat_completion(builder, &body, &self.model).await
    }

    fn provider_name(&self) -> &str {
        "azure"
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        let url = format!(
            "{}/openai/models?api-version={}",
            self.endpoint, self.api_version
        );
        let response = self
            .client
            .get(&url)
            .header("api-key", &self.api_key)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let models: ModelsResponse = response.json().await.map_err(|e| {
            ApiError::ProviderError(format!("Failed to parse models response: {}", e))
        })?;
        Ok(models.into_ids())
    }
}
