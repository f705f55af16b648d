//! Provider clients against a local mock HTTP server

use mockito::{Matcher, Server};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use yumechain::config::LlmConfig;
use yumechain::error::ApiError;
use yumechain::provider::{
    resolve_settings, AnthropicClient, AzureOpenAIClient, CompletionOptions, CompletionRequest,
    GeminiClient, ModelProviderClient, OpenAIClient, ProviderFactory, ProviderType, TaskKind,
};

fn chat_completion_body(content: &str) -> String {
    json!({
        "model": "gpt-4o-mini-2024-07-18",
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 120,
            "completion_tokens": 30,
            "total_tokens": 150,
            "prompt_tokens_details": {"cached_tokens": 100}
        }
    })
    .to_string()
}

fn gemini_body(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 50,
            "candidatesTokenCount": 20,
            "totalTokenCount": 70,
            "cachedContentTokenCount": 40
        },
        "modelVersion": "gemini-2.0-flash"
    })
    .to_string()
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "あなたは小説家です"},
                {"role": "user", "content": "世界観\n\n第1話を書いてください"}
            ],
            "temperature": 0.5
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body("吾輩は猫である。"))
        .create_async()
        .await;

    let client = OpenAIClient::new(
        "gpt-4o-mini".to_string(),
        "sk-test".to_string(),
        Some(server.url()),
    )
    .unwrap();
    let request = CompletionRequest::new("第1話を書いてください")
        .with_system("あなたは小説家です")
        .with_context("世界観")
        .with_options(CompletionOptions {
            temperature: Some(0.5),
            ..Default::default()
        });

    let response = client.complete(request).await.unwrap();
    mock.assert_async().await;

    assert_eq!(response.content, "吾輩は猫である。");
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.usage.total_tokens, 150);
    assert_eq!(response.usage.cached_tokens, 100);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_openai_status_codes_map_to_errors() {
    let mut server = Server::new_async().await;
    let client = OpenAIClient::new(
        "gpt-4o-mini".to_string(),
        "bad-key".to_string(),
        Some(server.url()),
    )
    .unwrap();

    let unauthorized = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": {"message": "Incorrect API key provided"}}"#)
        .create_async()
        .await;
    let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ApiError::ProviderAuthFailed(_)), "{:?}", err);
    assert!(err.to_string().contains("Incorrect API key"));
    unauthorized.remove_async().await;

    let limited = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;
    let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ApiError::ProviderRateLimit(_)), "{:?}", err);
    limited.remove_async().await;

    server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ApiError::ProviderRequestFailed(_)), "{:?}", err);
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_openai_empty_content_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body("   "))
        .create_async()
        .await;

    let client =
        OpenAIClient::new("gpt-4o-mini".to_string(), "k".to_string(), Some(server.url())).unwrap();
    let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ApiError::ProviderError(_)));
}

#[tokio::test]
async fn test_openai_list_models() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/models")
        .match_header("authorization", "Bearer k")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"id": "gpt-4o"}, {"id": "gpt-4o-mini"}]}"#)
        .create_async()
        .await;

    let client =
        OpenAIClient::new("gpt-4o".to_string(), "k".to_string(), Some(server.url())).unwrap();
    let models = client.list_models().await.unwrap();
    assert!(models.contains(&"gpt-4o".to_string()));
    assert!(models.contains(&"gpt-4o-mini".to_string()));
}

#[tokio::test]
async fn test_azure_uses_deployment_url_and_api_key_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/deployments/novel-gpt/chat/completions")
        .match_query(Matcher::UrlEncoded(
            "api-version".to_string(),
            "2024-06-01".to_string(),
        ))
        .match_header("api-key", "azure-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body("本文"))
        .create_async()
        .await;

    let client = AzureOpenAIClient::new(
        server.url(),
        "novel-gpt".to_string(),
        "azure-key".to_string(),
        "2024-06-01".to_string(),
        "gpt-4o".to_string(),
    )
    .unwrap();
    assert_eq!(client.model_name(), "novel-gpt");

    let response = client.complete(CompletionRequest::new("書いて")).await.unwrap();
    mock.assert_async().await;
    assert_eq!(response.content, "本文");
}

#[tokio::test]
async fn test_azure_missing_deployment_is_model_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/openai/deployments/missing/chat/completions")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error": {"code": "DeploymentNotFound"}}"#)
        .create_async()
        .await;

    let client = AzureOpenAIClient::new(
        server.url(),
        "missing".to_string(),
        "k".to_string(),
        "2024-06-01".to_string(),
        "gpt-4o".to_string(),
    )
    .unwrap();
    let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ApiError::ProviderModelNotFound(_)), "{:?}", err);
}

#[tokio::test]
async fn test_gemini_generate_content_inline() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .match_header("x-goog-api-key", "g-key")
        .match_body(Matcher::PartialJson(json!({
            "systemInstruction": {"parts": [{"text": "小説家として"}]},
            "contents": [{"role": "user", "parts": [{"text": "設定"}, {"text": "第1話"}]}],
            "generationConfig": {"maxOutputTokens": 4000}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("# 第1話\n\n春の日。"))
        .create_async()
        .await;

    let client = GeminiClient::new(
        "models/gemini-2.0-flash".to_string(),
        "g-key".to_string(),
        Some(server.url()),
    )
    .unwrap();
    assert_eq!(client.model_name(), "gemini-2.0-flash");

    let request = CompletionRequest::new("第1話")
        .with_system("小説家として")
        .with_context("設定")
        .with_options(CompletionOptions {
            max_tokens: Some(4000),
            ..Default::default()
        });
    let response = client.complete(request).await.unwrap();
    mock.assert_async().await;

    assert_eq!(response.content, "# 第1話\n\n春の日。");
    assert_eq!(response.usage.prompt_tokens, 50);
    assert_eq!(response.usage.cached_tokens, 40);
}

#[tokio::test]
async fn test_gemini_blocked_prompt_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)
        .create_async()
        .await;

    let client =
        GeminiClient::new("gemini-2.0-flash".to_string(), "k".to_string(), Some(server.url()))
            .unwrap();
    let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
    assert!(err.to_string().contains("SAFETY"));
}

#[tokio::test]
async fn test_gemini_context_cache_lifecycle() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/v1beta/cachedContents")
        .match_header("x-goog-api-key", "g-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "models/gemini-2.0-flash",
            "contents": [{"role": "user", "parts": [{"text": "長い設定"}]}],
            "ttl": "600s"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "cachedContents/abc123", "expireTime": "2099-01-01T00:00:00Z"}"#)
        .create_async()
        .await;
    let generate = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .match_body(Matcher::PartialJson(json!({
            "cachedContent": "cachedContents/abc123",
            "contents": [{"role": "user", "parts": [{"text": "第2話"}]}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("続き"))
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/v1beta/cachedContents/abc123")
        .match_header("x-goog-api-key", "g-key")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client =
        GeminiClient::new("gemini-2.0-flash".to_string(), "g-key".to_string(), Some(server.url()))
            .unwrap();
    assert!(client.supports_context_cache());

    let handle = client
        .create_context_cache(Some("小説家として"), "長い設定", Duration::from_secs(600))
        .await
        .unwrap();
    assert_eq!(handle.provider, ProviderType::Gemini);
    assert_eq!(handle.name, "cachedContents/abc123");
    assert!(!handle.expires_within(Duration::from_secs(60)));

    let mut request = CompletionRequest::new("第2話")
        .with_system("小説家として")
        .with_context("長い設定");
    request.cache = Some(handle.clone());
    let response = client.complete(request).await.unwrap();
    assert_eq!(response.content, "続き");

    client.delete_context_cache(&handle).await.unwrap();

    create.assert_async().await;
    generate.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_gemini_list_models_filters_generation_capable() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1beta/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "models": [
                    {"name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent", "createCachedContent"]},
                    {"name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"]}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client =
        GeminiClient::new("gemini-2.0-flash".to_string(), "k".to_string(), Some(server.url()))
            .unwrap();
    assert_eq!(client.list_models().await.unwrap(), vec!["gemini-2.0-flash".to_string()]);
}

#[tokio::test]
async fn test_anthropic_messages() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "a-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-3-5-sonnet-latest",
            "max_tokens": 8192,
            "system": [{"type": "text", "text": "小説家として"}],
            "messages": [{"role": "user", "content": "第1話"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "claude-3-5-sonnet-20241022",
                "content": [{"type": "text", "text": "物語の始まり"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = AnthropicClient::new(
        "claude-3-5-sonnet-latest".to_string(),
        "a-key".to_string(),
        Some(server.url()),
    )
    .unwrap();
    let request = CompletionRequest::new("第1話").with_system("小説家として");
    let response = client.complete(request).await.unwrap();
    mock.assert_async().await;

    assert_eq!(response.content, "物語の始まり");
    assert_eq!(response.model, "claude-3-5-sonnet-20241022");
    assert_eq!(response.usage.prompt_tokens, 10);
}

#[tokio::test]
async fn test_task_settings_pick_provider_and_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer plot-key")
        .match_body(Matcher::PartialJson(json!({"model": "gpt-4o"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body("ok"))
        .create_async()
        .await;

    // General settings target Gemini; the plot task switches to OpenAI via its own variables.
    let mut llm = LlmConfig::default();
    llm.provider = Some("gemini".to_string());
    llm.model = Some("gemini-1.5-pro".to_string());
    let env: HashMap<String, String> = [
        ("PLOT_LLM_PROVIDER", "openai"),
        ("PLOT_LLM_MODEL", "gpt-4o"),
        ("OPENAI_API_KEY", "plot-key"),
        ("OPENAI_BASE_URL", server.url().as_str()),
        ("GEMINI_API_KEY", "episode-key"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let plot = resolve_settings(&llm, TaskKind::Plot, &env).unwrap();
    assert_eq!(plot.provider.value, ProviderType::OpenAI);
    let client = ProviderFactory::create_client(&plot).unwrap();
    assert_eq!(client.provider_name(), "openai");
    client.complete(CompletionRequest::new("plot")).await.unwrap();
    mock.assert_async().await;

    let episode = resolve_settings(&llm, TaskKind::Episode, &env).unwrap();
    assert_eq!(episode.provider.value, ProviderType::Gemini);
    assert_eq!(episode.model.value, "gemini-1.5-pro");
    assert_eq!(episode.api_key.value, "episode-key");
}
