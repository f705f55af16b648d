//! Generation orchestration.
//!
//! `LlmClient` turns the two generation tasks into provider requests. It owns one provider
//! client for one task, keeps token totals, and manages a provider-side context cache for
//! the shared prefix (settings and plot) so an episode batch pays for that prefix once.
//!
//! Caching never makes a generation fail: when the cache cannot be created the client falls
//! back to inline context for the rest of its life, and a cached request that fails with a
//! recoverable error is retried once without the cache.

pub mod usage;

pub use usage::UsageTotals;

use crate::config::LlmConfig;
use crate::error::ApiError;
use crate::plot::{extract_json, ArcPlot, PlotDocument};
use crate::prompts::{EpisodePosition, PromptSet};
use crate::provider::{
    resolve_settings, CompletionRequest, CompletionResponse, ContextCacheHandle,
    ModelProviderClient, ProcessEnv, ProviderFactory, ResolvedSettings, TaskKind,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Caches this close to expiry are recreated before use
const CACHE_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Inputs for an episode written with the whole plot as context
#[derive(Debug, Clone, Copy)]
pub struct EpisodeRequest<'a> {
    pub setting: &'a str,
    pub plot: &'a PlotDocument,
    pub arc: &'a str,
    pub episode: u32,
    /// Body of the preceding episode, when it has been written
    pub previous_episode: Option<&'a str>,
}

#[derive(Debug, Default)]
struct CacheState {
    key: Option<String>,
    handle: Option<ContextCacheHandle>,
    disabled: bool,
}

/// LLM client bound to one task's resolved settings
pub struct LlmClient {
    client: Box<dyn ModelProviderClient>,
    settings: ResolvedSettings,
    usage: Mutex<UsageTotals>,
    cache: Mutex<CacheState>,
}

impl LlmClient {
    /// Resolve settings for `task` from config and the process environment.
    pub fn for_task(llm: &LlmConfig, task: TaskKind) -> Result<Self, ApiError> {
        let settings = resolve_settings(llm, task, &ProcessEnv)?;
        let client = ProviderFactory::create_client(&settings)?;
        debug!(
            task = %task,
            provider = %settings.provider.value,
            provider_source = %settings.provider.source,
            model = %settings.model.value,
            model_source = %settings.model.source,
            "Resolved LLM settings"
        );
        Ok(Self::new(client, settings))
    }

    pub fn new(client: Box<dyn ModelProviderClient>, settings: ResolvedSettings) -> Self {
        Self {
            client,
            settings,
            usage: Mutex::new(UsageTotals::default()),
            cache: Mutex::new(CacheState::default()),
        }
    }

    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub fn usage(&self) -> UsageTotals {
        *self.usage.lock()
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        self.client.list_models().await
    }

    /// Whole-novel plot from the settings.
    pub async fn generate_plot(&self, setting: &str) -> Result<PlotDocument, ApiError> {
        let response = self.complete(PromptSet::plot(setting)).await?;
        PlotDocument::from_json_str(&response.content)
    }

    /// One arc. `existing` is shown to the model for continuity.
    pub async fn generate_arc_plot(
        &self,
        setting: &str,
        arc: &str,
        existing: Option<&PlotDocument>,
    ) -> Result<ArcPlot, ApiError> {
        let existing_json = match existing.filter(|p| !p.is_empty()) {
            Some(plot) => Some(plot.to_json_pretty()?),
            None => None,
        };
        let request = PromptSet::arc_plot(setting, arc, existing_json.as_deref());
        let response = self.complete(request).await?;
        parse_arc_response(arc, &response.content)
    }

    /// Episode from its plot text alone.
    pub async fn generate_episode(
        &self,
        setting: &str,
        episode_plot: &str,
    ) -> Result<String, ApiError> {
        let response = self
            .complete(PromptSet::standalone_episode(setting, episode_plot))
            .await?;
        Ok(clean_episode(&response.content))
    }

    /// Episode with the whole plot and the previous episode as context.
    pub async fn generate_episode_with_context(
        &self,
        request: EpisodeRequest<'_>,
    ) -> Result<String, ApiError> {
        let episode_plot = request.plot.episode_plot(request.arc, request.episode)?;
        let plot_json = request.plot.to_json_pretty()?;
        let completion = PromptSet::episode(
            request.setting,
            &plot_json,
            EpisodePosition {
                arc: request.arc,
                episode: request.episode,
            },
            episode_plot,
            request.previous_episode,
        );
        let response = self.complete(completion).await?;
        Ok(clean_episode(&response.content))
    }

    /// Delete the provider-side cache, if any. Failures are logged, never returned.
    pub async fn release_cache(&self) {
        let handle = {
            let mut state = self.cache.lock();
            state.key = None;
            state.handle.take()
        };
        if let Some(handle) = handle {
            match self.client.delete_context_cache(&handle).await {
                Ok(()) => debug!(cache = %handle.name, "Released context cache"),
                Err(e) => warn!(cache = %handle.name, error = %e, "Failed to release context cache"),
            }
        }
    }

    async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionResponse, ApiError> {
        request.options = self.settings.options();
        request.cache = match request.context.as_deref() {
            Some(context) => self.ensure_cache(request.system.as_deref(), context).await,
            None => None,
        };

        let response = match self.send(&request).await {
            Err(e) if request.cache.is_some() && e.is_cache_recoverable() => {
                warn!(
                    provider = self.client.provider_name(),
                    error = %e,
                    "Cached request failed, retrying with inline context"
                );
                self.invalidate_cache().await;
                request.cache = None;
                self.send(&request).await?
            }
            other => other?,
        };

        self.usage.lock().record(&response.usage);
        Ok(response)
    }

    async fn send(&self, request: &CompletionRequest) -> Result<CompletionResponse, ApiError> {
        let started = Instant::now();
        let result = self.client.complete(request.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => info!(
                provider = self.client.provider_name(),
                model = %response.model,
                task = self.settings.task.as_str(),
                prompt_chars = request.inline_chars(),
                cached = request.cache.is_some(),
                elapsed_ms,
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                cached_tokens = response.usage.cached_tokens,
                "LLM call completed"
            ),
            Err(e) => warn!(
                provider = self.client.provider_name(),
                model = self.client.model_name(),
                task = self.settings.task.as_str(),
                cached = request.cache.is_some(),
                elapsed_ms,
                error = %e,
                "LLM call failed"
            ),
        }
        result
    }

    /// Cache handle for this context, creating or refreshing it when needed.
    async fn ensure_cache(&self, system: Option<&str>, context: &str) -> Option<ContextCacheHandle> {
        let config = &self.settings.cache;
        if !config.enabled || !self.client.supports_context_cache() {
            return None;
        }
        if context.chars().count() < config.min_context_chars {
            debug!(chars = context.chars().count(), "Context too short to cache");
            return None;
        }

        let key = cache_key(system, context);
        let stale = {
            let mut state = self.cache.lock();
            if state.disabled {
                return None;
            }
            match &state.handle {
                Some(handle)
                    if state.key.as_deref() == Some(key.as_str())
                        && !handle.expires_within(CACHE_REFRESH_MARGIN) =>
                {
                    return Some(handle.clone());
                }
                _ => {}
            }
            state.key = None;
            state.handle.take()
        };

        if let Some(stale) = stale {
            if let Err(e) = self.client.delete_context_cache(&stale).await {
                debug!(cache = %stale.name, error = %e, "Failed to delete stale context cache");
            }
        }

        let ttl = Duration::from_secs(config.ttl_secs);
        match self.client.create_context_cache(system, context, ttl).await {
            Ok(handle) => {
                info!(
                    provider = self.client.provider_name(),
                    cache = %handle.name,
                    context_chars = context.chars().count(),
                    ttl_secs = config.ttl_secs,
                    "Created context cache"
                );
                let mut state = self.cache.lock();
                state.key = Some(key);
                state.handle = Some(handle.clone());
                Some(handle)
            }
            Err(e) => {
                warn!(
                    provider = self.client.provider_name(),
                    error = %e,
                    "Context cache unavailable, sending context inline"
                );
                self.cache.lock().disabled = true;
                None
            }
        }
    }

    /// Forget the current cache and delete it provider-side, best-effort.
    async fn invalidate_cache(&self) {
        let handle = {
            let mut state = self.cache.lock();
            state.key = None;
            state.handle.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = self.client.delete_context_cache(&handle).await {
                warn!(cache = %handle.name, error = %e, "Failed to delete invalidated context cache");
            }
        }
    }
}

fn cache_key(system: Option<&str>, context: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(system.unwrap_or_default().as_bytes());
    hasher.update(&[0]);
    hasher.update(context.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Accepts `{"1": "...", ...}` or `{"<arc>": {"1": "...", ...}}`.
fn parse_arc_response(arc: &str, content: &str) -> Result<ArcPlot, ApiError> {
    let value: Value = serde_json::from_str(extract_json(content))
        .map_err(|e| ApiError::PlotParse(format!("Invalid arc plot JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| ApiError::PlotParse("Arc plot must be a JSON object".to_string()))?;

    let episodes = match object.get(arc) {
        Some(inner) if inner.is_object() => inner,
        _ => match object.values().next() {
            // A single wrapping object under a different arc name
            Some(inner) if object.len() == 1 && inner.is_object() => inner,
            _ => &value,
        },
    };

    let plot = ArcPlot::from_json(arc, episodes)?;
    if plot.episodes.is_empty() {
        return Err(ApiError::PlotParse(format!("Arc '{}' has no episodes", arc)));
    }
    Ok(plot)
}

/// Strip a fence wrapping the whole episode.
fn clean_episode(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let (Some(newline), true) = (rest.find('\n'), rest.ends_with("```")) {
            let info = rest[..newline].trim();
            if info.is_empty() || info == "markdown" || info == "md" {
                let body = &rest[newline + 1..rest.len() - 3];
                return body.trim().to_string();
            }
        }
    }
    trimmed.to_string()
}
