//! Per-task provider settings resolution.
//!
//! Each generation task (plot, episode) resolves its own provider, model and sampling
//! options. For provider, model, temperature, max_tokens and top_p the first match wins:
//!
//! 1. task environment variable (`PLOT_LLM_MODEL`, `EPISODE_LLM_PROVIDER`, ...)
//! 2. task config section (`[llm.plot]`, `[llm.episode]`)
//! 3. general environment variable (`LLM_MODEL`, ...)
//! 4. general config section (`[llm]`)
//! 5. provider model variable (model only, e.g. `GEMINI_MODEL`)
//! 6. built-in default
//!
//! General-level model and credentials only apply when the general level targets the same
//! provider the task resolved to, so a task that switches provider never inherits a model
//! name or key meant for another backend.

use super::{CompletionOptions, ProviderType};
use crate::config::{CacheConfig, LlmConfig, LlmSection};
use crate::error::ApiError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Default Azure OpenAI data-plane API version
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Generation task kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Plot,
    Episode,
}

impl TaskKind {
    pub fn env_prefix(self) -> &'static str {
        match self {
            TaskKind::Plot => "PLOT",
            TaskKind::Episode => "EPISODE",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Plot => "plot",
            TaskKind::Episode => "episode",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ApiError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plot" => Ok(TaskKind::Plot),
            "episode" => Ok(TaskKind::Episode),
            other => Err(ApiError::ConfigError(format!(
                "Unknown task '{}' (expected 'plot' or 'episode')",
                other
            ))),
        }
    }

    fn section(self, llm: &LlmConfig) -> &LlmSection {
        match self {
            TaskKind::Plot => &llm.plot,
            TaskKind::Episode => &llm.episode,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read access to environment variables. Empty values count as unset.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum SettingSource {
    TaskEnv(String),
    TaskConfig(TaskKind),
    GeneralEnv(String),
    GeneralConfig,
    ProviderEnv(String),
    Default,
}

impl fmt::Display for SettingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingSource::TaskEnv(var) | SettingSource::GeneralEnv(var) | SettingSource::ProviderEnv(var) => {
                write!(f, "env {}", var)
            }
            SettingSource::TaskConfig(task) => write!(f, "config [llm.{}]", task),
            SettingSource::GeneralConfig => f.write_str("config [llm]"),
            SettingSource::Default => f.write_str("default"),
        }
    }
}

/// A value with its origin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: SettingSource,
}

impl<T> Resolved<T> {
    fn new(value: T, source: SettingSource) -> Self {
        Self { value, source }
    }
}

/// Effective settings for one task
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub task: TaskKind,
    pub provider: Resolved<ProviderType>,
    pub model: Resolved<String>,
    pub api_key: Resolved<String>,
    pub endpoint: Option<Resolved<String>>,
    /// Azure only
    pub api_version: Option<String>,
    /// Azure only
    pub deployment: Option<String>,
    pub temperature: Option<Resolved<f32>>,
    pub max_tokens: Option<Resolved<u32>>,
    pub top_p: Option<Resolved<f32>>,
    pub cache: CacheConfig,
}

impl ResolvedSettings {
    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature.as_ref().map(|r| r.value),
            max_tokens: self.max_tokens.as_ref().map(|r| r.value),
            top_p: self.top_p.as_ref().map(|r| r.value),
        }
    }

    pub fn endpoint_value(&self) -> Option<String> {
        self.endpoint.as_ref().map(|r| r.value.clone())
    }

    /// API key with everything but the last four characters masked.
    pub fn redacted_api_key(&self) -> String {
        let key = &self.api_key.value;
        let count = key.chars().count();
        if count <= 8 {
            return "*".repeat(count);
        }
        let tail: String = key.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), tail)
    }
}

/// Resolve the settings for `task` from config and environment.
pub fn resolve_settings(
    llm: &LlmConfig,
    task: TaskKind,
    env: &dyn EnvSource,
) -> Result<ResolvedSettings, ApiError> {
    let general = llm.general();
    let section = task.section(llm);

    let configured_general = general
        .provider
        .as_deref()
        .map(|p| parse_provider_value("llm.provider", p))
        .transpose()?;
    let configured_task = section
        .provider
        .as_deref()
        .map(|p| parse_provider_value(&format!("llm.{}.provider", task), p))
        .transpose()?;

    let general_provider = match resolve_general_field(
        env,
        "PROVIDER",
        configured_general,
        parse_provider_value,
    )? {
        Some(resolved) => resolved,
        None => Resolved::new(ProviderType::Gemini, SettingSource::Default),
    };

    let provider = match resolve_task_field(env, task, "PROVIDER", configured_task, parse_provider_value)? {
        Some(resolved) => resolved,
        None => general_provider.clone(),
    };
    let provider_type = provider.value;
    let general_applies = general_provider.value == provider_type;

    let model = resolve_model(env, task, section, &general, provider_type, general_applies)?;

    let temperature = resolve_field(env, task, "TEMPERATURE", section.temperature, general.temperature, parse_f32_value)?;
    let max_tokens = resolve_field(env, task, "MAX_TOKENS", section.max_tokens, general.max_tokens, parse_u32_value)?;
    let top_p = resolve_field(env, task, "TOP_P", section.top_p, general.top_p, parse_f32_value)?;

    let general_ref = general_applies.then_some(&general);

    let api_key = resolve_credential(
        task,
        section.api_key.clone(),
        general_ref.and_then(|g| g.api_key.clone()),
        provider_type
            .api_key_env_vars()
            .iter()
            .find_map(|var| env.var(var).map(|v| (var.to_string(), v))),
    )
    .ok_or_else(|| {
        ApiError::ProviderNotConfigured(format!(
            "No API key for {} ({} task). Set {} or api_key in [llm.{}].",
            provider_type.display_name(),
            task,
            provider_type.api_key_env_vars().join(" or "),
            task
        ))
    })?;

    let endpoint = resolve_credential(
        task,
        section.endpoint.clone(),
        general_ref.and_then(|g| g.endpoint.clone()),
        provider_type
            .endpoint_env_var()
            .and_then(|var| env.var(var).map(|v| (var.to_string(), v))),
    )
    .or_else(|| {
        provider_type
            .default_endpoint()
            .map(|url| Resolved::new(url.to_string(), SettingSource::Default))
    })
    .map(|mut r| {
        r.value = r.value.trim_end_matches('/').to_string();
        r
    });

    let (api_version, deployment) = if provider_type == ProviderType::Azure {
        if endpoint.is_none() {
            return Err(ApiError::ProviderNotConfigured(format!(
                "Azure OpenAI needs an endpoint ({} task). Set AZURE_OPENAI_ENDPOINT or endpoint in [llm.{}].",
                task, task
            )));
        }
        let api_version = section
            .api_version
            .clone()
            .or_else(|| general_ref.and_then(|g| g.api_version.clone()))
            .or_else(|| env.var("AZURE_OPENAI_API_VERSION"))
            .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
        let deployment = section
            .deployment
            .clone()
            .or_else(|| general_ref.and_then(|g| g.deployment.clone()))
            .or_else(|| env.var("AZURE_OPENAI_DEPLOYMENT"))
            .unwrap_or_else(|| model.value.clone());
        (Some(api_version), Some(deployment))
    } else {
        (None, None)
    };

    Ok(ResolvedSettings {
        task,
        provider,
        model,
        api_key,
        endpoint,
        api_version,
        deployment,
        temperature,
        max_tokens,
        top_p,
        cache: llm.cache.clone(),
    })
}

fn resolve_model(
    env: &dyn EnvSource,
    task: TaskKind,
    section: &LlmSection,
    general: &LlmSection,
    provider: ProviderType,
    general_applies: bool,
) -> Result<Resolved<String>, ApiError> {
    if let Some(resolved) = resolve_task_field(env, task, "MODEL", section.model.clone(), parse_string_value)? {
        return Ok(resolved);
    }
    if general_applies {
        if let Some(resolved) = resolve_general_field(env, "MODEL", general.model.clone(), parse_string_value)? {
            return Ok(resolved);
        }
    }
    let model_var = provider.model_env_var();
    if let Some(model) = env.var(model_var) {
        return Ok(Resolved::new(model, SettingSource::ProviderEnv(model_var.to_string())));
    }
    provider
        .default_model()
        .map(|m| Resolved::new(m.to_string(), SettingSource::Default))
        .ok_or_else(|| {
            ApiError::ProviderNotConfigured(format!(
                "No model or deployment for {} ({} task). Set {} or model in [llm.{}].",
                provider.display_name(),
                task,
                model_var,
                task
            ))
        })
}

fn resolve_field<T>(
    env: &dyn EnvSource,
    task: TaskKind,
    field: &str,
    task_value: Option<T>,
    general_value: Option<T>,
    parse: fn(&str, &str) -> Result<T, ApiError>,
) -> Result<Option<Resolved<T>>, ApiError> {
    if let Some(resolved) = resolve_task_field(env, task, field, task_value, parse)? {
        return Ok(Some(resolved));
    }
    resolve_general_field(env, field, general_value, parse)
}

fn resolve_task_field<T>(
    env: &dyn EnvSource,
    task: TaskKind,
    field: &str,
    task_value: Option<T>,
    parse: fn(&str, &str) -> Result<T, ApiError>,
) -> Result<Option<Resolved<T>>, ApiError> {
    let var = format!("{}_LLM_{}", task.env_prefix(), field);
    if let Some(raw) = env.var(&var) {
        let value = parse(&var, &raw)?;
        return Ok(Some(Resolved::new(value, SettingSource::TaskEnv(var))));
    }
    Ok(task_value.map(|v| Resolved::new(v, SettingSource::TaskConfig(task))))
}

fn resolve_general_field<T>(
    env: &dyn EnvSource,
    field: &str,
    general_value: Option<T>,
    parse: fn(&str, &str) -> Result<T, ApiError>,
) -> Result<Option<Resolved<T>>, ApiError> {
    let var = format!("LLM_{}", field);
    if let Some(raw) = env.var(&var) {
        let value = parse(&var, &raw)?;
        return Ok(Some(Resolved::new(value, SettingSource::GeneralEnv(var))));
    }
    Ok(general_value.map(|v| Resolved::new(v, SettingSource::GeneralConfig)))
}

fn resolve_credential(
    task: TaskKind,
    task_value: Option<String>,
    general_value: Option<String>,
    env_value: Option<(String, String)>,
) -> Option<Resolved<String>> {
    task_value
        .filter(|v| !v.trim().is_empty())
        .map(|v| Resolved::new(v, SettingSource::TaskConfig(task)))
        .or_else(|| {
            general_value
                .filter(|v| !v.trim().is_empty())
                .map(|v| Resolved::new(v, SettingSource::GeneralConfig))
        })
        .or_else(|| env_value.map(|(var, v)| Resolved::new(v, SettingSource::ProviderEnv(var))))
}

fn parse_provider_value(var: &str, raw: &str) -> Result<ProviderType, ApiError> {
    ProviderType::parse(raw).map_err(|e| ApiError::ConfigError(format!("{}: {}", var, e)))
}

fn parse_string_value(_var: &str, raw: &str) -> Result<String, ApiError> {
    Ok(raw.trim().to_string())
}

fn parse_f32_value(var: &str, raw: &str) -> Result<f32, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::ConfigError(format!("{} must be a number, got '{}'", var, raw)))
}

fn parse_u32_value(var: &str, raw: &str) -> Result<u32, ApiError> {
    raw.trim().parse().map_err(|_| {
        ApiError::ConfigError(format!("{} must be a positive integer, got '{}'", var, raw))
    })
}
