//! Configuration System
//!
//! Layered configuration for YumeChain: built-in defaults, the global user file, workspace
//! files and `YUMECHAIN__*` environment overrides. The `[llm]` section carries general
//! provider settings plus optional `[llm.plot]` / `[llm.episode]` task overrides.

use crate::logging::LoggingConfig;
use crate::provider::ProviderType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YumeConfig {
    /// Directory holding one sub-directory per novel; relative paths resolve against the workspace
    #[serde(default = "default_books_dir")]
    pub books_dir: PathBuf,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub hatena: HatenaConfig,
}

fn default_books_dir() -> PathBuf {
    PathBuf::from("books")
}

impl Default for YumeConfig {
    fn default() -> Self {
        Self {
            books_dir: default_books_dir(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
            reader: ReaderConfig::default(),
            hatena: HatenaConfig::default(),
        }
    }
}

impl YumeConfig {
    /// Absolute books directory for a workspace.
    pub fn books_root(&self, workspace_root: &Path) -> PathBuf {
        if self.books_dir.is_absolute() {
            self.books_dir.clone()
        } else {
            workspace_root.join(&self.books_dir)
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.books_dir.as_os_str().is_empty() {
            errors.push(ValidationError::System(
                "books_dir cannot be empty".to_string(),
            ));
        }

        if let Err(e) = self.llm.general().validate() {
            errors.push(ValidationError::Llm("llm".to_string(), e));
        }
        if let Err(e) = self.llm.plot.validate() {
            errors.push(ValidationError::Llm("llm.plot".to_string(), e));
        }
        if let Err(e) = self.llm.episode.validate() {
            errors.push(ValidationError::Llm("llm.episode".to_string(), e));
        }
        if self.llm.cache.ttl_secs == 0 {
            errors.push(ValidationError::Llm(
                "llm.cache".to_string(),
                "ttl_secs must be greater than 0".to_string(),
            ));
        }

        if self.reader.port == 0 {
            errors.push(ValidationError::Reader("port must be non-zero".to_string()));
        }
        if self.reader.max_port_attempts == 0 {
            errors.push(ValidationError::Reader(
                "max_port_attempts must be at least 1".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Settings shared by the general `[llm]` section and each task override section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL override (Azure resource endpoint, proxies, test servers)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Azure OpenAI API version
    #[serde(default)]
    pub api_version: Option<String>,
    /// Azure OpenAI deployment name
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

impl LlmSection {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(provider) = &self.provider {
            ProviderType::parse(provider)?;
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err("model cannot be empty".to_string());
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    temperature
                ));
            }
        }
        if self.max_tokens == Some(0) {
            return Err("max_tokens must be greater than 0".to_string());
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(format!("top_p must be between 0.0 and 1.0, got {}", top_p));
            }
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("endpoint must be an http(s) URL, got '{}'", endpoint));
            }
        }
        Ok(())
    }
}

/// `[llm]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Overrides applied to plot generation
    #[serde(default)]
    pub plot: LlmSection,

    /// Overrides applied to episode generation
    #[serde(default)]
    pub episode: LlmSection,
}

impl LlmConfig {
    /// The general section as an `LlmSection`.
    pub fn general(&self) -> LlmSection {
        LlmSection {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            api_version: self.api_version.clone(),
            deployment: self.deployment.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }
}

/// `[llm.cache]` section: provider-side context caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Contexts shorter than this are sent inline
    #[serde(default = "default_min_context_chars")]
    pub min_context_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_min_context_chars() -> usize {
    4000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            min_context_chars: default_min_context_chars(),
        }
    }
}

/// `[reader]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_reader_host")]
    pub host: String,
    #[serde(default = "default_reader_port")]
    pub port: u16,
    #[serde(default)]
    pub auto_port: bool,
    #[serde(default = "default_true")]
    pub open_browser: bool,
    #[serde(default = "default_max_port_attempts")]
    pub max_port_attempts: u16,
}

fn default_reader_host() -> String {
    "127.0.0.1".to_string()
}

fn default_reader_port() -> u16 {
    5000
}

fn default_max_port_attempts() -> u16 {
    10
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            host: default_reader_host(),
            port: default_reader_port(),
            auto_port: false,
            open_browser: true,
            max_port_attempts: default_max_port_attempts(),
        }
    }
}

/// `[hatena]` section. Environment variables take precedence at publish time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HatenaConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub blog_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Llm(String, String),
    Reader(String),
    System(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Llm(section, msg) => write!(f, "[{}] {}", section, msg),
            ValidationError::Reader(msg) => write!(f, "[reader] {}", msg),
            ValidationError::System(msg) => write!(f, "System: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}
