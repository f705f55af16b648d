//! Error types for YumeChain.

use std::path::PathBuf;
use thiserror::Error;

/// Project store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Project not found: {0}. Run `yumechain init --title {0}` first.")]
    ProjectNotFound(String),

    #[error("Setting file not found: {0}")]
    SettingNotFound(PathBuf),

    #[error("Plot file not found: {0}. Run `yumechain generate-plot` first.")]
    PlotNotFound(PathBuf),

    #[error("Story not found: {0}")]
    StoryNotFound(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Service-level errors surfaced by every YumeChain operation
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Context caching not supported by provider: {0}")]
    CacheUnsupported(String),

    #[error("Failed to parse plot: {0}")]
    PlotParse(String),

    #[error("Arc '{0}' not found in plot")]
    ArcNotFound(String),

    #[error("Episode {episode} not found in arc '{arc}'")]
    EpisodeNotFound { arc: String, episode: u32 },

    #[error("Invalid episode specification: {0}")]
    InvalidEpisodeSpec(String),

    #[error("Storage error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Publisher not configured: {0}")]
    PublishNotConfigured(String),

    #[error("Reader failed: {0}")]
    ReaderFailed(String),
}

impl ApiError {
    /// Whether a request that used a provider-side context cache may be retried inline.
    pub fn is_cache_recoverable(&self) -> bool {
        !matches!(
            self,
            ApiError::ProviderAuthFailed(_)
                | ApiError::ProviderRateLimit(_)
                | ApiError::ProviderNotConfigured(_)
                | ApiError::ConfigError(_)
        )
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
