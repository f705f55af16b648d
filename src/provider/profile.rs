//! Provider profiles: identity, defaults and environment variable names per backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Gemini,
    Anthropic,
    Azure,
}

impl ProviderType {
    pub const ALL: [ProviderType; 4] = [
        ProviderType::Gemini,
        ProviderType::OpenAI,
        ProviderType::Anthropic,
        ProviderType::Azure,
    ];

    /// Parse a provider name. Case-insensitive; accepts a few common aliases.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "azure" | "azure-openai" | "azure_openai" => Ok(ProviderType::Azure),
            other => Err(format!(
                "Unknown provider '{}' (expected one of: openai, gemini, anthropic, azure)",
                other
            )),
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Gemini => "gemini",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Azure => "azure",
        }
    }

    /// Human-readable name used in story front matter and CLI output.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "OpenAI",
            ProviderType::Gemini => "Gemini",
            ProviderType::Anthropic => "Claude",
            ProviderType::Azure => "Azure OpenAI",
        }
    }

    /// Model used when nothing else is configured. Azure has none: the deployment decides.
    pub fn default_model(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("gpt-4o-mini"),
            ProviderType::Gemini => Some("gemini-2.0-flash"),
            ProviderType::Anthropic => Some("claude-3-5-sonnet-latest"),
            ProviderType::Azure => None,
        }
    }

    /// Environment variables checked for the API key, in order.
    pub fn api_key_env_vars(self) -> &'static [&'static str] {
        match self {
            ProviderType::OpenAI => &["OPENAI_API_KEY"],
            ProviderType::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderType::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderType::Azure => &["AZURE_OPENAI_API_KEY"],
        }
    }

    /// Provider-specific model variable consulted after the general settings.
    pub fn model_env_var(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "OPENAI_MODEL",
            ProviderType::Gemini => "GEMINI_MODEL",
            ProviderType::Anthropic => "ANTHROPIC_MODEL",
            ProviderType::Azure => "AZURE_OPENAI_DEPLOYMENT",
        }
    }

    pub fn endpoint_env_var(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_BASE_URL"),
            ProviderType::Gemini => None,
            ProviderType::Anthropic => None,
            ProviderType::Azure => Some("AZURE_OPENAI_ENDPOINT"),
        }
    }

    pub fn default_endpoint(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("https://api.openai.com/v1"),
            ProviderType::Gemini => Some("https://generativelanguage.googleapis.com"),
            ProviderType::Anthropic => Some("https://api.anthropic.com"),
            ProviderType::Azure => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
