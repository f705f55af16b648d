//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, StoreError};

/// Map domain/service errors to a string for CLI output, with a hint line when one helps.
pub fn map_error(e: &ApiError) -> String {
    match error_hint(e) {
        Some(hint) => format!("Error: {}\nHint: {}", e, hint),
        None => format!("Error: {}", e),
    }
}

/// Next step for errors the user can fix.
pub fn error_hint(e: &ApiError) -> Option<&'static str> {
    match e {
        ApiError::ProviderAuthFailed(_) => {
            Some("Check the API key for this provider (see 'yumechain provider show').")
        }
        ApiError::ProviderNotConfigured(_) => Some(
            "Set the provider API key in .env (e.g. GEMINI_API_KEY) or the [llm] config section.",
        ),
        ApiError::ProviderRateLimit(_) => Some("Wait a moment and retry, or lower the batch size."),
        ApiError::ProviderModelNotFound(_) => {
            Some("List available models with 'yumechain provider models'.")
        }
        ApiError::PublishNotConfigured(_) => Some(
            "Add HATENA_USERNAME, HATENA_API_KEY and HATENA_BLOG_ID (e.g. xxxxx.hatenablog.com) to .env.",
        ),
        ApiError::PublishFailed(msg) if msg.contains(" 401") => {
            Some("Authentication failed. Check the Hatena Blog credentials.")
        }
        ApiError::PublishFailed(msg) if msg.contains(" 403") => {
            Some("Access denied. Check the blog id and AtomPub settings.")
        }
        ApiError::ArcNotFound(_) | ApiError::EpisodeNotFound { .. } => {
            Some("Check plot.json or run 'yumechain generate-plot' first.")
        }
        ApiError::StoreError(StoreError::SettingNotFound(_)) => {
            Some("Edit the setting.md created by 'yumechain init'.")
        }
        _ => None,
    }
}
