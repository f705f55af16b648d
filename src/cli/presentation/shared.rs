//! Shared presentation helpers: headings, status marks, usage and JSON output.

use crate::error::{ApiError, StoreError};
use crate::llm::UsageTotals;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub(super) fn ok_mark() -> String {
    format!("{}", "✓".green())
}

pub(super) fn missing_mark() -> String {
    format!("{}", "✗".red())
}

pub(super) fn optional_mark() -> String {
    format!("{}", "○".yellow())
}

pub(super) fn format_elapsed(ms: u128) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

/// Token usage summary line printed after generation.
pub fn format_usage(usage: &UsageTotals) -> String {
    if usage.requests == 0 {
        return "Usage: no requests".to_string();
    }
    let mut line = format!("Usage: {}", usage);
    if usage.cached_tokens > 0 {
        line.push_str(&format!(", cache hit {:.0}%", usage.cache_hit_percent()));
    }
    line
}

pub(super) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StoreError(StoreError::Serialization(e.to_string())))
}
