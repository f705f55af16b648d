//! Token accounting across calls.

use crate::provider::TokenUsage;
use serde::Serialize;
use std::fmt;

/// Running totals for one `LlmClient`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub requests: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cached_tokens: u64,
}

impl UsageTotals {
    pub fn record(&mut self, usage: &TokenUsage) {
        self.requests += 1;
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.cached_tokens += u64::from(usage.cached_tokens);
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Share of prompt tokens served from a context cache, in percent.
    pub fn cache_hit_percent(&self) -> f64 {
        if self.prompt_tokens == 0 {
            0.0
        } else {
            self.cached_tokens as f64 * 100.0 / self.prompt_tokens as f64
        }
    }
}

impl fmt::Display for UsageTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests, {} tokens (input {}, output {}, cached {})",
            self.requests,
            self.total_tokens(),
            self.prompt_tokens,
            self.completion_tokens,
            self.cached_tokens
        )
    }
}
