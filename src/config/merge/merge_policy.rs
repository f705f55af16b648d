//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("books_dir", "books")?
        .set_default("llm.cache.enabled", true)?
        .set_default("llm.cache.ttl_secs", 3600_i64)?
        .set_default("llm.cache.min_context_chars", 4000_i64)?
        .set_default("reader.host", "127.0.0.1")?
        .set_default("reader.port", 5000_i64)
}
