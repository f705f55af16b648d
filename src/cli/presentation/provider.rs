//! Provider command presentation: resolved settings and model lists, text/json.

use super::shared::{format_section_heading, to_pretty_json};
use crate::error::ApiError;
use crate::provider::{Resolved, ResolvedSettings};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;
use std::fmt::Display;

fn row<T: Display>(table: &mut Table, name: &str, value: Option<&Resolved<T>>) {
    match value {
        Some(resolved) => table.add_row(vec![
            name.to_string(),
            resolved.value.to_string(),
            resolved.source.to_string(),
        ]),
        None => table.add_row(vec![name.to_string(), "-".to_string(), "unset".to_string()]),
    };
}

pub fn format_provider_show_text(resolved: &[ResolvedSettings]) -> String {
    let mut sections = Vec::with_capacity(resolved.len());
    for settings in resolved {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Setting", "Value", "Source"]);
        row(&mut table, "provider", Some(&settings.provider));
        row(&mut table, "model", Some(&settings.model));
        table.add_row(vec![
            "api_key".to_string(),
            settings.redacted_api_key(),
            settings.api_key.source.to_string(),
        ]);
        row(&mut table, "endpoint", settings.endpoint.as_ref());
        if let Some(version) = &settings.api_version {
            table.add_row(vec!["api_version".to_string(), version.clone(), String::new()]);
        }
        if let Some(deployment) = &settings.deployment {
            table.add_row(vec!["deployment".to_string(), deployment.clone(), String::new()]);
        }
        row(&mut table, "temperature", settings.temperature.as_ref());
        row(&mut table, "max_tokens", settings.max_tokens.as_ref());
        row(&mut table, "top_p", settings.top_p.as_ref());

        let cache = if settings.cache.enabled {
            format!(
                "enabled (ttl {}s, min {} chars)",
                settings.cache.ttl_secs, settings.cache.min_context_chars
            )
        } else {
            "disabled".to_string()
        };
        sections.push(format!(
            "{}\n{}\nContext cache: {}",
            format_section_heading(&format!("Task: {}", settings.task)),
            table,
            cache
        ));
    }
    sections.join("\n\n")
}

pub fn format_provider_show_json(resolved: &[ResolvedSettings]) -> Result<String, ApiError> {
    let tasks: Vec<_> = resolved
        .iter()
        .map(|settings| {
            json!({
                "task": settings.task,
                "provider": settings.provider,
                "model": settings.model,
                "api_key": {
                    "value": settings.redacted_api_key(),
                    "source": settings.api_key.source,
                },
                "endpoint": settings.endpoint,
                "api_version": settings.api_version,
                "deployment": settings.deployment,
                "temperature": settings.temperature,
                "max_tokens": settings.max_tokens,
                "top_p": settings.top_p,
                "cache": settings.cache,
            })
        })
        .collect();
    to_pretty_json(&json!({ "tasks": tasks }))
}

pub fn format_model_list(settings: &ResolvedSettings, models: &[String]) -> String {
    if models.is_empty() {
        return format!("No models returned by {}.", settings.provider.value.display_name());
    }
    let mut out = format!(
        "Models available from {} ({}):\n",
        settings.provider.value.display_name(),
        models.len()
    );
    for model in models {
        let marker = if *model == settings.model.value { "*" } else { " " };
        out.push_str(&format!("  {} {}\n", marker, model));
    }
    out.push_str("\n* current model");
    out
}
