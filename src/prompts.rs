//! Prompt templates for plot and episode generation.
//!
//! Templates are embedded in the binary at compile time. Every request has the same shape:
//! a system instruction, a shared context (settings, and the plot for episodes) that is the
//! cacheable prefix, and a short task prompt.

use crate::provider::CompletionRequest;

pub const SYSTEM_PROMPT: &str = include_str!("../prompts/system.md");
pub const PLOT_PROMPT: &str = include_str!("../prompts/plot.md");
pub const ARC_PLOT_PROMPT: &str = include_str!("../prompts/arc_plot.md");
pub const EPISODE_PROMPT: &str = include_str!("../prompts/episode.md");

/// Written to `setting.md` when a project is created
pub const SETTING_TEMPLATE: &str = include_str!("../prompts/setting_template.md");

/// Replace `{key}` placeholders in one pass over the template, so braces inside inserted
/// values are never expanded. Unknown placeholders and other braces are left alone.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substitution = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (close, *value))
        });
        match substitution {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Position of an episode inside the plot
#[derive(Debug, Clone, Copy)]
pub struct EpisodePosition<'a> {
    pub arc: &'a str,
    pub episode: u32,
}

/// Builds the request skeletons for both generation tasks
pub struct PromptSet;

impl PromptSet {
    /// Full plot from the settings.
    pub fn plot(setting: &str) -> CompletionRequest {
        CompletionRequest::new(PLOT_PROMPT.trim_end())
            .with_system(SYSTEM_PROMPT.trim_end())
            .with_context(settings_context(setting))
    }

    /// One arc. Existing arcs are shown so the new arc stays consistent with them.
    pub fn arc_plot(setting: &str, arc: &str, existing: Option<&str>) -> CompletionRequest {
        let existing = match existing.map(str::trim).filter(|e| !e.is_empty()) {
            Some(json) => format!("## 既存のプロット\n```json\n{}\n```\n", json),
            None => String::new(),
        };
        let prompt = render(ARC_PLOT_PROMPT, &[("arc", arc), ("existing", &existing)]);

        CompletionRequest::new(prompt.trim_end())
            .with_system(SYSTEM_PROMPT.trim_end())
            .with_context(settings_context(setting))
    }

    /// Episode with the whole plot in the shared context.
    pub fn episode(
        setting: &str,
        plot_json: &str,
        position: EpisodePosition<'_>,
        episode_plot: &str,
        previous_episode: Option<&str>,
    ) -> CompletionRequest {
        let heading = format!("「{}」編 第{}話", position.arc, position.episode);
        CompletionRequest::new(episode_prompt(&heading, episode_plot, previous_episode))
            .with_system(SYSTEM_PROMPT.trim_end())
            .with_context(episode_context(setting, plot_json))
    }

    /// Episode from its own plot text only.
    pub fn standalone_episode(setting: &str, episode_plot: &str) -> CompletionRequest {
        CompletionRequest::new(episode_prompt("次の話", episode_plot, None))
            .with_system(SYSTEM_PROMPT.trim_end())
            .with_context(settings_context(setting))
    }
}

fn settings_context(setting: &str) -> String {
    format!("# 設定資料\n\n{}", setting.trim())
}

/// Shared prefix of every episode in a batch; identical text keeps the context cache valid.
pub fn episode_context(setting: &str, plot_json: &str) -> String {
    format!(
        "{}\n\n# 全体プロット\n\n```json\n{}\n```",
        settings_context(setting),
        plot_json.trim()
    )
}

fn episode_prompt(heading: &str, episode_plot: &str, previous_episode: Option<&str>) -> String {
    let previous = match previous_episode.map(str::trim).filter(|p| !p.is_empty()) {
        Some(body) => format!("\n## 前の話の本文\n{}\n", body),
        None => String::new(),
    };
    render(
        EPISODE_PROMPT,
        &[
            ("heading", heading),
            ("episode_plot", episode_plot.trim()),
            ("previous", &previous),
        ],
    )
    .trim_end()
    .to_string()
}
