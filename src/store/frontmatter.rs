//! YAML front matter for stored episodes.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Metadata block at the top of every episode file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeFrontMatter {
    pub title: String,
    pub author: String,
    pub date: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub description: String,
    pub series: String,
    #[serde(default = "default_volume")]
    pub volume: u32,
    pub chapter: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_lang() -> String {
    "ja".to_string()
}

fn default_volume() -> u32 {
    1
}

const FALLBACK_DESCRIPTION: &str = "AI生成小説。";
const DESCRIPTION_CHARS: usize = 100;

/// Inputs for building front matter, supplied by the caller of `save_episode`
#[derive(Debug, Clone, Default)]
pub struct EpisodeMeta {
    pub author: String,
    pub model: Option<String>,
    /// Plot summary the episode was generated from
    pub episode_plot: Option<String>,
}

impl EpisodeFrontMatter {
    /// Build front matter for `content` generated as episode `chapter` of `arc`.
    pub fn build(series: &str, arc: &str, chapter: u32, content: &str, meta: &EpisodeMeta) -> Self {
        let chapter_title = content
            .lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("第{}話", chapter));

        Self {
            title: format!("{} {}", chapter_title, series),
            author: meta.author.clone(),
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            lang: default_lang(),
            description: describe(meta.episode_plot.as_deref()),
            series: series.to_string(),
            volume: default_volume(),
            chapter,
            arc: Some(arc.to_string()),
            model: meta.model.clone(),
        }
    }
}

fn describe(plot: Option<&str>) -> String {
    plot.and_then(|p| p.lines().map(str::trim).find(|l| !l.is_empty()))
        .map(|line| {
            let excerpt: String = line.chars().take(DESCRIPTION_CHARS).collect();
            format!("{}...", excerpt)
        })
        .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string())
}

/// Render a document with front matter followed by the body.
pub fn render(front_matter: &EpisodeFrontMatter, body: &str) -> Result<String, StoreError> {
    let yaml = serde_yaml::to_string(front_matter)
        .map_err(|e| StoreError::Serialization(format!("Failed to write front matter: {}", e)))?;
    Ok(format!("---\n{}---\n\n{}\n", yaml, body.trim_end()))
}

/// Split a document into its raw front matter (if any) and the body.
pub fn split(document: &str) -> (Option<&str>, &str) {
    let rest = match document
        .strip_prefix("---\n")
        .or_else(|| document.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, document),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = rest[offset + line.len()..].trim_start_matches(['\r', '\n']);
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, document)
}

/// Parse front matter and body. Malformed front matter yields `None` with the body intact.
pub fn parse(document: &str) -> (Option<EpisodeFrontMatter>, &str) {
    match split(document) {
        (Some(yaml), body) => (serde_yaml::from_str(yaml).ok(), body),
        (None, body) => (None, body),
    }
}
