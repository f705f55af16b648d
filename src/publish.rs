//! Publishing episodes to Hatena Blog.
//!
//! Episodes are rendered with the same HTML rules as the reader (front matter stripped) and
//! posted through the AtomPub API.

pub mod hatena;

pub use hatena::HatenaClient;

use crate::config::HatenaConfig;
use crate::error::ApiError;
use crate::provider::EnvSource;
use crate::reader::render::format_body_html;
use crate::store::{frontmatter, StoredEpisode};
use serde::Serialize;
use tracing::info;

const MARKDOWN_EXCERPT_CHARS: usize = 200;
const HTML_EXCERPT_CHARS: usize = 500;

/// Result of a create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedEntry {
    pub entry_id: String,
    pub alternate_url: Option<String>,
}

/// Credentials after env/config resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HatenaCredentials {
    pub username: String,
    pub api_key: String,
    pub blog_id: String,
}

impl HatenaCredentials {
    pub fn client(&self) -> Result<HatenaClient, ApiError> {
        HatenaClient::new(
            self.username.clone(),
            self.api_key.clone(),
            self.blog_id.clone(),
        )
    }
}

impl HatenaConfig {
    /// `HATENA_USERNAME`, `HATENA_API_KEY` and `HATENA_BLOG_ID` override the `[hatena]` section.
    pub fn resolve(&self, env: &dyn EnvSource) -> Result<HatenaCredentials, ApiError> {
        let pick = |var: &str, configured: &Option<String>| {
            env.var(var)
                .or_else(|| configured.clone())
                .filter(|v| !v.trim().is_empty())
        };
        let username = pick("HATENA_USERNAME", &self.username);
        let api_key = pick("HATENA_API_KEY", &self.api_key);
        let blog_id = pick("HATENA_BLOG_ID", &self.blog_id);

        match (username, api_key, blog_id) {
            (Some(username), Some(api_key), Some(blog_id)) => Ok(HatenaCredentials {
                username,
                api_key,
                blog_id,
            }),
            (username, api_key, blog_id) => {
                let missing: Vec<&str> = [
                    ("HATENA_USERNAME", username.is_none()),
                    ("HATENA_API_KEY", api_key.is_none()),
                    ("HATENA_BLOG_ID", blog_id.is_none()),
                ]
                .iter()
                .filter(|(_, missing)| *missing)
                .map(|(name, _)| *name)
                .collect();
                Err(ApiError::PublishNotConfigured(format!(
                    "Set {} (or the [hatena] config section)",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Episode document (front matter allowed) to blog HTML, rendered as Markdown like the reader.
pub fn markdown_to_html(content: &str) -> String {
    let (_, body) = frontmatter::split(content);
    format_body_html(body)
}

/// Comma-separated categories, blanks dropped.
pub fn parse_categories(raw: Option<&str>) -> Vec<String> {
    raw.map(|r| {
        r.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Default entry title: `<novel> - <episode stem>`.
pub fn default_blog_title(novel: &str, stem: &str) -> String {
    format!("{} - {}", novel, stem)
}

/// A blog entry ready to post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub title: String,
    pub categories: Vec<String>,
    pub draft: bool,
    /// Episode body without front matter
    pub body: String,
}

impl EntryDraft {
    pub fn from_story(
        novel: &str,
        story: &StoredEpisode,
        blog_title: Option<&str>,
        categories: Option<&str>,
        draft: bool,
    ) -> Self {
        let title = blog_title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_blog_title(novel, &story.stem));
        Self {
            title,
            categories: parse_categories(categories),
            draft,
            body: story.body.clone(),
        }
    }

    pub fn html(&self) -> String {
        format_body_html(&self.body)
    }

    pub fn preview(&self, with_html: bool) -> PublishPreview {
        PublishPreview::build(&self.title, &self.categories, self.draft, &self.body, with_html)
    }

    /// Post the entry as a new blog article.
    pub async fn publish(&self, client: &HatenaClient) -> Result<PublishedEntry, ApiError> {
        let entry = client
            .create_entry(&self.title, &self.html(), &self.categories, self.draft)
            .await?;
        info!(
            blog = client.blog_id(),
            title = %self.title,
            entry_id = %entry.entry_id,
            "Published episode"
        );
        Ok(entry)
    }
}

/// What would be posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishPreview {
    pub title: String,
    pub categories: Vec<String>,
    pub draft: bool,
    pub excerpt: String,
    /// Set when the HTML rendering was requested
    pub html_excerpt: Option<String>,
    pub source_chars: usize,
    pub html_chars: usize,
}

impl PublishPreview {
    pub fn build(
        title: &str,
        categories: &[String],
        draft: bool,
        content: &str,
        with_html: bool,
    ) -> Self {
        let (_, body) = frontmatter::split(content);
        let html = format_body_html(body);
        Self {
            title: title.to_string(),
            categories: categories.to_vec(),
            draft,
            excerpt: excerpt(body, MARKDOWN_EXCERPT_CHARS),
            html_excerpt: with_html.then(|| excerpt(&html, HTML_EXCERPT_CHARS)),
            source_chars: body.chars().count(),
            html_chars: html.chars().count(),
        }
    }
}

fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(limit).collect();
        cut.push_str("...");
        cut
    }
}
