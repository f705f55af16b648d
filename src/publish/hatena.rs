//! Hatena Blog AtomPub client with WSSE authentication.

use super::PublishedEntry;
use crate::error::ApiError;
use crate::reader::render::escape_html;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use regex::Regex;
use reqwest::{Client, Method};
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://blog.hatena.ne.jp";
const NONCE_BYTES: usize = 24;

/// Hatena Blog client
pub struct HatenaClient {
    client: Client,
    username: String,
    api_key: String,
    blog_id: String,
    base_url: String,
}

impl HatenaClient {
    pub fn new(username: String, api_key: String, blog_id: String) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ApiError::PublishFailed(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            username,
            api_key,
            blog_id,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn blog_id(&self) -> &str {
        &self.blog_id
    }

    fn collection_url(&self) -> String {
        format!("{}/{}/{}/atom/entry", self.base_url, self.username, self.blog_id)
    }

    /// Post a new entry. `html` is the already rendered body.
    pub async fn create_entry(
        &self,
        title: &str,
        html: &str,
        categories: &[String],
        draft: bool,
    ) -> Result<PublishedEntry, ApiError> {
        let body = build_entry_xml(&self.username, title, html, categories, draft);
        let text = self.send(Method::POST, self.collection_url(), Some(body)).await?;
        let entry = parse_entry_response(&text)?;
        info!(entry_id = %entry.entry_id, draft, "Created blog entry");
        Ok(entry)
    }

    pub async fn update_entry(
        &self,
        entry_id: &str,
        title: &str,
        html: &str,
        categories: &[String],
        draft: bool,
    ) -> Result<PublishedEntry, ApiError> {
        let body = build_entry_xml(&self.username, title, html, categories, draft);
        let url = format!("{}/{}", self.collection_url(), entry_id);
        let text = self.send(Method::PUT, url, Some(body)).await?;
        let entry = parse_entry_response(&text)?;
        info!(entry_id = %entry.entry_id, draft, "Updated blog entry");
        Ok(entry)
    }

    pub async fn delete_entry(&self, entry_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.collection_url(), entry_id);
        self.send(Method::DELETE, url, None).await?;
        info!(entry_id, "Deleted blog entry");
        Ok(())
    }

    pub async fn get_entry(&self, entry_id: &str) -> Result<PublishedEntry, ApiError> {
        let url = format!("{}/{}", self.collection_url(), entry_id);
        let text = self.send(Method::GET, url, None).await?;
        parse_entry_response(&text)
    }

    async fn send(&self, method: Method, url: String, body: Option<String>) -> Result<String, ApiError> {
        debug!(method = %method, url = %url, "Hatena request");
        let mut request = self
            .client
            .request(method, &url)
            .header("X-WSSE", wsse_header(&self.username, &self.api_key));
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/xml; charset=utf-8")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::PublishFailed(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::PublishFailed(format!(
                "Hatena Blog returned {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }
        Ok(text)
    }
}

/// `X-WSSE` value with a fresh nonce and timestamp.
pub fn wsse_header(username: &str, api_key: &str) -> String {
    let mut nonce = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce);
    let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    wsse_header_with(username, api_key, &nonce, &created)
}

/// `PasswordDigest = base64(sha1(nonce + created + api_key))`
pub fn wsse_header_with(username: &str, api_key: &str, nonce: &[u8], created: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(api_key.as_bytes());
    let digest = BASE64.encode(hasher.finalize());

    format!(
        r#"UsernameToken Username="{}", PasswordDigest="{}", Nonce="{}", Created="{}""#,
        username,
        digest,
        BASE64.encode(nonce),
        created
    )
}

/// Atom entry document for create and update.
pub fn build_entry_xml(
    author: &str,
    title: &str,
    html: &str,
    categories: &[String],
    draft: bool,
) -> String {
    let category_tags: String = categories
        .iter()
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("  <category term=\"{}\" />\n", escape_html(c.trim())))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<entry xmlns="http://www.w3.org/2005/Atom"
       xmlns:app="http://www.w3.org/2007/app">
  <title>{title}</title>
  <author><name>{author}</name></author>
  <content type="text/html">{content}</content>
{categories}  <app:control>
    <app:draft>{draft}</app:draft>
  </app:control>
</entry>"#,
        title = escape_html(title),
        author = escape_html(author),
        content = escape_html(html),
        categories = category_tags,
        draft = if draft { "yes" } else { "no" },
    )
}

fn regex(pattern: &str) -> Result<Regex, ApiError> {
    Regex::new(pattern).map_err(|e| ApiError::PublishFailed(format!("Invalid pattern: {}", e)))
}

/// Entry id and public URL from an Atom entry response.
pub fn parse_entry_response(xml: &str) -> Result<PublishedEntry, ApiError> {
    let link_tag = regex(r"<link\b[^>]*>")?;
    let rel = regex(r#"\brel="([^"]*)""#)?;
    let href = regex(r#"\bhref="([^"]*)""#)?;

    let mut alternate_url = None;
    let mut edit_url = None;
    for tag in link_tag.find_iter(xml) {
        let tag = tag.as_str();
        let (Some(rel), Some(href)) = (rel.captures(tag), href.captures(tag)) else {
            continue;
        };
        match &rel[1] {
            "alternate" => alternate_url = Some(unescape_xml(&href[1])),
            "edit" => edit_url = Some(unescape_xml(&href[1])),
            _ => {}
        }
    }

    let entry_id = edit_url
        .as_deref()
        .and_then(|url| url.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| {
            regex(r"<id>[^<]*-(\d+)</id>")
                .ok()
                .and_then(|re| re.captures(xml).map(|c| c[1].to_string()))
        })
        .ok_or_else(|| {
            ApiError::PublishFailed("Response did not contain an entry id".to_string())
        })?;

    Ok(PublishedEntry {
        entry_id,
        alternate_url,
    })
}

fn unescape_xml(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
