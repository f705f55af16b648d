//! Publish presentation: episode list, preview and result.

use super::shared::ok_mark;
use crate::publish::{EntryDraft, PublishPreview, PublishedEntry};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

const RULE: &str = "--------------------------------------------------";

pub fn format_story_list(title: &str, stems: &[String]) -> String {
    if stems.is_empty() {
        return format!("No episodes to publish in '{}'.", title);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["No.", "Episode", "File"]);
    for (i, stem) in stems.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), stem.clone(), format!("{}.md", stem)]);
    }
    format!(
        "Episodes in '{}':\n{}\n\nPublish one with: yumechain publish --title {} --episode <episode>",
        title, table, title
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn categories_line(categories: &[String]) -> String {
    if categories.is_empty() {
        "none".to_string()
    } else {
        categories.join(", ")
    }
}

pub fn format_publish_preview(preview: &PublishPreview) -> String {
    let mut out = format!("{}\n", "Preview (nothing is posted)".bold());
    out.push_str(&format!("Title: {}\n", preview.title));
    out.push_str(&format!("Categories: {}\n", categories_line(&preview.categories)));
    out.push_str(&format!("Draft: {}\n", yes_no(preview.draft)));
    match &preview.html_excerpt {
        Some(html) => {
            out.push_str(&format!("HTML:\n{}\n{}\n{}\n", RULE, html, RULE));
            out.push_str(&format!(
                "Source: {} chars, HTML: {} chars",
                preview.source_chars, preview.html_chars
            ));
        }
        None => {
            out.push_str(&format!("Content:\n{}\n{}\n{}\n", RULE, preview.excerpt, RULE));
            out.push_str(&format!("Length: {} chars", preview.source_chars));
        }
    }
    out
}

/// Summary shown before asking for confirmation.
pub fn format_publish_confirmation(blog_id: &str, draft: &EntryDraft) -> String {
    format!(
        "Publishing to Hatena Blog\n  Blog: {}\n  Title: {}\n  Categories: {}\n  Draft: {}",
        blog_id,
        draft.title,
        categories_line(&draft.categories),
        yes_no(draft.draft)
    )
}

pub fn format_published(draft: &EntryDraft, entry: &PublishedEntry) -> String {
    let mut out = format!("{} Published '{}' (entry {})", ok_mark(), draft.title, entry.entry_id);
    if let Some(url) = &entry.alternate_url {
        out.push_str(&format!("\nURL: {}", url));
    }
    if draft.draft {
        out.push_str(&format!(
            "\n{}",
            "Saved as a draft. Publish it from the blog dashboard.".yellow()
        ));
    }
    out
}
