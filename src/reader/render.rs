//! HTML rendering for the reader.

use super::{NovelView, StoryView};
use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Percent-encode one path segment.
pub fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Episode body (Markdown) to HTML.
///
/// Headings move down one level since the page title owns `h1`. Single newlines become
/// `<br />`, and raw HTML in the body is shown as text.
pub fn format_body_html(body: &str) -> String {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(body, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Heading {
            level,
            id,
            classes,
            attrs,
        }) => Event::Start(Tag::Heading {
            level: demote(level),
            id,
            classes,
            attrs,
        }),
        Event::End(TagEnd::Heading(level)) => Event::End(TagEnd::Heading(demote(level))),
        other => other,
    });

    let mut out = String::with_capacity(body.len() + body.len() / 2);
    html::push_html(&mut out, events);
    out.trim_end().to_string()
}

fn demote(level: HeadingLevel) -> HeadingLevel {
    match level {
        HeadingLevel::H1 => HeadingLevel::H2,
        HeadingLevel::H2 => HeadingLevel::H3,
        HeadingLevel::H3 => HeadingLevel::H4,
        HeadingLevel::H4 => HeadingLevel::H5,
        HeadingLevel::H5 | HeadingLevel::H6 => HeadingLevel::H6,
    }
}

fn page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link rel="stylesheet" href="/static/novel.css">
</head>
<body>
<header><a href="/">YumeChain Reader</a></header>
<main>
{content}
</main>
</body>
</html>
"#,
        title = escape_html(title),
        content = content
    )
}

pub fn index_page(titles: &[String]) -> String {
    let items = if titles.is_empty() {
        "<p>まだ小説がありません。</p>".to_string()
    } else {
        let list: String = titles
            .iter()
            .map(|t| {
                format!(
                    "<li><a href=\"/novel/{}\">{}</a></li>\n",
                    encode_segment(t),
                    escape_html(t)
                )
            })
            .collect();
        format!("<ul class=\"stories\">\n{}</ul>", list)
    };
    page("小説一覧", &format!("<h1>小説一覧</h1>\n{}", items))
}

pub fn novel_page(novel: &NovelView) -> String {
    let items: String = novel
        .stories
        .iter()
        .map(|story| {
            format!(
                "<li><a href=\"{}\">{}</a> <span class=\"meta\">{}</span></li>\n",
                story_href(&novel.title, story),
                escape_html(&story.title),
                escape_html(&story.date)
            )
        })
        .collect();
    let content = format!(
        "<h1>{}</h1>\n<p class=\"meta\">全{}話</p>\n<ul class=\"stories\">\n{}</ul>",
        escape_html(&novel.title),
        novel.stories.len(),
        items
    );
    page(&novel.title, &content)
}

pub fn story_page(novel: &NovelView, index: usize) -> String {
    let story = &novel.stories[index];
    let previous = index
        .checked_sub(1)
        .and_then(|i| novel.stories.get(i))
        .map(|s| format!("<a href=\"{}\">&laquo; 前の話</a>", story_href(&novel.title, s)))
        .unwrap_or_else(|| "<span></span>".to_string());
    let next = novel
        .stories
        .get(index + 1)
        .map(|s| format!("<a href=\"{}\">次の話 &raquo;</a>", story_href(&novel.title, s)))
        .unwrap_or_else(|| "<span></span>".to_string());

    let content = format!(
        "<p class=\"meta\"><a href=\"/novel/{}\">{}</a> / {}</p>\n<h1>{}</h1>\n{}\n<nav class=\"pager\">{}{}</nav>",
        encode_segment(&novel.title),
        escape_html(&novel.title),
        escape_html(&story.date),
        escape_html(&story.title),
        format_body_html(&story.body),
        previous,
        next
    );
    page(&story.title, &content)
}

pub fn not_found_page(what: &str) -> String {
    page(
        "見つかりません",
        &format!("<h1>見つかりません</h1>\n<p>{}</p>", escape_html(what)),
    )
}

fn story_href(title: &str, story: &StoryView) -> String {
    format!("/novel/{}/{}", encode_segment(title), encode_segment(&story.slug))
}
