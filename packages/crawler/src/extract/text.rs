//! Main-text and metadata extraction from article HTML.
//!
//! Precision over recall: the extractor looks for a dedicated article
//! container before falling back to the body, and skips navigation,
//! boilerplate and comment subtrees while collecting text. Tables are
//! kept, comments are not.

use scraper::{ElementRef, Html, Selector};

/// Raw extraction output before validation. `published` is the
/// verbatim value from the page; parsing happens later.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    pub title: Option<String>,
    pub text: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub description: Option<String>,
    pub sitename: Option<String>,
    pub language: Option<String>,
}

/// Containers likely to hold the article body, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".article-body",
    ".post-content",
    ".entry-content",
    "#content",
    "#main",
];

/// Elements whose entire subtree is never article text.
const SKIP_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "iframe", "form", "svg",
    "button", "figcaption",
];

/// Class/id fragments marking comment and share widgets.
const SKIP_MARKERS: &[&str] = &[
    "comment", "sidebar", "related", "share", "social", "newsletter", "advert", "cookie", "menu",
    "breadcrumb",
];

/// Block-level elements that end a line when collecting text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "table",
    "ul", "ol", "br",
];

pub fn extract_page(html: &str) -> PageText {
    let document = Html::parse_document(html);

    PageText {
        title: extract_title(&document),
        text: extract_main_text(&document),
        author: extract_author(&document),
        published: extract_published(&document),
        description: meta_content(&document, &["meta[name='description']", "meta[property='og:description']"]),
        sitename: meta_content(&document, &["meta[property='og:site_name']"]),
        language: extract_language(&document),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    if let Some(title) = meta_content(document, &["meta[property='og:title']"]) {
        return Some(title);
    }
    for selector_str in ["title", "h1"] {
        let selector = Selector::parse(selector_str).ok()?;
        if let Some(el) = document.select(&selector).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn extract_author(document: &Html) -> Option<String> {
    if let Some(author) = meta_content(
        document,
        &[
            "meta[name='author']",
            "meta[property='article:author']",
            "meta[name='parsely-author']",
        ],
    ) {
        // Some sites put a profile URL in article:author; skip those.
        if !author.starts_with("http") {
            return Some(author);
        }
    }
    for selector_str in ["[rel='author']", ".byline", ".author-name", "[itemprop='author']"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = document.select(&selector).next() {
                let text = el.text().collect::<String>().trim().to_string();
                if !text.is_empty() && text.len() < 120 {
                    return Some(text);
                }
            }
        }
    }
    None
}

fn extract_published(document: &Html) -> Option<String> {
    if let Some(date) = meta_content(
        document,
        &[
            "meta[property='article:published_time']",
            "meta[itemprop='datePublished']",
            "meta[name='date']",
            "meta[name='publish-date']",
        ],
    ) {
        return Some(date);
    }
    let selector = Selector::parse("time[datetime]").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_language(document: &Html) -> Option<String> {
    let selector = Selector::parse("html").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|lang| lang.split('-').next().unwrap_or(lang).to_lowercase())
        .filter(|lang| !lang.is_empty())
}

fn meta_content(document: &Html, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(content) = document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("content"))
            {
                let content = content.trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
    }
    None
}

fn extract_main_text(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(container) = document.select(&selector).next() {
                let text = collect_text(container);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }

    // No recognisable container: fall back to the whole body.
    if let Ok(selector) = Selector::parse("body") {
        if let Some(body) = document.select(&selector).next() {
            return collect_text(body);
        }
    }
    String::new()
}

fn collect_text(root: ElementRef) -> String {
    let mut out = String::new();
    walk(root, &mut out);
    normalize(&out)
}

fn walk(el: ElementRef, out: &mut String) {
    let tag = el.value().name();
    if SKIP_TAGS.contains(&tag) || has_skip_marker(&el) {
        return;
    }

    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let text = text.trim();
            if !text.is_empty() {
                if !out.is_empty() && !out.ends_with('\n') && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(text);
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            walk(child_el, out);
        }
    }

    if BLOCK_TAGS.contains(&tag) && !out.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
}

fn has_skip_marker(el: &ElementRef) -> bool {
    let value = el.value();
    let id = value.attr("id").unwrap_or("").to_ascii_lowercase();
    let class = value.attr("class").unwrap_or("").to_ascii_lowercase();
    SKIP_MARKERS
        .iter()
        .any(|marker| id.contains(marker) || class.contains(marker))
}

fn normalize(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}
