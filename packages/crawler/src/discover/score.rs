//! Article-URL heuristics: negative patterns that disqualify a
//! candidate outright, and a positive score that must reach the keep
//! threshold.

use url::Url;

/// Candidates scoring below this are dropped.
pub const KEEP_THRESHOLD: i32 = 2;

/// Path fragments that mark index/utility pages, not articles.
const NEGATIVE_PATTERNS: &[&str] = &[
    "/tag/",
    "/tags/",
    "/category/",
    "/categorie/",
    "/author/",
    "/autore/",
    "/page/",
    "?page=",
    "/archive",
    "/archivio",
    "/search",
    "/login",
    "/signin",
    "/subscribe",
    "/abbonati",
    "/newsletter",
    "/feed",
    "/rss",
    "/sitemap",
    "/wp-admin",
    "/privacy",
    "/cookie",
];

/// Media and asset extensions that are never article pages.
const MEDIA_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".pdf", ".mp3", ".mp4", ".avi",
    ".css", ".js", ".json", ".xml", ".zip", ".gz",
];

/// Hosts that are link targets on every page but never articles of the
/// site itself.
const SOCIAL_HOSTS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "youtube.com",
    "linkedin.com",
    "tiktok.com",
    "whatsapp.com",
    "t.me",
    "pinterest.com",
];

/// Path segments that strongly suggest an article page.
const ARTICLE_SEGMENTS: &[&str] = &[
    "news", "article", "articles", "articolo", "story", "stories", "post", "notizie", "notizia",
    "cronaca", "sport",
];

/// Hard disqualification: social hosts, asset files, index/utility
/// paths.
pub fn is_negative(url: &Url) -> bool {
    if let Some(host) = url.host_str() {
        let host = host.to_ascii_lowercase();
        if SOCIAL_HOSTS
            .iter()
            .any(|social| host == *social || host.ends_with(&format!(".{social}")))
        {
            return true;
        }
    }

    let path = url.path().to_ascii_lowercase();
    if MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }

    let path_and_query = match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    NEGATIVE_PATTERNS
        .iter()
        .any(|pattern| path_and_query.contains(pattern))
}

/// Positive evidence that a path is an article: article-like segment,
/// domain keywords in the path, depth, digits (ids and dates).
pub fn relevance_score(url: &Url, keywords_lower: &[String]) -> i32 {
    let path = url.path().to_ascii_lowercase();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut score = 0;

    if segments
        .iter()
        .any(|segment| ARTICLE_SEGMENTS.contains(segment))
    {
        score += 3;
    }

    for keyword in keywords_lower {
        if path.contains(keyword.as_str()) {
            score += 2;
        }
    }

    if segments.len() >= 5 {
        score += 1;
    }

    if path.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }

    score
}

/// Full candidate filter: same host as the site, not disqualified, and
/// scoring at or above the threshold.
pub fn is_article_candidate(url: &Url, site_host: &str, keywords_lower: &[String]) -> bool {
    if url.host_str() != Some(site_host) {
        return false;
    }
    if is_negative(url) {
        return false;
    }
    relevance_score(url, keywords_lower) >= KEEP_THRESHOLD
}
