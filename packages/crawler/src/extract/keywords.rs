//! Domain-keyword relevance matching.

/// Keywords actually present in the content, case-insensitive,
/// preserving the domain's declaration order, capped at ten.
pub fn matched_keywords(domain_keywords: &[String], title: &str, body: &str) -> Vec<String> {
    let haystack = format!("{} {}", title, body).to_lowercase();

    domain_keywords
        .iter()
        .filter(|keyword| haystack.contains(&keyword.to_lowercase()))
        .take(10)
        .cloned()
        .collect()
}
