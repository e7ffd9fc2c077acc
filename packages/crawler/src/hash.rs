//! URL canonicalisation and the two content-addressing hashes.
//!
//! `url_hash` enforces at-most-one link per canonical URL; the query
//! string is kept because query variants that render identical bodies
//! are collapsed later by `content_hash`.

use sha2::{Digest, Sha256};
use url::Url;

/// Canonical form of a URL for dedup purposes: parsed (which lowercases
/// scheme and host), fragment stripped, trailing slash trimmed from
/// non-root paths.
pub fn canonicalize(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    let path = canonical.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        canonical.set_path(&trimmed);
    }

    canonical.to_string()
}

/// SHA-256 over the canonicalised URL, hex encoded.
pub fn url_hash(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(url).as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 over the normalised body, hex encoded. Normalisation trims
/// each line and drops empty ones so whitespace-only rendering
/// differences do not defeat duplicate detection.
pub fn content_hash(text: &str) -> String {
    let normalized = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
