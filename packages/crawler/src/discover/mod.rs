//! Candidate-URL discovery for a configured site.
//!
//! Strategies are tried in order and the first one to yield candidates
//! wins; each strategy may fail independently without aborting the
//! cascade. Every candidate then passes the same relevance filter:
//! same host, no negative pattern, positive score at or above the
//! threshold.

pub mod category;
pub mod feeds;
pub mod score;
pub mod sitemap;
pub mod spider;

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use registry::{Domain, SiteConfig};

use crate::error::{CrawlError, CrawlResult};
use crate::hash;

/// A candidate article URL with its discovery provenance.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: Url,
    /// Page the URL was found on; None for seed-level candidates.
    pub parent: Option<Url>,
    /// 0 = seed page.
    pub depth: i32,
}

impl Candidate {
    pub fn new(url: Url, parent: Option<Url>, depth: i32) -> Self {
        Self { url, parent, depth }
    }
}

/// One way of producing candidate URLs for a site.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn discover(&self, site: &SiteConfig, domain: &Domain) -> CrawlResult<Vec<Candidate>>;
}

/// Seam for the orchestrator: anything that can discover a site's
/// candidates.
#[async_trait]
pub trait SiteDiscoverer: Send + Sync {
    async fn discover_site(
        &self,
        site: &SiteConfig,
        domain: &Domain,
    ) -> CrawlResult<Vec<Candidate>>;
}

/// The strategy cascade with the shared relevance filter.
pub struct LinkDiscoverer {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl LinkDiscoverer {
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }
}

#[async_trait]
impl SiteDiscoverer for LinkDiscoverer {
    async fn discover_site(
        &self,
        site: &SiteConfig,
        domain: &Domain,
    ) -> CrawlResult<Vec<Candidate>> {
        let base = Url::parse(&site.base_url).map_err(|_| CrawlError::InvalidUrl {
            url: site.base_url.clone(),
        })?;
        let site_host = base
            .host_str()
            .ok_or_else(|| CrawlError::InvalidUrl {
                url: site.base_url.clone(),
            })?
            .to_string();
        let keywords_lower = domain.keywords_lower();

        for strategy in &self.strategies {
            let raw = match strategy.discover(site, domain).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(
                        site = %site.id,
                        strategy = strategy.name(),
                        error = %err,
                        "Discovery strategy failed, trying next"
                    );
                    continue;
                }
            };

            let mut seen: HashSet<String> = HashSet::new();
            let candidates: Vec<Candidate> = raw
                .into_iter()
                .filter(|c| score::is_article_candidate(&c.url, &site_host, &keywords_lower))
                .filter(|c| seen.insert(hash::canonicalize(&c.url)))
                .collect();

            if !candidates.is_empty() {
                tracing::info!(
                    site = %site.id,
                    strategy = strategy.name(),
                    candidates = candidates.len(),
                    "Discovery produced candidates"
                );
                return Ok(candidates);
            }
            tracing::debug!(
                site = %site.id,
                strategy = strategy.name(),
                "Discovery strategy yielded nothing"
            );
        }

        // Zero candidates is a warning, not an error.
        tracing::warn!(site = %site.id, "No discovery strategy produced candidates");
        Ok(Vec::new())
    }
}

/// Resolve every anchor on a page against its base URL, keeping only
/// well-formed http(s) targets.
pub(crate) fn extract_anchor_urls(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    struct FixedStrategy {
        name: &'static str,
        result: CrawlResult<Vec<Candidate>>,
    }

    #[async_trait]
    impl DiscoveryStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn discover(&self, _: &SiteConfig, _: &Domain) -> CrawlResult<Vec<Candidate>> {
            match &self.result {
                Ok(candidates) => Ok(candidates.clone()),
                Err(_) => Err(CrawlError::Timeout {
                    url: "https://site.test".to_string(),
                }),
            }
        }
    }

    fn site() -> SiteConfig {
        SiteConfig {
            id: "gazzetta".to_string(),
            name: "Gazzetta".to_string(),
            base_url: "https://gazzetta.test".to_string(),
            domain: "football".to_string(),
            active: true,
            discovery_pages: IndexMap::new(),
            feeds: Vec::new(),
            priority: 5,
            language: Some("it".to_string()),
        }
    }

    fn domain() -> Domain {
        Domain {
            id: "football".to_string(),
            name: "Football".to_string(),
            description: String::new(),
            active: true,
            keywords: vec!["Inter".to_string()],
            max_results: Default::default(),
            vector_collection_prefix: "news".to_string(),
        }
    }

    fn candidate(url: &str) -> Candidate {
        Candidate::new(Url::parse(url).unwrap(), None, 1)
    }

    #[tokio::test]
    async fn first_non_empty_strategy_wins() {
        let discoverer = LinkDiscoverer::new(vec![
            Box::new(FixedStrategy {
                name: "empty",
                result: Ok(vec![]),
            }),
            Box::new(FixedStrategy {
                name: "second",
                result: Ok(vec![candidate("https://gazzetta.test/news/derby-123")]),
            }),
        ]);

        let found = discoverer.discover_site(&site(), &domain()).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn a_failing_strategy_degrades_to_the_next() {
        let discoverer = LinkDiscoverer::new(vec![
            Box::new(FixedStrategy {
                name: "broken",
                result: Err(CrawlError::Cancelled),
            }),
            Box::new(FixedStrategy {
                name: "working",
                result: Ok(vec![candidate("https://gazzetta.test/news/derby-123")]),
            }),
        ]);

        let found = discoverer.discover_site(&site(), &domain()).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn filter_drops_off_host_negative_and_duplicate_urls() {
        let discoverer = LinkDiscoverer::new(vec![Box::new(FixedStrategy {
            name: "mixed",
            result: Ok(vec![
                candidate("https://gazzetta.test/news/derby-123"),
                candidate("https://gazzetta.test/news/derby-123#comments"),
                candidate("https://other.test/news/derby-123"),
                candidate("https://gazzetta.test/tag/inter"),
                candidate("https://gazzetta.test/about"),
            ]),
        })]);

        let found = discoverer.discover_site(&site(), &domain()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url.path(), "/news/derby-123");
    }

    #[tokio::test]
    async fn zero_candidates_is_not_an_error() {
        let discoverer = LinkDiscoverer::new(vec![Box::new(FixedStrategy {
            name: "empty",
            result: Ok(vec![]),
        })]);

        let found = discoverer.discover_site(&site(), &domain()).await.unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn anchors_resolve_relative_hrefs() {
        let base = Url::parse("https://gazzetta.test/serie-a").unwrap();
        let html = r#"<html><body>
            <a href="/news/derby-123">Derby</a>
            <a href="transfer-456">Transfer</a>
            <a href="https://gazzetta.test/news/coppa-789#live">Coppa</a>
            <a href="mailto:tips@gazzetta.test">Tips</a>
            <a href="javascript:void(0)">Menu</a>
        </body></html>"#;

        let urls = extract_anchor_urls(html, &base);
        let paths: Vec<&str> = urls.iter().map(|u| u.path()).collect();
        assert_eq!(paths, vec!["/news/derby-123", "/transfer-456", "/news/coppa-789"]);
        assert!(urls.iter().all(|u| u.fragment().is_none()));
    }
}
