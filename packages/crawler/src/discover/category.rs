//! Anchor extraction from configured category pages, with the homepage
//! as the last-resort strategy.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use registry::{Domain, SiteConfig};

use crate::discover::{extract_anchor_urls, score, Candidate, DiscoveryStrategy};
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::HttpFetcher;
use crate::pacer::{FetchOutcome, HostPacer};

/// Anchor cap for the homepage fallback, which has no per-page config.
const HOMEPAGE_MAX_LINKS: usize = 50;

async fn fetch_body(
    fetcher: &HttpFetcher,
    pacer: &HostPacer,
    url: &Url,
    language: Option<&str>,
) -> Option<String> {
    let permit = match pacer.acquire(url).await {
        Ok(permit) => permit,
        Err(err) => {
            tracing::debug!(url = %url, error = %err, "Category fetch denied");
            return None;
        }
    };
    match fetcher.fetch(url, language).await {
        Ok(page) => {
            permit.release(FetchOutcome::from_status(page.status, page.retry_after));
            page.is_success().then_some(page.body)
        }
        Err(err) => {
            permit.release(FetchOutcome::Failure);
            tracing::debug!(url = %url, error = %err, "Category fetch failed");
            None
        }
    }
}

/// Collect article-looking anchors from one index page, bounded by
/// `max_links`.
fn article_anchors(
    html: &str,
    page_url: &Url,
    keywords_lower: &[String],
    max_links: usize,
) -> Vec<Candidate> {
    let host = page_url.host_str().unwrap_or_default().to_string();
    extract_anchor_urls(html, page_url)
        .into_iter()
        .filter(|url| score::is_article_candidate(url, &host, keywords_lower))
        .take(max_links)
        .map(|url| Candidate::new(url, Some(page_url.clone()), 1))
        .collect()
}

/// Extracts candidates from the site's configured discovery pages.
pub struct CategoryStrategy {
    fetcher: HttpFetcher,
    pacer: Arc<HostPacer>,
}

impl CategoryStrategy {
    pub fn new(fetcher: HttpFetcher, pacer: Arc<HostPacer>) -> Self {
        Self { fetcher, pacer }
    }
}

#[async_trait]
impl DiscoveryStrategy for CategoryStrategy {
    fn name(&self) -> &'static str {
        "category-pages"
    }

    async fn discover(&self, site: &SiteConfig, domain: &Domain) -> CrawlResult<Vec<Candidate>> {
        let keywords_lower = domain.keywords_lower();
        let mut candidates = Vec::new();

        for page in site.active_discovery_pages() {
            let Ok(page_url) = Url::parse(&page.url) else {
                tracing::warn!(site = %site.id, url = %page.url, "Skipping unparsable discovery page");
                continue;
            };
            let Some(body) =
                fetch_body(&self.fetcher, &self.pacer, &page_url, site.language.as_deref()).await
            else {
                continue;
            };
            candidates.extend(article_anchors(
                &body,
                &page_url,
                &keywords_lower,
                page.max_links,
            ));
        }

        Ok(candidates)
    }
}

/// Last resort: the base URL's own anchors.
pub struct HomepageStrategy {
    fetcher: HttpFetcher,
    pacer: Arc<HostPacer>,
}

impl HomepageStrategy {
    pub fn new(fetcher: HttpFetcher, pacer: Arc<HostPacer>) -> Self {
        Self { fetcher, pacer }
    }
}

#[async_trait]
impl DiscoveryStrategy for HomepageStrategy {
    fn name(&self) -> &'static str {
        "homepage"
    }

    async fn discover(&self, site: &SiteConfig, domain: &Domain) -> CrawlResult<Vec<Candidate>> {
        let base = Url::parse(&site.base_url).map_err(|_| CrawlError::InvalidUrl {
            url: site.base_url.clone(),
        })?;
        let Some(body) =
            fetch_body(&self.fetcher, &self.pacer, &base, site.language.as_deref()).await
        else {
            return Ok(Vec::new());
        };
        Ok(article_anchors(
            &body,
            &base,
            &domain.keywords_lower(),
            HOMEPAGE_MAX_LINKS,
        ))
    }
}
