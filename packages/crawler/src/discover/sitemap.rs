//! Sitemap enumeration: robots.txt-declared sitemaps plus the
//! well-known locations, with bounded recursion into sitemap indexes.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use url::Url;

use registry::{Domain, SiteConfig};

use crate::discover::{Candidate, DiscoveryStrategy};
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::HttpFetcher;
use crate::hash;
use crate::pacer::{FetchOutcome, HostPacer};

/// Sitemap files read per site per pass.
const MAX_SITEMAP_FETCHES: usize = 10;
/// URL entries taken per site per pass.
const MAX_URL_ENTRIES: usize = 500;

const WELL_KNOWN: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/news-sitemap.xml"];

pub struct SitemapStrategy {
    fetcher: HttpFetcher,
    pacer: Arc<HostPacer>,
}

impl SitemapStrategy {
    pub fn new(fetcher: HttpFetcher, pacer: Arc<HostPacer>) -> Self {
        Self { fetcher, pacer }
    }

    async fn fetch_sitemap(&self, url: &Url) -> Option<String> {
        let permit = match self.pacer.acquire(url).await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "Sitemap fetch denied");
                return None;
            }
        };
        match self.fetcher.fetch(url, None).await {
            Ok(page) => {
                permit.release(FetchOutcome::from_status(page.status, page.retry_after));
                page.is_success().then_some(page.body)
            }
            Err(err) => {
                permit.release(FetchOutcome::Failure);
                tracing::debug!(url = %url, error = %err, "Sitemap fetch failed");
                None
            }
        }
    }
}

/// Split one sitemap document into article URLs and nested sitemap
/// references.
fn parse_sitemap(body: &str) -> (Vec<Url>, Vec<Url>) {
    let mut urls = Vec::new();
    let mut nested = Vec::new();

    for entity in SiteMapReader::new(body.as_bytes()) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    urls.push(url);
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    nested.push(url);
                }
            }
            SiteMapEntity::Err(error) => {
                tracing::debug!(error = %error, "Skipping malformed sitemap entry");
            }
        }
    }

    (urls, nested)
}

#[async_trait]
impl DiscoveryStrategy for SitemapStrategy {
    fn name(&self) -> &'static str {
        "sitemap"
    }

    async fn discover(&self, site: &SiteConfig, _domain: &Domain) -> CrawlResult<Vec<Candidate>> {
        let base = Url::parse(&site.base_url).map_err(|_| CrawlError::InvalidUrl {
            url: site.base_url.clone(),
        })?;

        // robots.txt declarations first, well-known locations as backup.
        let mut queue: Vec<Url> = Vec::new();
        let mut queued: HashSet<String> = HashSet::new();
        for declared in self.pacer.sitemap_urls(&base).await {
            if let Ok(url) = Url::parse(&declared) {
                if queued.insert(hash::canonicalize(&url)) {
                    queue.push(url);
                }
            }
        }
        for path in WELL_KNOWN {
            if let Ok(url) = base.join(path) {
                if queued.insert(hash::canonicalize(&url)) {
                    queue.push(url);
                }
            }
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut fetched = 0usize;

        while let Some(sitemap_url) = queue.pop() {
            if fetched >= MAX_SITEMAP_FETCHES || candidates.len() >= MAX_URL_ENTRIES {
                break;
            }
            let Some(body) = self.fetch_sitemap(&sitemap_url).await else {
                continue;
            };
            fetched += 1;

            let (urls, nested) = parse_sitemap(&body);
            for url in urls {
                if candidates.len() >= MAX_URL_ENTRIES {
                    break;
                }
                candidates.push(Candidate::new(url, Some(sitemap_url.clone()), 0));
            }
            for nested_url in nested {
                if queued.insert(hash::canonicalize(&nested_url)) {
                    queue.push(nested_url);
                }
            }
        }

        tracing::debug!(
            site = %site.id,
            sitemaps_read = fetched,
            candidates = candidates.len(),
            "Sitemap enumeration finished"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_entries_are_parsed() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://gazzetta.test/news/derby-123</loc></url>
  <url><loc>https://gazzetta.test/news/transfer-456</loc></url>
</urlset>"#;

        let (urls, nested) = parse_sitemap(body);
        assert_eq!(urls.len(), 2);
        assert!(nested.is_empty());
        assert_eq!(urls[0].path(), "/news/derby-123");
    }

    #[test]
    fn sitemap_index_entries_are_separated() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://gazzetta.test/sitemap-news.xml</loc></sitemap>
</sitemapindex>"#;

        let (urls, nested) = parse_sitemap(body);
        assert!(urls.is_empty());
        assert_eq!(nested.len(), 1);
    }

    #[test]
    fn malformed_documents_yield_nothing() {
        let (urls, nested) = parse_sitemap("this is not xml at all");
        assert!(urls.is_empty());
        assert!(nested.is_empty());
    }
}
