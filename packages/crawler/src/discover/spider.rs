//! Focused spider: bounded breadth-first crawl of a site's own pages.
//!
//! Only same-host URLs are followed. The walk is bounded three ways
//! (depth, pages visited, URLs known) and paced twice: per host through
//! the shared pacer, and globally through a fixed request-rate floor so
//! one site with many index pages cannot monopolise the crawler.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use url::Url;

use registry::{Domain, SiteConfig};

use crate::config::SpiderConfig;
use crate::discover::{extract_anchor_urls, Candidate, DiscoveryStrategy};
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::HttpFetcher;
use crate::hash;
use crate::pacer::{FetchOutcome, HostPacer};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct FocusedSpider {
    fetcher: HttpFetcher,
    pacer: Arc<HostPacer>,
    config: SpiderConfig,
    limiter: DirectRateLimiter,
}

impl FocusedSpider {
    pub fn new(fetcher: HttpFetcher, pacer: Arc<HostPacer>, config: SpiderConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second.max(1)).expect("non-zero rate");
        Self {
            fetcher,
            pacer,
            config,
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        }
    }

    /// Fetch one page through both pacing layers. `None` means the page
    /// was denied or unusable; the spider simply moves on.
    async fn fetch_page(&self, url: &Url, language: Option<&str>) -> Option<String> {
        self.limiter.until_ready().await;

        let permit = match self.pacer.acquire(url).await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "Spider skipping page");
                return None;
            }
        };

        match self.fetcher.fetch(url, language).await {
            Ok(page) => {
                permit.release(FetchOutcome::from_status(page.status, page.retry_after));
                if page.is_success() {
                    Some(page.body)
                } else {
                    None
                }
            }
            Err(err) => {
                permit.release(FetchOutcome::Failure);
                tracing::debug!(url = %url, error = %err, "Spider fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for FocusedSpider {
    fn name(&self) -> &'static str {
        "spider"
    }

    async fn discover(&self, site: &SiteConfig, _domain: &Domain) -> CrawlResult<Vec<Candidate>> {
        let base = Url::parse(&site.base_url).map_err(|_| CrawlError::InvalidUrl {
            url: site.base_url.clone(),
        })?;
        let host = base
            .host_str()
            .ok_or_else(|| CrawlError::InvalidUrl {
                url: site.base_url.clone(),
            })?
            .to_string();
        let language = site.language.as_deref();

        let mut known: HashSet<String> = HashSet::new();
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut visited = 0usize;

        known.insert(hash::canonicalize(&base));
        let mut level: Vec<Url> = vec![base];

        for depth in 0..=self.config.max_depth {
            if level.is_empty() {
                break;
            }
            let mut next_level: Vec<Url> = Vec::new();

            for page_url in level {
                if visited >= self.config.max_pages_visited
                    || known.len() >= self.config.max_pages_known
                {
                    break;
                }

                let Some(body) = self.fetch_page(&page_url, language).await else {
                    continue;
                };
                visited += 1;

                for link in extract_anchor_urls(&body, &page_url) {
                    if link.host_str() != Some(host.as_str()) {
                        continue;
                    }
                    if !known.insert(hash::canonicalize(&link)) {
                        continue;
                    }
                    if known.len() >= self.config.max_pages_known {
                        break;
                    }

                    candidates.push(Candidate::new(
                        link.clone(),
                        Some(page_url.clone()),
                        depth as i32 + 1,
                    ));
                    if depth < self.config.max_depth {
                        next_level.push(link);
                    }
                }
            }

            level = next_level;
        }

        tracing::debug!(
            site = %site.id,
            visited = visited,
            known = known.len(),
            candidates = candidates.len(),
            "Spider walk finished"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;

    #[test]
    fn spider_builds_with_default_caps() {
        let config = Arc::new(CrawlerConfig::default());
        let fetcher = HttpFetcher::new(&config).unwrap();
        let pacer = Arc::new(HostPacer::new(Arc::clone(&config), fetcher.clone()));
        let spider = FocusedSpider::new(fetcher, pacer, config.spider.clone());
        assert_eq!(spider.config.max_depth, 2);
    }
}
