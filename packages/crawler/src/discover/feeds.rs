//! Feed-based discovery: RSS/Atom feeds are the cheapest source of
//! fresh article URLs when a site publishes one.
//!
//! The parser is intentionally shallow: it only needs `<link>` targets
//! (plus Atom's `href` form), not the full feed model.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use registry::{Domain, SiteConfig};

use crate::discover::{Candidate, DiscoveryStrategy};
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::HttpFetcher;
use crate::pacer::{FetchOutcome, HostPacer};

/// Probed when the site config declares no feeds.
const WELL_KNOWN: &[&str] = &["/feed", "/rss", "/rss.xml", "/feed.xml", "/atom.xml"];

/// Entries taken per site per pass.
const MAX_FEED_ENTRIES: usize = 200;

/// Extract entry links from an RSS or Atom document.
///
/// RSS: `<item>…<link>URL</link>…</item>`. Atom: `<entry>…<link
/// href="URL"/>…</entry>`. The channel/feed's own self link is excluded
/// by only looking inside item/entry blocks.
pub(crate) fn feed_links(body: &str) -> Vec<Url> {
    // Item/entry blocks first, then links within each block.
    let block_re =
        Regex::new(r"(?s)<(item|entry)[\s>].*?</(item|entry)>").expect("static regex");
    let rss_link_re = Regex::new(r"<link>\s*([^<\s]+)\s*</link>").expect("static regex");
    let atom_link_re =
        Regex::new(r#"<link[^>]*href\s*=\s*["']([^"']+)["']"#).expect("static regex");

    let mut links = Vec::new();
    for block in block_re.find_iter(body) {
        let block = block.as_str();
        let raw = rss_link_re
            .captures(block)
            .or_else(|| atom_link_re.captures(block))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim());
        if let Some(raw) = raw {
            if let Ok(url) = Url::parse(raw) {
                links.push(url);
            }
        }
    }
    links
}

pub struct FeedStrategy {
    fetcher: HttpFetcher,
    pacer: Arc<HostPacer>,
}

impl FeedStrategy {
    pub fn new(fetcher: HttpFetcher, pacer: Arc<HostPacer>) -> Self {
        Self { fetcher, pacer }
    }

    async fn fetch_feed(&self, url: &Url) -> Option<String> {
        let permit = match self.pacer.acquire(url).await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "Feed fetch denied");
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
                tracing::debug!(url = %url, error = %err, "Feed fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for FeedStrategy {
    fn name(&self) -> &'static str {
        "feeds"
    }

    async fn discover(&self, site: &SiteConfig, _domain: &Domain) -> CrawlResult<Vec<Candidate>> {
        let base = Url::parse(&site.base_url).map_err(|_| CrawlError::InvalidUrl {
            url: site.base_url.clone(),
        })?;

        let feed_urls: Vec<Url> = if site.feeds.is_empty() {
            WELL_KNOWN
                .iter()
                .filter_map(|path| base.join(path).ok())
                .collect()
        } else {
            site.feeds
                .iter()
                .filter_map(|raw| Url::parse(raw).ok())
                .collect()
        };

        let mut candidates = Vec::new();
        for feed_url in feed_urls {
            if candidates.len() >= MAX_FEED_ENTRIES {
                break;
            }
            let Some(body) = self.fetch_feed(&feed_url).await else {
                continue;
            };
            let links = feed_links(&body);
            if links.is_empty() {
                continue;
            }
            tracing::debug!(site = %site.id, feed = %feed_url, entries = links.len(), "Feed parsed");
            for link in links {
                if candidates.len() >= MAX_FEED_ENTRIES {
                    break;
                }
                candidates.push(Candidate::new(link, Some(feed_url.clone()), 0));
            }
            // Declared feeds are all read; well-known probing stops at
            // the first feed that works.
            if site.feeds.is_empty() {
                break;
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Gazzetta</title>
  <link>https://gazzetta.test/</link>
  <item>
    <title>Derby report</title>
    <link>https://gazzetta.test/news/derby-123</link>
  </item>
  <item>
    <title>Transfer news</title>
    <link> https://gazzetta.test/news/transfer-456 </link>
  </item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Gazzetta</title>
  <link href="https://gazzetta.test/atom.xml" rel="self"/>
  <entry>
    <title>Derby report</title>
    <link href="https://gazzetta.test/news/derby-123"/>
  </entry>
</feed>"#;

    #[test]
    fn rss_item_links_are_extracted() {
        let links = feed_links(RSS);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].path(), "/news/derby-123");
        assert_eq!(links[1].path(), "/news/transfer-456");
    }

    #[test]
    fn channel_level_link_is_not_an_entry() {
        let links = feed_links(RSS);
        assert!(links.iter().all(|u| u.path() != "/"));
    }

    #[test]
    fn atom_entry_hrefs_are_extracted() {
        let links = feed_links(ATOM);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].path(), "/news/derby-123");
    }

    #[test]
    fn non_feed_content_yields_nothing() {
        assert!(feed_links("<html><body>not a feed</body></html>").is_empty());
    }
}
