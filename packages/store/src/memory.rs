//! In-memory link store for tests and development. Not suitable for
//! production: data dies with the process and the state transitions,
//! while correct, are not crash-safe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::link_store::{LinkStore, NewArticle, NewAttempt, NewLink, StatsDelta};
use crate::models::article::ExtractedArticle;
use crate::models::attempt::CrawlAttempt;
use crate::models::link::{DiscoveredLink, LinkState};
use crate::models::site::SiteRow;

#[derive(Default)]
struct Inner {
    sites: HashMap<Uuid, SiteRow>,
    links: HashMap<Uuid, DiscoveredLink>,
    attempts: Vec<CrawlAttempt>,
    articles: HashMap<Uuid, ExtractedArticle>,
    stats: HashMap<(Uuid, NaiveDate), StatsDelta>,
}

#[derive(Default)]
pub struct MemoryLinkStore {
    inner: RwLock<Inner>,
    fail_article_inserts: AtomicBool,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_count(&self) -> usize {
        self.inner.read().unwrap().links.len()
    }

    pub fn article_count(&self) -> usize {
        self.inner.read().unwrap().articles.len()
    }

    pub fn attempt_count(&self) -> usize {
        self.inner.read().unwrap().attempts.len()
    }

    /// All links in a given state, for test assertions.
    pub fn links_in_state(&self, state: LinkState) -> Vec<DiscoveredLink> {
        self.inner
            .read()
            .unwrap()
            .links
            .values()
            .filter(|l| l.state == state)
            .cloned()
            .collect()
    }

    /// Make every subsequent `insert_article` fail, to exercise the
    /// coordinator's compensation paths.
    pub fn fail_article_inserts(&self, fail: bool) {
        self.fail_article_inserts.store(fail, Ordering::SeqCst);
    }

    /// Backdate a link's `last_crawled_at`, so tests can age links
    /// into the refresh window without sleeping.
    pub fn force_last_crawled(&self, id: Uuid, when: DateTime<Utc>) {
        if let Some(link) = self.inner.write().unwrap().links.get_mut(&id) {
            link.last_crawled_at = Some(when);
        }
    }

    /// Accumulated stats for a site across all days.
    pub fn stats_totals(&self, site_id: Uuid) -> StatsDelta {
        let inner = self.inner.read().unwrap();
        let mut total = StatsDelta::default();
        for ((sid, _), delta) in inner.stats.iter() {
            if *sid == site_id {
                total.links_discovered += delta.links_discovered;
                total.links_crawled += delta.links_crawled;
                total.links_failed += delta.links_failed;
                total.articles_extracted += delta.articles_extracted;
                total.quality_sum += delta.quality_sum;
            }
        }
        total
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn upsert_site(
        &self,
        site_key: &str,
        name: &str,
        base_url: &str,
        domain: &str,
        active: bool,
        config: serde_json::Value,
    ) -> Result<SiteRow> {
        let mut inner = self.inner.write().unwrap();
        if let Some(existing) = inner.sites.values_mut().find(|s| s.site_key == site_key) {
            existing.name = name.to_string();
            existing.base_url = base_url.to_string();
            existing.domain = domain.to_string();
            existing.active = active;
            existing.config = config;
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let row = SiteRow {
            id: Uuid::now_v7(),
            site_key: site_key.to_string(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            domain: domain.to_string(),
            active,
            config,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        inner.sites.insert(row.id, row.clone());
        Ok(row)
    }

    async fn site_by_id(&self, id: Uuid) -> Result<Option<SiteRow>> {
        Ok(self.inner.read().unwrap().sites.get(&id).cloned())
    }

    async fn site_by_key(&self, site_key: &str) -> Result<Option<SiteRow>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .sites
            .values()
            .find(|s| s.site_key == site_key)
            .cloned())
    }

    async fn insert_links(&self, site_id: Uuid, links: &[NewLink]) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let mut inserted = 0u64;
        for link in links {
            if inner.links.values().any(|l| l.url_hash == link.url_hash) {
                continue;
            }
            let row = DiscoveredLink {
                id: Uuid::now_v7(),
                site_id,
                url: link.url.clone(),
                url_hash: link.url_hash.clone(),
                parent_url: link.parent_url.clone(),
                depth: link.depth,
                content_hash: None,
                state: LinkState::New,
                discovered_at: Utc::now(),
                last_crawled_at: None,
                crawl_count: 0,
                error_count: 0,
            };
            inner.links.insert(row.id, row);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn link_by_id(&self, id: Uuid) -> Result<Option<DiscoveredLink>> {
        Ok(self.inner.read().unwrap().links.get(&id).cloned())
    }

    async fn select_crawlable(
        &self,
        site_id: Uuid,
        limit: i64,
        refresh_older_than: Option<DateTime<Utc>>,
        max_failures: i32,
    ) -> Result<Vec<DiscoveredLink>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<DiscoveredLink> = inner
            .links
            .values()
            .filter(|l| l.site_id == site_id && l.error_count < max_failures)
            .filter(|l| match l.state {
                LinkState::New => true,
                LinkState::Crawled | LinkState::Failed => match refresh_older_than {
                    Some(horizon) => l.last_crawled_at.is_some_and(|t| t < horizon),
                    None => false,
                },
                _ => false,
            })
            .cloned()
            .collect();
        rows.sort_by_key(|l| (l.state != LinkState::New, l.discovered_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        match inner.links.get_mut(&id) {
            Some(link)
                if matches!(
                    link.state,
                    LinkState::New | LinkState::Crawled | LinkState::Failed
                ) =>
            {
                link.state = LinkState::Crawling;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_crawled(&self, id: Uuid, content_hash: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(link) = inner.links.get_mut(&id) {
            if link.state == LinkState::Crawling {
                link.state = LinkState::Crawled;
                link.content_hash = Some(content_hash.to_string());
                link.last_crawled_at = Some(Utc::now());
                link.crawl_count += 1;
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, counts_error: bool, max_failures: i32) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(link) = inner.links.get_mut(&id) {
            if link.state == LinkState::Crawling {
                if counts_error {
                    link.error_count += 1;
                }
                link.state = if link.error_count >= max_failures {
                    LinkState::Blocked
                } else {
                    LinkState::Failed
                };
                link.last_crawled_at = Some(Utc::now());
                link.crawl_count += 1;
            }
        }
        Ok(())
    }

    async fn find_live_by_content_hash(
        &self,
        content_hash: &str,
        exclude: Uuid,
    ) -> Result<Option<DiscoveredLink>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .links
            .values()
            .filter(|l| {
                l.id != exclude
                    && l.state != LinkState::Obsolete
                    && l.content_hash.as_deref() == Some(content_hash)
            })
            .min_by_key(|l| l.discovered_at)
            .cloned())
    }

    async fn recover_stale(&self) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let mut recovered = 0u64;
        for link in inner.links.values_mut() {
            if link.state == LinkState::Crawling {
                link.state = LinkState::New;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn sweep_obsolete(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let mut swept = 0u64;
        for link in inner.links.values_mut() {
            let stale_crawl = link.last_crawled_at.map_or(true, |t| t < older_than);
            if matches!(link.state, LinkState::New | LinkState::Failed)
                && link.discovered_at < older_than
                && stale_crawl
            {
                link.state = LinkState::Obsolete;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn promote_blocked(&self, max_failures: i32) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let mut promoted = 0u64;
        for link in inner.links.values_mut() {
            if link.state == LinkState::Failed && link.error_count >= max_failures {
                link.state = LinkState::Blocked;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    async fn purge_obsolete(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let doomed: Vec<Uuid> = inner
            .links
            .values()
            .filter(|l| l.state == LinkState::Obsolete && l.discovered_at < older_than)
            .map(|l| l.id)
            .collect();
        for id in &doomed {
            inner.links.remove(id);
            inner.attempts.retain(|a| a.link_id != *id);
            inner.articles.retain(|_, a| a.link_id != *id);
        }
        Ok(doomed.len() as u64)
    }

    async fn crawled_missing_article(&self, limit: i64) -> Result<Vec<Uuid>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .links
            .values()
            .filter(|l| l.state == LinkState::Crawled)
            .filter(|l| !inner.articles.values().any(|a| a.link_id == l.id))
            .take(limit as usize)
            .map(|l| l.id)
            .collect())
    }

    async fn demote_to_failed(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(link) = inner.links.get_mut(&id) {
            if link.state == LinkState::Crawled {
                link.state = LinkState::Failed;
            }
        }
        Ok(())
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.inner.write().unwrap().attempts.push(CrawlAttempt {
            id,
            link_id: attempt.link_id,
            attempted_at: Utc::now(),
            success: attempt.success,
            response_time_ms: attempt.response_time_ms,
            content_length: attempt.content_length,
            error_message: attempt.error_message,
        });
        Ok(id)
    }

    async fn attempts_for_link(&self, link_id: Uuid) -> Result<Vec<CrawlAttempt>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .attempts
            .iter()
            .filter(|a| a.link_id == link_id)
            .cloned()
            .collect())
    }

    async fn prune_attempts(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.attempts.len();
        inner.attempts.retain(|a| a.attempted_at >= older_than);
        Ok((before - inner.attempts.len()) as u64)
    }

    async fn insert_article(&self, article: NewArticle) -> Result<ExtractedArticle> {
        if self.fail_article_inserts.load(Ordering::SeqCst) {
            bail!("article insert failed (injected)");
        }
        let mut inner = self.inner.write().unwrap();
        // 1:1 with the link: a re-crawl refreshes the existing row.
        let id = inner
            .articles
            .values()
            .find(|a| a.link_id == article.link_id)
            .map(|a| a.id)
            .unwrap_or_else(Uuid::now_v7);
        let row = ExtractedArticle {
            id,
            link_id: article.link_id,
            vector_id: article.vector_id,
            title: article.title,
            author: article.author,
            published_date: article.published_date,
            content_length: article.content_length,
            quality_score: article.quality_score,
            domain: article.domain,
            keywords: article.keywords,
            metadata: article.metadata,
            extracted_at: Utc::now(),
        };
        inner.articles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn article_by_link(&self, link_id: Uuid) -> Result<Option<ExtractedArticle>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .articles
            .values()
            .find(|a| a.link_id == link_id)
            .cloned())
    }

    async fn set_article_vector(&self, article_id: Uuid, vector_id: Option<Uuid>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(article) = inner.articles.get_mut(&article_id) {
            article.vector_id = vector_id;
        }
        Ok(())
    }

    async fn articles_by_domain(&self, domain: &str, limit: i64) -> Result<Vec<ExtractedArticle>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<ExtractedArticle> = inner
            .articles
            .values()
            .filter(|a| a.domain == domain)
            .cloned()
            .collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.extracted_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn recent_articles(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ExtractedArticle>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<ExtractedArticle> = inner
            .articles
            .values()
            .filter(|a| a.extracted_at >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.extracted_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn add_stats(&self, site_id: Uuid, day: NaiveDate, delta: StatsDelta) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner.stats.entry((site_id, day)).or_default();
        entry.links_discovered += delta.links_discovered;
        entry.links_crawled += delta.links_crawled;
        entry.links_failed += delta.links_failed;
        entry.articles_extracted += delta.articles_extracted;
        entry.quality_sum += delta.quality_sum;
        Ok(())
    }

    async fn stats_since(&self, day: NaiveDate) -> Result<Vec<crate::models::stats::CrawlStats>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<crate::models::stats::CrawlStats> = inner
            .stats
            .iter()
            .filter(|((_, d), _)| *d >= day)
            .map(|((site_id, d), delta)| crate::models::stats::CrawlStats {
                id: Uuid::now_v7(),
                site_id: *site_id,
                day: *d,
                links_discovered: delta.links_discovered,
                links_crawled: delta.links_crawled,
                links_failed: delta.links_failed,
                articles_extracted: delta.articles_extracted,
                avg_quality: (delta.articles_extracted > 0)
                    .then(|| (delta.quality_sum / delta.articles_extracted as f64) as f32),
                updated_at: Utc::now(),
            })
            .collect();
        rows.sort_by_key(|r| (std::cmp::Reverse(r.day), r.site_id));
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_link(url: &str) -> NewLink {
        NewLink {
            url: url.to_string(),
            url_hash: crawler::hash::url_hash(&url::Url::parse(url).unwrap()),
            parent_url: None,
            depth: 0,
        }
    }

    #[tokio::test]
    async fn duplicate_url_hashes_are_skipped() {
        let store = MemoryLinkStore::new();
        let site = store
            .upsert_site("s", "S", "https://s.test", "football", true, serde_json::json!({}))
            .await
            .unwrap();

        let links = vec![
            new_link("https://s.test/news/a-1"),
            new_link("https://s.test/news/a-1"),
            new_link("https://s.test/news/b-2"),
        ];
        let inserted = store.insert_links(site.id, &links).await.unwrap();
        assert_eq!(inserted, 2);

        // Re-running the same batch adds zero rows.
        let inserted = store.insert_links(site.id, &links).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(store.link_count(), 2);
    }

    #[tokio::test]
    async fn claim_is_exclusive_and_state_guarded() {
        let store = MemoryLinkStore::new();
        let site = store
            .upsert_site("s", "S", "https://s.test", "football", true, serde_json::json!({}))
            .await
            .unwrap();
        store
            .insert_links(site.id, &[new_link("https://s.test/news/a-1")])
            .await
            .unwrap();
        let link = store.links_in_state(LinkState::New).pop().unwrap();

        assert!(store.claim(link.id).await.unwrap());
        // Already crawling: second claim loses.
        assert!(!store.claim(link.id).await.unwrap());
    }

    #[tokio::test]
    async fn failures_promote_to_blocked_at_the_limit() {
        let store = MemoryLinkStore::new();
        let site = store
            .upsert_site("s", "S", "https://s.test", "football", true, serde_json::json!({}))
            .await
            .unwrap();
        store
            .insert_links(site.id, &[new_link("https://s.test/news/a-1")])
            .await
            .unwrap();
        let link = store.links_in_state(LinkState::New).pop().unwrap();

        for _ in 0..2 {
            assert!(store.claim(link.id).await.unwrap());
            store.mark_failed(link.id, true, 3).await.unwrap();
        }
        assert_eq!(store.links_in_state(LinkState::Failed).len(), 1);

        assert!(store.claim(link.id).await.unwrap());
        store.mark_failed(link.id, true, 3).await.unwrap();
        let blocked = store.links_in_state(LinkState::Blocked);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].error_count, 3);

        // Blocked links are unclaimable and unselectable.
        assert!(!store.claim(link.id).await.unwrap());
        let selectable = store.select_crawlable(site.id, 10, None, 3).await.unwrap();
        assert!(selectable.is_empty());
    }

    #[tokio::test]
    async fn uncounted_failures_never_block() {
        let store = MemoryLinkStore::new();
        let site = store
            .upsert_site("s", "S", "https://s.test", "football", true, serde_json::json!({}))
            .await
            .unwrap();
        store
            .insert_links(site.id, &[new_link("https://s.test/news/a-1")])
            .await
            .unwrap();
        let link = store.links_in_state(LinkState::New).pop().unwrap();

        for _ in 0..5 {
            assert!(store.claim(link.id).await.unwrap());
            store.mark_failed(link.id, false, 3).await.unwrap();
        }
        let failed = store.links_in_state(LinkState::Failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_count, 0);
    }

    #[tokio::test]
    async fn recover_stale_returns_crawling_links_to_new() {
        let store = MemoryLinkStore::new();
        let site = store
            .upsert_site("s", "S", "https://s.test", "football", true, serde_json::json!({}))
            .await
            .unwrap();
        store
            .insert_links(site.id, &[new_link("https://s.test/news/a-1")])
            .await
            .unwrap();
        let link = store.links_in_state(LinkState::New).pop().unwrap();
        store.claim(link.id).await.unwrap();

        let recovered = store.recover_stale().await.unwrap();
        assert_eq!(recovered, 1);
        assert_eq!(store.links_in_state(LinkState::New).len(), 1);
    }

    #[tokio::test]
    async fn re_inserting_an_article_refreshes_the_single_row() {
        let store = MemoryLinkStore::new();
        let link_id = Uuid::now_v7();
        let article = NewArticle {
            link_id,
            vector_id: None,
            title: "Inter wins the derby".to_string(),
            author: None,
            published_date: None,
            content_length: 1200,
            quality_score: 0.8,
            domain: "football".to_string(),
            keywords: vec!["Inter".to_string()],
            metadata: serde_json::json!({}),
        };
        let first = store.insert_article(article.clone()).await.unwrap();

        let mut refreshed = article;
        refreshed.title = "Inter wins the derby again".to_string();
        let second = store.insert_article(refreshed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.article_count(), 1);
        assert_eq!(
            store.article_by_link(link_id).await.unwrap().unwrap().title,
            "Inter wins the derby again"
        );
    }
}
