//! The link-store seam: everything the orchestrator, coordinator,
//! retriever and reconciler need from the relational store, behind one
//! trait so they stay testable without Postgres.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::article::ExtractedArticle;
use crate::models::attempt::CrawlAttempt;
use crate::models::link::DiscoveredLink;
use crate::models::site::SiteRow;
pub use crate::models::stats::StatsDelta;
use crate::models::stats::CrawlStats;

/// A candidate ready for batch insertion.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub url: String,
    pub url_hash: String,
    pub parent_url: Option<String>,
    pub depth: i32,
}

/// One attempt record, success or failure.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub link_id: Uuid,
    pub success: bool,
    pub response_time_ms: Option<i64>,
    pub content_length: Option<i64>,
    pub error_message: Option<String>,
}

/// Article row payload produced by the coordinator.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub link_id: Uuid,
    pub vector_id: Option<Uuid>,
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub content_length: i64,
    pub quality_score: f32,
    pub domain: String,
    pub keywords: Vec<String>,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    // Sites
    async fn upsert_site(
        &self,
        site_key: &str,
        name: &str,
        base_url: &str,
        domain: &str,
        active: bool,
        config: serde_json::Value,
    ) -> Result<SiteRow>;
    async fn site_by_id(&self, id: Uuid) -> Result<Option<SiteRow>>;
    async fn site_by_key(&self, site_key: &str) -> Result<Option<SiteRow>>;

    // Links
    /// Batch insert; duplicates by `url_hash` are silently skipped.
    /// Returns the number of newly created rows.
    async fn insert_links(&self, site_id: Uuid, links: &[NewLink]) -> Result<u64>;
    async fn link_by_id(&self, id: Uuid) -> Result<Option<DiscoveredLink>>;
    async fn select_crawlable(
        &self,
        site_id: Uuid,
        limit: i64,
        refresh_older_than: Option<DateTime<Utc>>,
        max_failures: i32,
    ) -> Result<Vec<DiscoveredLink>>;
    async fn claim(&self, id: Uuid) -> Result<bool>;
    async fn mark_crawled(&self, id: Uuid, content_hash: &str) -> Result<()>;
    async fn mark_failed(&self, id: Uuid, counts_error: bool, max_failures: i32) -> Result<()>;
    async fn find_live_by_content_hash(
        &self,
        content_hash: &str,
        exclude: Uuid,
    ) -> Result<Option<DiscoveredLink>>;
    async fn recover_stale(&self) -> Result<u64>;
    async fn sweep_obsolete(&self, older_than: DateTime<Utc>) -> Result<u64>;
    async fn promote_blocked(&self, max_failures: i32) -> Result<u64>;
    async fn purge_obsolete(&self, older_than: DateTime<Utc>) -> Result<u64>;
    async fn crawled_missing_article(&self, limit: i64) -> Result<Vec<Uuid>>;
    async fn demote_to_failed(&self, id: Uuid) -> Result<()>;

    // Attempts
    async fn record_attempt(&self, attempt: NewAttempt) -> Result<Uuid>;
    async fn attempts_for_link(&self, link_id: Uuid) -> Result<Vec<CrawlAttempt>>;
    async fn prune_attempts(&self, older_than: DateTime<Utc>) -> Result<u64>;

    // Articles
    /// Insert, or refresh on re-crawl (1:1 with the link).
    async fn insert_article(&self, article: NewArticle) -> Result<ExtractedArticle>;
    async fn article_by_link(&self, link_id: Uuid) -> Result<Option<ExtractedArticle>>;
    async fn set_article_vector(&self, article_id: Uuid, vector_id: Option<Uuid>) -> Result<()>;
    async fn articles_by_domain(&self, domain: &str, limit: i64) -> Result<Vec<ExtractedArticle>>;
    async fn recent_articles(&self, since: DateTime<Utc>, limit: i64)
        -> Result<Vec<ExtractedArticle>>;

    // Stats
    async fn add_stats(&self, site_id: Uuid, day: NaiveDate, delta: StatsDelta) -> Result<()>;
    async fn stats_since(&self, day: NaiveDate) -> Result<Vec<CrawlStats>>;

    /// Liveness probe for the health surface.
    async fn ping(&self) -> Result<()>;
}

/// Postgres-backed link store; thin dispatch onto the model methods.
#[derive(Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn upsert_site(
        &self,
        site_key: &str,
        name: &str,
        base_url: &str,
        domain: &str,
        active: bool,
        config: serde_json::Value,
    ) -> Result<SiteRow> {
        SiteRow::upsert(site_key, name, base_url, domain, active, config, &self.pool).await
    }

    async fn site_by_id(&self, id: Uuid) -> Result<Option<SiteRow>> {
        SiteRow::find_by_id(id, &self.pool).await
    }

    async fn site_by_key(&self, site_key: &str) -> Result<Option<SiteRow>> {
        SiteRow::find_by_key(site_key, &self.pool).await
    }

    async fn insert_links(&self, site_id: Uuid, links: &[NewLink]) -> Result<u64> {
        let mut inserted = 0u64;
        for link in links {
            let rows = sqlx::query(
                r#"
                INSERT INTO discovered_links
                    (id, site_id, url, url_hash, parent_url, depth, state, discovered_at, crawl_count, error_count)
                VALUES ($1, $2, $3, $4, $5, $6, 'new', NOW(), 0, 0)
                ON CONFLICT (url_hash) DO NOTHING
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(site_id)
            .bind(&link.url)
            .bind(&link.url_hash)
            .bind(&link.parent_url)
            .bind(link.depth)
            .execute(&self.pool)
            .await?
            .rows_affected();
            inserted += rows;
        }
        Ok(inserted)
    }

    async fn link_by_id(&self, id: Uuid) -> Result<Option<DiscoveredLink>> {
        DiscoveredLink::find_by_id(id, &self.pool).await
    }

    async fn select_crawlable(
        &self,
        site_id: Uuid,
        limit: i64,
        refresh_older_than: Option<DateTime<Utc>>,
        max_failures: i32,
    ) -> Result<Vec<DiscoveredLink>> {
        DiscoveredLink::select_crawlable(site_id, limit, refresh_older_than, max_failures, &self.pool)
            .await
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        DiscoveredLink::claim(id, &self.pool).await
    }

    async fn mark_crawled(&self, id: Uuid, content_hash: &str) -> Result<()> {
        DiscoveredLink::mark_crawled(id, content_hash, &self.pool).await
    }

    async fn mark_failed(&self, id: Uuid, counts_error: bool, max_failures: i32) -> Result<()> {
        DiscoveredLink::mark_failed(id, counts_error, max_failures, &self.pool).await
    }

    async fn find_live_by_content_hash(
        &self,
        content_hash: &str,
        exclude: Uuid,
    ) -> Result<Option<DiscoveredLink>> {
        DiscoveredLink::find_live_by_content_hash(content_hash, exclude, &self.pool).await
    }

    async fn recover_stale(&self) -> Result<u64> {
        DiscoveredLink::recover_stale(&self.pool).await
    }

    async fn sweep_obsolete(&self, older_than: DateTime<Utc>) -> Result<u64> {
        DiscoveredLink::sweep_obsolete(older_than, &self.pool).await
    }

    async fn promote_blocked(&self, max_failures: i32) -> Result<u64> {
        DiscoveredLink::promote_blocked(max_failures, &self.pool).await
    }

    async fn purge_obsolete(&self, older_than: DateTime<Utc>) -> Result<u64> {
        DiscoveredLink::purge_obsolete(older_than, &self.pool).await
    }

    async fn crawled_missing_article(&self, limit: i64) -> Result<Vec<Uuid>> {
        DiscoveredLink::crawled_missing_article(limit, &self.pool).await
    }

    async fn demote_to_failed(&self, id: Uuid) -> Result<()> {
        DiscoveredLink::demote_to_failed(id, &self.pool).await
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<Uuid> {
        CrawlAttempt::record(
            attempt.link_id,
            attempt.success,
            attempt.response_time_ms,
            attempt.content_length,
            attempt.error_message.as_deref(),
            &self.pool,
        )
        .await
    }

    async fn attempts_for_link(&self, link_id: Uuid) -> Result<Vec<CrawlAttempt>> {
        CrawlAttempt::list_for_link(link_id, &self.pool).await
    }

    async fn prune_attempts(&self, older_than: DateTime<Utc>) -> Result<u64> {
        CrawlAttempt::prune(older_than, &self.pool).await
    }

    async fn insert_article(&self, article: NewArticle) -> Result<ExtractedArticle> {
        ExtractedArticle::upsert(
            article.link_id,
            article.vector_id,
            &article.title,
            article.author.as_deref(),
            article.published_date,
            article.content_length,
            article.quality_score,
            &article.domain,
            &article.keywords,
            article.metadata,
            &self.pool,
        )
        .await
    }

    async fn article_by_link(&self, link_id: Uuid) -> Result<Option<ExtractedArticle>> {
        ExtractedArticle::find_by_link(link_id, &self.pool).await
    }

    async fn set_article_vector(&self, article_id: Uuid, vector_id: Option<Uuid>) -> Result<()> {
        ExtractedArticle::set_vector_id(article_id, vector_id, &self.pool).await
    }

    async fn articles_by_domain(&self, domain: &str, limit: i64) -> Result<Vec<ExtractedArticle>> {
        ExtractedArticle::list_by_domain(domain, limit, &self.pool).await
    }

    async fn recent_articles(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ExtractedArticle>> {
        ExtractedArticle::list_recent(since, limit, &self.pool).await
    }

    async fn add_stats(&self, site_id: Uuid, day: NaiveDate, delta: StatsDelta) -> Result<()> {
        CrawlStats::add(site_id, day, delta, &self.pool).await
    }

    async fn stats_since(&self, day: NaiveDate) -> Result<Vec<CrawlStats>> {
        CrawlStats::since(day, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
