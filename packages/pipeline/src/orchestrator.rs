//! The crawl orchestrator: drives one site through
//! discover → persist → select → extract → commit, and rolls results
//! up per domain and per run.
//!
//! Failure scope is deliberately small: one link's failure never
//! touches its batch siblings, one site's failure never touches its
//! domain siblings. Only store-level fatal errors propagate.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use serde::Serialize;
use url::Url;

use crawler::discover::SiteDiscoverer;
use crawler::extract::{ArticleExtractor, ExtractionContext};
use crawler::{hash, CrawlerConfig, FailureReason};
use registry::{Domain, DomainRegistry, Env, SiteConfig, SiteRegistry};
use store::models::link::DiscoveredLink;
use store::sync::{run_sync, SyncReport};
use store::{Embedder, LinkStore, NewAttempt, NewLink, StatsDelta, StoreCoordinator, VectorStore};

/// Per-run (or per-site) rollup, the shape the admin surface reports.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CrawlCounters {
    pub sites_processed: u64,
    pub links_discovered: u64,
    pub links_crawled: u64,
    pub articles_extracted: u64,
    pub errors: u64,
}

impl CrawlCounters {
    pub fn absorb(&mut self, other: CrawlCounters) {
        self.sites_processed += other.sites_processed;
        self.links_discovered += other.links_discovered;
        self.links_crawled += other.links_crawled;
        self.articles_extracted += other.articles_extracted;
        self.errors += other.errors;
    }
}

/// What the cleanup job did.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CleanupReport {
    pub links_obsoleted: u64,
    pub links_blocked: u64,
    pub links_purged: u64,
    pub attempts_pruned: u64,
}

enum LinkOutcome {
    Extracted { quality: f32 },
    Failed,
    Skipped,
}

pub struct CrawlOrchestrator<L, V, E> {
    domains: DomainRegistry,
    sites: SiteRegistry,
    env: Env,
    config: Arc<CrawlerConfig>,
    links: Arc<L>,
    vectors: Arc<V>,
    coordinator: StoreCoordinator<L, V, E>,
    discoverer: Arc<dyn SiteDiscoverer>,
    extractor: Arc<dyn ArticleExtractor>,
}

impl<L, V, E> CrawlOrchestrator<L, V, E>
where
    L: LinkStore + 'static,
    V: VectorStore + 'static,
    E: Embedder + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domains: DomainRegistry,
        sites: SiteRegistry,
        env: Env,
        config: Arc<CrawlerConfig>,
        links: Arc<L>,
        vectors: Arc<V>,
        embedder: Arc<E>,
        discoverer: Arc<dyn SiteDiscoverer>,
        extractor: Arc<dyn ArticleExtractor>,
    ) -> Self {
        let coordinator =
            StoreCoordinator::new(Arc::clone(&links), Arc::clone(&vectors), embedder);
        Self {
            domains,
            sites,
            env,
            config,
            links,
            vectors,
            coordinator,
            discoverer,
            extractor,
        }
    }

    /// Sweep links left in CRAWLING by a previous process back to NEW.
    /// Run once at startup, before any job.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        self.links
            .recover_stale()
            .await
            .context("Startup recovery sweep failed")
    }

    /// Crawl every active site of every active domain.
    pub async fn crawl_all(&self, refresh_hours_old: Option<u32>) -> CrawlCounters {
        let mut totals = CrawlCounters::default();
        let domains: Vec<&Domain> = self.domains.active().collect();
        for domain in domains {
            totals.absorb(self.crawl_domain_inner(domain, refresh_hours_old).await);
        }
        // Sites pointing at unknown or inactive domains are config
        // errors the per-domain walk cannot see.
        for site in self.sites.active() {
            if self.domains.require_active(&site.domain).is_err() {
                tracing::error!(
                    site = %site.id,
                    domain = %site.domain,
                    "Site references unknown or inactive domain, skipping"
                );
                totals.errors += 1;
            }
        }
        tracing::info!(
            sites = totals.sites_processed,
            discovered = totals.links_discovered,
            crawled = totals.links_crawled,
            articles = totals.articles_extracted,
            errors = totals.errors,
            "Full crawl complete"
        );
        totals
    }

    /// Crawl all active sites of one domain. Fails only when the
    /// domain itself is unknown or inactive.
    pub async fn crawl_domain(&self, domain_id: &str) -> Result<CrawlCounters> {
        let domain = self.domains.require_active(domain_id)?;
        Ok(self.crawl_domain_inner(domain, None).await)
    }

    async fn crawl_domain_inner(
        &self,
        domain: &Domain,
        refresh_hours_old: Option<u32>,
    ) -> CrawlCounters {
        let mut totals = CrawlCounters::default();
        for site in self.sites.active_for_domain(&domain.id) {
            totals.absorb(self.crawl_site(site, refresh_hours_old).await);
        }
        totals
    }

    /// Crawl one site by its registry key.
    pub async fn crawl_site_key(&self, site_key: &str) -> Result<CrawlCounters> {
        let site = self.sites.require(site_key)?.clone();
        Ok(self.crawl_site(&site, None).await)
    }

    /// One full site pass. Never returns an error: every failure is
    /// counted and logged at the smallest scope that can proceed.
    pub async fn crawl_site(
        &self,
        site: &SiteConfig,
        refresh_hours_old: Option<u32>,
    ) -> CrawlCounters {
        let mut counters = CrawlCounters::default();

        let domain = match self.domains.require_active(&site.domain) {
            Ok(domain) => domain,
            Err(err) => {
                tracing::error!(site = %site.id, error = %err, "Skipping site with bad domain");
                counters.errors += 1;
                return counters;
            }
        };

        let site_row = match self
            .links
            .upsert_site(
                &site.id,
                &site.name,
                &site.base_url,
                &domain.id,
                site.active,
                serde_json::to_value(site).unwrap_or_default(),
            )
            .await
        {
            Ok(row) => row,
            Err(err) => {
                tracing::error!(site = %site.id, error = %err, "Site upsert failed, aborting site");
                counters.errors += 1;
                return counters;
            }
        };
        counters.sites_processed = 1;

        // Discover and persist candidates; both steps are non-fatal.
        let candidates = match self.discoverer.discover_site(site, domain).await {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(site = %site.id, error = %err, "Discovery failed");
                counters.errors += 1;
                Vec::new()
            }
        };
        let new_links: Vec<NewLink> = candidates
            .iter()
            .map(|c| NewLink {
                url: c.url.to_string(),
                url_hash: hash::url_hash(&c.url),
                parent_url: c.parent.as_ref().map(Url::to_string),
                depth: c.depth,
            })
            .collect();
        match self.links.insert_links(site_row.id, &new_links).await {
            Ok(inserted) => counters.links_discovered = inserted,
            Err(err) => {
                tracing::error!(site = %site.id, error = %err, "Link insert failed");
                counters.errors += 1;
            }
        }

        // Select work, oldest discoveries first.
        let refresh_horizon = refresh_hours_old
            .map(|hours| Utc::now() - ChronoDuration::hours(i64::from(hours)));
        let selected = match self
            .links
            .select_crawlable(
                site_row.id,
                self.config.max_per_site as i64,
                refresh_horizon,
                self.config.max_failures,
            )
            .await
        {
            Ok(selected) => selected,
            Err(err) => {
                tracing::error!(site = %site.id, error = %err, "Link selection failed");
                counters.errors += 1;
                Vec::new()
            }
        };

        let ctx = ExtractionContext {
            domain: domain.id.clone(),
            keywords: domain.keywords.clone(),
            language: site.language.clone(),
            site_name: Some(site.name.clone()),
        };
        let collection = domain.collection_name(self.env);

        let mut quality_sum = 0.0f64;
        for batch in selected.chunks(self.config.extraction_batch_size()) {
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|link| self.process_link(link, &ctx, &collection)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    LinkOutcome::Extracted { quality } => {
                        counters.links_crawled += 1;
                        counters.articles_extracted += 1;
                        quality_sum += f64::from(quality);
                    }
                    LinkOutcome::Failed => {
                        counters.links_crawled += 1;
                        counters.errors += 1;
                    }
                    LinkOutcome::Skipped => {}
                }
            }

            tokio::time::sleep(self.config.batch_delay()).await;
        }

        let delta = StatsDelta {
            links_discovered: counters.links_discovered as i64,
            links_crawled: counters.links_crawled as i64,
            links_failed: (counters.links_crawled - counters.articles_extracted) as i64,
            articles_extracted: counters.articles_extracted as i64,
            quality_sum,
        };
        if let Err(err) = self
            .links
            .add_stats(site_row.id, Utc::now().date_naive(), delta)
            .await
        {
            tracing::warn!(site = %site.id, error = %err, "Stats rollup failed");
        }

        tracing::info!(
            site = %site.id,
            discovered = counters.links_discovered,
            crawled = counters.links_crawled,
            articles = counters.articles_extracted,
            errors = counters.errors,
            "Site pass complete"
        );
        counters
    }

    /// Claim, extract and commit one link.
    async fn process_link(
        &self,
        link: &DiscoveredLink,
        ctx: &ExtractionContext,
        collection: &str,
    ) -> LinkOutcome {
        match self.links.claim(link.id).await {
            Ok(true) => {}
            Ok(false) => return LinkOutcome::Skipped,
            Err(err) => {
                tracing::error!(link = %link.id, error = %err, "Claim failed");
                return LinkOutcome::Skipped;
            }
        }

        let Ok(url) = Url::parse(&link.url) else {
            self.finish_failed(link.id, FailureReason::Transport, "invalid url", None)
                .await;
            return LinkOutcome::Failed;
        };

        let content = match self.extractor.extract(&url, ctx).await {
            Ok(content) => content,
            Err(err) => {
                let reason = err.reason();
                self.finish_failed(link.id, reason, &err.to_string(), None)
                    .await;
                return LinkOutcome::Failed;
            }
        };

        match self.coordinator.commit(link.id, collection, &content).await {
            Ok(_receipt) => {
                self.record_attempt(NewAttempt {
                    link_id: link.id,
                    success: true,
                    response_time_ms: Some(content.fetch_elapsed.as_millis() as i64),
                    content_length: Some(content.content_length as i64),
                    error_message: None,
                })
                .await;
                LinkOutcome::Extracted {
                    quality: content.quality_score,
                }
            }
            Err(err) => {
                let reason = err.failure_reason();
                self.finish_failed(
                    link.id,
                    reason,
                    &err.to_string(),
                    Some(content.content_length as i64),
                )
                .await;
                LinkOutcome::Failed
            }
        }
    }

    /// Record the failed attempt and transition the link; best effort,
    /// a store error here is logged and absorbed.
    async fn finish_failed(
        &self,
        link_id: uuid::Uuid,
        reason: FailureReason,
        message: &str,
        content_length: Option<i64>,
    ) {
        self.record_attempt(NewAttempt {
            link_id,
            success: false,
            response_time_ms: None,
            content_length,
            error_message: Some(format!("{reason}: {message}")),
        })
        .await;

        if let Err(err) = self
            .links
            .mark_failed(
                link_id,
                reason.counts_against_link(),
                self.config.max_failures,
            )
            .await
        {
            tracing::error!(link = %link_id, error = %err, "Failed-state transition failed");
        }
    }

    async fn record_attempt(&self, attempt: NewAttempt) {
        if let Err(err) = self.links.record_attempt(attempt).await {
            tracing::error!(error = %err, "Attempt record failed");
        }
    }

    /// The cleanup job: obsolete sweep, blocked promotion, retention
    /// purges.
    pub async fn cleanup(&self, days_old: u32, retention_days: u32) -> Result<CleanupReport> {
        let now = Utc::now();
        let obsolete_horizon = now - ChronoDuration::days(i64::from(days_old));
        let retention_horizon = now - ChronoDuration::days(i64::from(retention_days));

        let report = CleanupReport {
            links_obsoleted: self.links.sweep_obsolete(obsolete_horizon).await?,
            links_blocked: self.links.promote_blocked(self.config.max_failures).await?,
            links_purged: self.links.purge_obsolete(retention_horizon).await?,
            attempts_pruned: self.links.prune_attempts(retention_horizon).await?,
        };
        tracing::info!(
            obsoleted = report.links_obsoleted,
            blocked = report.links_blocked,
            purged = report.links_purged,
            attempts_pruned = report.attempts_pruned,
            "Cleanup complete"
        );
        Ok(report)
    }

    /// The sync job: reconcile both stores for every active domain.
    pub async fn sync(&self) -> Result<SyncReport> {
        let collections: Vec<(String, String)> = self
            .domains
            .active()
            .map(|d| (d.id.clone(), d.collection_name(self.env)))
            .collect();
        run_sync(&self.links, &self.vectors, &collections).await
    }
}
