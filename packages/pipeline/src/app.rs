//! Process assembly: configuration, stores, crawler components and the
//! job dispatch table, built once at startup and handed to the CLI.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;

use crawler::discover::category::{CategoryStrategy, HomepageStrategy};
use crawler::discover::feeds::FeedStrategy;
use crawler::discover::sitemap::SitemapStrategy;
use crawler::discover::spider::FocusedSpider;
use crawler::{
    ContentExtractor, CrawlerConfig, DiscoveryStrategy, HostPacer, HttpFetcher, LinkDiscoverer,
};
use registry::{load_with_overlay, DomainRegistry, Env, SiteRegistry};
use store::{OpenAiEmbedder, PgLinkStore, PgVectorStore, MIGRATOR};

use crate::config::SchedulerConfig;
use crate::jobs::{JobKind, JobRunner};
use crate::orchestrator::CrawlOrchestrator;
use crate::retriever::SemanticRetriever;

pub type AppOrchestrator = CrawlOrchestrator<PgLinkStore, PgVectorStore, OpenAiEmbedder>;
pub type AppRetriever = SemanticRetriever<PgLinkStore, PgVectorStore, OpenAiEmbedder>;

pub struct App {
    pub env: Env,
    pub domains: DomainRegistry,
    pub sites: SiteRegistry,
    pub crawler_config: Arc<CrawlerConfig>,
    pub scheduler_config: SchedulerConfig,
    pub links: Arc<PgLinkStore>,
    pub vectors: Arc<PgVectorStore>,
    pub embedder: Arc<OpenAiEmbedder>,
    pub pacer: Arc<HostPacer>,
    pub orchestrator: Arc<AppOrchestrator>,
    pub retriever: Arc<AppRetriever>,
}

impl App {
    /// Build the whole pipeline from a config directory and the
    /// process environment (`ENV`, `DATABASE_URL`, `OPENAI_API_KEY`).
    pub async fn bootstrap(config_dir: &Path) -> Result<Self> {
        let env = Env::from_process_env();
        tracing::info!(env = %env, config_dir = %config_dir.display(), "Bootstrapping");

        let domains = DomainRegistry::load(config_dir, env).context("Loading domains.json")?;
        let sites = SiteRegistry::load(config_dir, env).context("Loading sites.json")?;
        let crawler_config: CrawlerConfig = load_optional(config_dir, "crawler", env)?;
        let scheduler_config: SchedulerConfig = load_optional(config_dir, "scheduler", env)?;
        let crawler_config = Arc::new(crawler_config);

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("Connecting to Postgres")?;
        MIGRATOR.run(&pool).await.context("Running migrations")?;

        let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let embedder = Arc::new(OpenAiEmbedder::new(api_key));

        let links = Arc::new(PgLinkStore::new(pool.clone()));
        let vectors = Arc::new(PgVectorStore::new(pool));

        let fetcher = HttpFetcher::new(&crawler_config)?;
        let pacer = Arc::new(HostPacer::new(Arc::clone(&crawler_config), fetcher.clone()));

        let discoverer = Arc::new(LinkDiscoverer::new(build_strategies(
            &crawler_config,
            &fetcher,
            &pacer,
        )));
        let extractor = Arc::new(ContentExtractor::new(
            fetcher,
            Arc::clone(&pacer),
            Arc::clone(&crawler_config),
        ));

        let orchestrator = Arc::new(CrawlOrchestrator::new(
            domains.clone(),
            sites.clone(),
            env,
            Arc::clone(&crawler_config),
            Arc::clone(&links),
            Arc::clone(&vectors),
            Arc::clone(&embedder),
            discoverer,
            extractor,
        ));
        let retriever = Arc::new(SemanticRetriever::new(
            domains.clone(),
            env,
            Arc::clone(&links),
            Arc::clone(&vectors),
            Arc::clone(&embedder),
        ));

        Ok(Self {
            env,
            domains,
            sites,
            crawler_config,
            scheduler_config,
            links,
            vectors,
            embedder,
            pacer,
            orchestrator,
            retriever,
        })
    }

    /// Default result count for searches without an explicit k.
    pub fn default_k(&self, domain: Option<&str>) -> usize {
        domain
            .and_then(|id| self.domains.get(id))
            .map(|d| d.max_results(self.env))
            .unwrap_or(10)
    }
}

/// Instantiate the discovery cascade in the configured order. Unknown
/// names are logged and skipped rather than refusing to start.
fn build_strategies(
    config: &Arc<CrawlerConfig>,
    fetcher: &HttpFetcher,
    pacer: &Arc<HostPacer>,
) -> Vec<Box<dyn DiscoveryStrategy>> {
    config
        .discovery_order
        .iter()
        .filter_map(|name| -> Option<Box<dyn DiscoveryStrategy>> {
            match name.as_str() {
                "spider" => Some(Box::new(FocusedSpider::new(
                    fetcher.clone(),
                    Arc::clone(pacer),
                    config.spider.clone(),
                ))),
                "sitemap" => Some(Box::new(SitemapStrategy::new(
                    fetcher.clone(),
                    Arc::clone(pacer),
                ))),
                "feeds" => Some(Box::new(FeedStrategy::new(
                    fetcher.clone(),
                    Arc::clone(pacer),
                ))),
                "category-pages" => Some(Box::new(CategoryStrategy::new(
                    fetcher.clone(),
                    Arc::clone(pacer),
                ))),
                "homepage" => Some(Box::new(HomepageStrategy::new(
                    fetcher.clone(),
                    Arc::clone(pacer),
                ))),
                other => {
                    tracing::warn!(strategy = other, "Unknown discovery strategy, skipping");
                    None
                }
            }
        })
        .collect()
}

/// Tuning files are optional; a missing file means defaults.
fn load_optional<T: serde::de::DeserializeOwned + Default>(
    dir: &Path,
    name: &str,
    env: Env,
) -> Result<T> {
    if dir.join(format!("{name}.json")).exists() {
        Ok(load_with_overlay(dir, name, env)?)
    } else {
        tracing::debug!(name = name, "No tuning file, using defaults");
        Ok(T::default())
    }
}

/// Dispatch table from job kinds onto the orchestrator.
pub struct AppJobRunner {
    orchestrator: Arc<AppOrchestrator>,
    scheduler_config: SchedulerConfig,
}

impl AppJobRunner {
    pub fn new(orchestrator: Arc<AppOrchestrator>, scheduler_config: SchedulerConfig) -> Self {
        Self {
            orchestrator,
            scheduler_config,
        }
    }
}

#[async_trait]
impl JobRunner for AppJobRunner {
    async fn run(&self, kind: &JobKind) -> Result<serde_json::Value> {
        match kind {
            JobKind::DomainCrawl { domain } => {
                let counters = self.orchestrator.crawl_domain(domain).await?;
                Ok(serde_json::to_value(counters)?)
            }
            JobKind::FullCrawl => {
                let counters = self.orchestrator.crawl_all(None).await;
                Ok(serde_json::to_value(counters)?)
            }
            JobKind::Refresh { hours_old } => {
                let counters = self.orchestrator.crawl_all(Some(*hours_old)).await;
                Ok(serde_json::to_value(counters)?)
            }
            JobKind::Cleanup { days_old } => {
                let report = self
                    .orchestrator
                    .cleanup(*days_old, self.scheduler_config.retention_days)
                    .await?;
                Ok(serde_json::to_value(report)?)
            }
            JobKind::Sync => {
                let report = self.orchestrator.sync().await?;
                Ok(serde_json::json!({
                    "collections_checked": report.collections_checked,
                    "orphan_vectors_removed": report.orphan_vectors_removed,
                    "dangling_references_cleared": report.dangling_references_cleared,
                    "links_demoted": report.links_demoted,
                }))
            }
        }
    }
}
