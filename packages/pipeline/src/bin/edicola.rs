//! Administrative command surface for the acquisition pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pipeline::app::{App, AppJobRunner};
use pipeline::jobs::{run_worker, JobKind, JobPriority, JobQueue};
use pipeline::report;
use pipeline::retriever::SearchRequest;
use pipeline::scheduler::start_scheduler;
use store::check_health;

#[derive(Parser)]
#[command(name = "edicola", about = "Domain-scoped news acquisition pipeline")]
struct Cli {
    /// Directory holding domains.json / sites.json / crawler.json /
    /// scheduler.json
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every active site of one domain
    CrawlDomain { domain: String },
    /// Crawl one site by its registry key
    CrawlSite { site: String },
    /// Crawl every active site of every active domain
    CrawlAll,
    /// Mark stale links obsolete and purge expired history
    Cleanup {
        /// Links not successfully crawled for this many days become
        /// obsolete
        #[arg(long)]
        days: Option<u32>,
    },
    /// Reconcile the relational and vector stores
    Sync,
    /// Ask a question against the ingested articles
    Search {
        question: String,
        #[arg(long)]
        domain: Option<String>,
        #[arg(short)]
        k: Option<usize>,
        /// Only articles published in the last N days
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        min_quality: Option<f32>,
    },
    /// Crawl statistics for the last days
    Stats {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Per-store health booleans
    Health,
    /// Run the scheduler daemon until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let app = App::bootstrap(&cli.config_dir).await?;

    match cli.command {
        Command::CrawlDomain { domain } => {
            app.orchestrator.recover_interrupted().await?;
            let counters = app.orchestrator.crawl_domain(&domain).await?;
            println!("{}", report::crawl_report(&counters));
        }
        Command::CrawlSite { site } => {
            app.orchestrator.recover_interrupted().await?;
            let counters = app.orchestrator.crawl_site_key(&site).await?;
            println!("{}", report::crawl_report(&counters));
        }
        Command::CrawlAll => {
            app.orchestrator.recover_interrupted().await?;
            let counters = app.orchestrator.crawl_all(None).await;
            println!("{}", report::crawl_report(&counters));
        }
        Command::Cleanup { days } => {
            let days = days.unwrap_or(app.scheduler_config.cleanup_days_old);
            let cleaned = app
                .orchestrator
                .cleanup(days, app.scheduler_config.retention_days)
                .await?;
            println!("{}", report::cleanup_report(&cleaned));
        }
        Command::Sync => {
            let report = app.orchestrator.sync().await?;
            println!(
                "collections={} orphans_removed={} dangling_cleared={} links_demoted={}",
                report.collections_checked,
                report.orphan_vectors_removed,
                report.dangling_references_cleared,
                report.links_demoted
            );
        }
        Command::Search {
            question,
            domain,
            k,
            days,
            min_quality,
        } => {
            let k = k.unwrap_or_else(|| app.default_k(domain.as_deref()));
            let time_range = days.map(|days| {
                let now = Utc::now();
                (now - ChronoDuration::days(i64::from(days)), now)
            });
            let hits = app
                .retriever
                .search(&SearchRequest {
                    question,
                    domain,
                    k,
                    time_range,
                    min_quality,
                })
                .await?;
            println!("{}", report::search_report(&hits));
        }
        Command::Stats { days } => {
            let since = (Utc::now() - ChronoDuration::days(i64::from(days))).date_naive();
            let rows = store::LinkStore::stats_since(app.links.as_ref(), since).await?;
            let recent = store::LinkStore::recent_articles(
                app.links.as_ref(),
                Utc::now() - ChronoDuration::days(i64::from(days)),
                10,
            )
            .await?;
            println!("{}", report::stats_report(&rows, &recent, &app.pacer.stats()));
        }
        Command::Health => {
            let health = check_health(&app.links, &app.vectors).await;
            println!(
                "relational={} vector={}",
                health.relational, health.vector
            );
            if !health.healthy() {
                anyhow::bail!("one or more stores unhealthy");
            }
        }
        Command::Serve => {
            app.orchestrator.recover_interrupted().await?;

            let queue = Arc::new(JobQueue::new(app.scheduler_config.history_limit));
            let runner = AppJobRunner::new(
                Arc::clone(&app.orchestrator),
                app.scheduler_config.clone(),
            );
            let mut scheduler = start_scheduler(&app.scheduler_config, Arc::clone(&queue)).await?;

            // Kick one full crawl on startup so a fresh deployment does
            // not wait for the first tick.
            queue.run_now(JobKind::FullCrawl, JobPriority::Normal);

            let cancel = CancellationToken::new();
            let worker_cancel = cancel.clone();
            let worker_queue = Arc::clone(&queue);
            let worker = tokio::spawn(async move {
                run_worker(worker_queue.as_ref(), &runner, worker_cancel).await;
            });

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown requested, draining worker");
            cancel.cancel();
            scheduler.shutdown().await.ok();
            worker.await.ok();
        }
    }

    Ok(())
}
