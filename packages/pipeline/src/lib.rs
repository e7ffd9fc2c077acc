//! The driving layer: crawl orchestration across sites and domains,
//! the time-driven job scheduler, and the semantic read path.

pub mod app;
pub mod config;
pub mod jobs;
pub mod orchestrator;
pub mod report;
pub mod retriever;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use jobs::{Job, JobKind, JobPriority, JobQueue, JobRunner, JobStatus};
pub use orchestrator::{CrawlCounters, CrawlOrchestrator};
pub use retriever::{SearchHit, SearchRequest, SemanticRetriever};
