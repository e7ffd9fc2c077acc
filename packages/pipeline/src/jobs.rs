//! In-memory job queue with priorities, a worker drain loop, and a
//! bounded execution history.
//!
//! The queue lives and dies with the process: schedules re-enqueue
//! work on the next tick, so nothing here needs to survive a restart
//! (links the process abandoned are recovered by the startup sweep).

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    DomainCrawl { domain: String },
    FullCrawl,
    Cleanup { days_old: u32 },
    Sync,
    Refresh { hours_old: u32 },
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::DomainCrawl { .. } => "domain_crawl",
            JobKind::FullCrawl => "full_crawl",
            JobKind::Cleanup { .. } => "cleanup",
            JobKind::Sync => "sync",
            JobKind::Refresh { .. } => "refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Scheduled,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl JobPriority {
    /// Lower sorts first.
    fn rank(self) -> u8 {
        match self {
            JobPriority::High => 0,
            JobPriority::Normal => 1,
            JobPriority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub priority: JobPriority,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(kind: JobKind, priority: JobPriority) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            priority,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            status: JobStatus::Scheduled,
            result: None,
            error: None,
        }
    }
}

/// Executes one job kind. The app implements this by dispatching onto
/// the orchestrator; tests substitute stubs.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, kind: &JobKind) -> anyhow::Result<serde_json::Value>;
}

#[derive(Default)]
struct QueueInner {
    queue: Vec<Job>,
    history: VecDeque<Job>,
}

/// Priority queue plus bounded FIFO history.
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    history_limit: usize,
}

impl JobQueue {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            history_limit: history_limit.max(1),
        }
    }

    /// Enqueue a job immediately. Returns its id.
    pub fn run_now(&self, kind: JobKind, priority: JobPriority) -> Uuid {
        let job = Job::new(kind, priority);
        let id = job.id;
        tracing::info!(job = %id, kind = job.kind.name(), "Job enqueued");
        self.inner.lock().expect("queue lock poisoned").queue.push(job);
        self.notify.notify_one();
        id
    }

    /// Pop the best queued job: priority first, then submission order.
    fn pop(&self) -> Option<Job> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.queue.is_empty() {
            return None;
        }
        let best = inner
            .queue
            .iter()
            .enumerate()
            .min_by_key(|(_, job)| (job.priority.rank(), job.scheduled_at))
            .map(|(index, _)| index)?;
        Some(inner.queue.remove(best))
    }

    /// Wait for the next job, or `None` once cancelled.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<Job> {
        loop {
            if let Some(job) = self.pop() {
                return Some(job);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Record a finished job, discarding the oldest history entry once
    /// the buffer is full.
    pub fn record(&self, job: Job) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.history.len() == self.history_limit {
            inner.history.pop_front();
        }
        inner.history.push_back(job);
    }

    pub fn queued(&self) -> Vec<Job> {
        self.inner.lock().expect("queue lock poisoned").queue.clone()
    }

    pub fn history(&self) -> Vec<Job> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }
}

/// Drain the queue until cancelled. In-flight jobs run to completion;
/// the loop exits on the next pull.
pub async fn run_worker<R: JobRunner>(queue: &JobQueue, runner: &R, cancel: CancellationToken) {
    tracing::info!("Job worker started");
    while let Some(mut job) = queue.next(&cancel).await {
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        tracing::info!(job = %job.id, kind = job.kind.name(), "Job started");

        match runner.run(&job.kind).await {
            Ok(result) => {
                job.status = JobStatus::Completed;
                job.result = Some(result);
                tracing::info!(job = %job.id, kind = job.kind.name(), "Job completed");
            }
            Err(err) => {
                job.status = JobStatus::Failed;
                job.error = Some(err.to_string());
                tracing::error!(job = %job.id, kind = job.kind.name(), error = %err, "Job failed");
            }
        }
        job.finished_at = Some(Utc::now());
        queue.record(job);
    }
    tracing::info!("Job worker stopped");
}
