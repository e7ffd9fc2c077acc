//! Time-driven schedules. Each tick only enqueues a job; execution and
//! history belong to the worker loop in `jobs`.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use crate::config::{daily_cron, every_hours_cron, weekly_cron, SchedulerConfig};
use crate::jobs::{JobKind, JobPriority, JobQueue};

/// Start the cron schedules derived from the config:
/// - daily full crawl at `update_time`
/// - refresh every `check_interval_hours`
/// - weekly cleanup at `cleanup_day` + `cleanup_time`
/// - daily sync at `sync_time`
pub async fn start_scheduler(
    config: &SchedulerConfig,
    queue: Arc<JobQueue>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let crawl_queue = Arc::clone(&queue);
    let crawl_job = CronJob::new_async(daily_cron(&config.update_time).as_str(), move |_uuid, _lock| {
        let queue = Arc::clone(&crawl_queue);
        Box::pin(async move {
            queue.run_now(JobKind::FullCrawl, JobPriority::Normal);
        })
    })?;
    scheduler.add(crawl_job).await?;

    let refresh_queue = Arc::clone(&queue);
    let refresh_hours = config.refresh_hours_old;
    let refresh_job = CronJob::new_async(
        every_hours_cron(config.check_interval_hours).as_str(),
        move |_uuid, _lock| {
            let queue = Arc::clone(&refresh_queue);
            Box::pin(async move {
                queue.run_now(
                    JobKind::Refresh {
                        hours_old: refresh_hours,
                    },
                    JobPriority::Low,
                );
            })
        },
    )?;
    scheduler.add(refresh_job).await?;

    let cleanup_queue = Arc::clone(&queue);
    let cleanup_days = config.cleanup_days_old;
    let cleanup_job = CronJob::new_async(
        weekly_cron(&config.cleanup_day, &config.cleanup_time).as_str(),
        move |_uuid, _lock| {
            let queue = Arc::clone(&cleanup_queue);
            Box::pin(async move {
                queue.run_now(
                    JobKind::Cleanup {
                        days_old: cleanup_days,
                    },
                    JobPriority::Low,
                );
            })
        },
    )?;
    scheduler.add(cleanup_job).await?;

    let sync_queue = Arc::clone(&queue);
    let sync_job = CronJob::new_async(daily_cron(&config.sync_time).as_str(), move |_uuid, _lock| {
        let queue = Arc::clone(&sync_queue);
        Box::pin(async move {
            queue.run_now(JobKind::Sync, JobPriority::Low);
        })
    })?;
    scheduler.add(sync_job).await?;

    scheduler.start().await?;
    tracing::info!(
        update_time = %config.update_time,
        check_interval_hours = config.check_interval_hours,
        cleanup = %format!("{} {}", config.cleanup_day, config.cleanup_time),
        sync_time = %config.sync_time,
        "Scheduler started"
    );
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scheduler_starts_with_default_config() {
        let queue = Arc::new(JobQueue::new(10));
        let mut scheduler = start_scheduler(&SchedulerConfig::default(), queue)
            .await
            .unwrap();
        scheduler.shutdown().await.unwrap();
    }
}
