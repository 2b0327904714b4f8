//! `skilldex worker`: the long-lived process. Runs the worker pool with
//! every `JobHandler` wired up, plus an in-process `tokio-cron-scheduler`
//! that enqueues the recurring crawl/score jobs (SPEC_FULL.md §4.9
//! expansion) rather than running them inline, so a missed or delayed
//! tick still lands in the durable queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use skilldex_core::{Job, JobQueue, WorkerConfig, WorkerPool};
use skilldex_store::{
    DeepScanHandler, FullCrawlHandler, IncrementalCrawlHandler, IndexSkillHandler,
    MaintenanceHandler, ScoreBatchHandler,
};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info};

use super::context::WorkerResources;

const FULL_CRAWL_CRON: &str = "0 0 3 * * *";
const INCREMENTAL_CRAWL_CRON: &str = "0 0 * * * *";
const SCORE_BATCH_CRON: &str = "0 15 * * * *";

pub async fn execute(workers: usize, concurrency: usize) -> Result<()> {
    let resources = WorkerResources::build().await?;
    let min_stars = resources.indexer_config.min_stars;
    let queue = Arc::new(JobQueue::new(resources.job_storage.clone(), resources.job_config.clone()));

    let worker_config = WorkerConfig::new().with_workers(workers).with_concurrency(concurrency);

    let pool = WorkerPool::new(resources.job_storage.clone(), worker_config)
        .with_handler(Box::new(IndexSkillHandler {
            client: resources.client.clone(),
            catalog: resources.catalog.clone(),
            search: resources.search.clone(),
            cache: resources.cache.clone(),
            notifier: resources.notifier.clone(),
        }))
        .with_handler(Box::new(DeepScanHandler {
            client: resources.client.clone(),
            queue: queue.clone(),
        }))
        .with_handler(Box::new(FullCrawlHandler {
            client: resources.client.clone(),
            min_stars,
            queue: queue.clone(),
        }))
        .with_handler(Box::new(IncrementalCrawlHandler {
            client: resources.client.clone(),
            queue: queue.clone(),
        }))
        .with_handler(Box::new(ScoreBatchHandler { catalog: resources.catalog.clone() }))
        .with_handler(Box::new(MaintenanceHandler { queue: queue.clone() }));

    pool.start().await.context("starting worker pool")?;
    println!("{} {workers} workers, concurrency {concurrency}", "worker pool started".green().bold());

    let mut scheduler = start_scheduler(queue.clone()).await?;

    shutdown_signal().await;
    info!("shutdown signal received, draining worker pool");

    scheduler.shutdown().await.context("stopping cron scheduler")?;
    pool.shutdown(Duration::from_secs(30)).await.context("shutting down worker pool")?;
    println!("{}", "worker pool stopped".yellow().bold());
    Ok(())
}

/// Registers the three recurring crawl/score ticks. Each tick only
/// enqueues a job; the worker pool above does the actual work, so a
/// scheduler restart never loses progress mid-crawl.
async fn start_scheduler(queue: Arc<JobQueue>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await.context("creating cron scheduler")?;

    let full_crawl_queue = queue.clone();
    scheduler
        .add(
            CronJob::new_async(FULL_CRAWL_CRON, move |_uuid, _lock| {
                let queue = full_crawl_queue.clone();
                Box::pin(async move {
                    if let Err(err) = queue.enqueue(Job::full_crawl()).await {
                        error!(%err, "failed to enqueue scheduled full-crawl");
                    }
                })
            })
            .context("scheduling full-crawl")?,
        )
        .await
        .context("registering full-crawl tick")?;

    let incremental_queue = queue.clone();
    scheduler
        .add(
            CronJob::new_async(INCREMENTAL_CRAWL_CRON, move |_uuid, _lock| {
                let queue = incremental_queue.clone();
                Box::pin(async move {
                    if let Err(err) = queue.enqueue(Job::incremental_crawl(1)).await {
                        error!(%err, "failed to enqueue scheduled incremental-crawl");
                    }
                })
            })
            .context("scheduling incremental-crawl")?,
        )
        .await
        .context("registering incremental-crawl tick")?;

    let score_batch_queue = queue.clone();
    scheduler
        .add(
            CronJob::new_async(SCORE_BATCH_CRON, move |_uuid, _lock| {
                let queue = score_batch_queue.clone();
                Box::pin(async move {
                    if let Err(err) = queue.enqueue(Job::score_batch()).await {
                        error!(%err, "failed to enqueue scheduled score-batch");
                    }
                })
            })
            .context("scheduling score-batch")?,
        )
        .await
        .context("registering score-batch tick")?;

    scheduler.start().await.context("starting cron scheduler")?;
    info!("cron scheduler started: full-crawl daily, incremental-crawl hourly, score-batch hourly");
    Ok(scheduler)
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
