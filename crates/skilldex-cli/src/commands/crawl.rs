//! `skilldex crawl`: enqueues a single crawl job and exits, for
//! deployments where an external scheduler (systemd timer, k8s CronJob)
//! drives the cadence instead of the in-process cron in `skilldex worker`.

use anyhow::Result;
use colored::Colorize;
use skilldex_core::{Job, JobQueue};

use super::context::EnqueueResources;

pub async fn execute(incremental: bool, window_days: u32) -> Result<()> {
    let resources = EnqueueResources::build().await?;
    let queue = JobQueue::new(resources.job_storage, resources.job_config);

    let job = if incremental {
        Job::incremental_crawl(window_days)
    } else {
        Job::full_crawl()
    };
    let kind = if incremental { "incremental-crawl" } else { "full-crawl" };

    let job_id = queue.enqueue(job).await?;
    println!("{} {kind} job {job_id}", "enqueued".green().bold());
    Ok(())
}
