//! `skilldex scan owner/repo`: enqueues a `deep-scan` job for one
//! explicitly-named repository, bypassing the star-threshold discovery
//! strategies entirely (used for operator-submitted add requests).

use anyhow::{bail, Result};
use colored::Colorize;
use skilldex_core::{Job, JobQueue};

use super::context::EnqueueResources;

pub async fn execute(slug: &str) -> Result<()> {
    let Some((owner, repo)) = slug.split_once('/') else {
        bail!("expected OWNER/REPO, got '{slug}'");
    };

    let resources = EnqueueResources::build().await?;
    let queue = JobQueue::new(resources.job_storage, resources.job_config);

    let job_id = queue.enqueue(Job::deep_scan(owner, repo)).await?;
    println!("{} deep-scan job {job_id} for {owner}/{repo}", "enqueued".green().bold());
    Ok(())
}
