//! `skilldex stats`: prints job-queue and catalog counts for operator
//! visibility, the read-only counterpart to `crawl`/`worker`/`scan`.

use anyhow::Result;
use colored::Colorize;
use skilldex_core::JobQueue;

use super::context::CatalogResources;

pub async fn execute() -> Result<()> {
    let resources = CatalogResources::build().await?;
    let queue = JobQueue::new(resources.job_storage, resources.job_config);

    let stats = queue.stats().await?;
    println!("{}", "job queue".bold());
    println!("  total:   {}", stats.total);
    for (status, count) in &stats.by_status {
        println!("  {status:<10} {count}");
    }
    println!("  avg exec: {}ms", stats.avg_execution_ms);

    let records = resources.catalog.all_non_blocked().await?;
    println!("{}", "catalog".bold());
    println!("  non-blocked records: {}", records.len());
    let duplicates = records.iter().filter(|r| r.is_duplicate).count();
    println!("  duplicates:          {duplicates}");

    Ok(())
}
