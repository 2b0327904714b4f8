//! `skilldex block <id>`: operator override that flips `is_blocked` on a
//! catalog record (spec.md §4.8 — blocked rows are skipped by every
//! future `index-skill` upsert until someone unblocks them by hand).

use anyhow::{bail, Result};
use colored::Colorize;

use super::context::build_catalog_only;

pub async fn execute(id: &str) -> Result<()> {
    let catalog = build_catalog_only().await?;

    let Some(record) = catalog.get(id).await? else {
        bail!("no skill record with id '{id}'");
    };

    catalog.block(id).await?;
    println!(
        "{} {id} ({}/{})",
        "blocked".red().bold(),
        record.owner,
        record.repo
    );
    Ok(())
}
