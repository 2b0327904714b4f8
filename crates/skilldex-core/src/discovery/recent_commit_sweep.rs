//! Strategy (d): recent-commit sweep. Catches instruction files added to
//! non-default branches that code search (default-branch-only) misses.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::errors::{ClientError, DiscoveryResult};
use crate::formats::SourceFormat;
use crate::github_client::CodeHostClient;
use crate::types::{DiscoveredRepo, DiscoveryStrategy};

use super::{Discover, DiscoveryOutput};

const MAX_PAGES: u32 = 10;

/// Strategy (d) from spec.md §4.2.
pub struct RecentCommitSweep {
    window_days: u32,
}

impl RecentCommitSweep {
    pub fn new(window_days: u32) -> Self {
        Self { window_days }
    }
}

#[async_trait]
impl Discover for RecentCommitSweep {
    fn name(&self) -> &'static str {
        "recent_commit_sweep"
    }

    async fn discover(&self, client: &dyn CodeHostClient) -> DiscoveryResult<DiscoveryOutput> {
        let mut output = DiscoveryOutput::default();
        let since = (Utc::now() - Duration::days(self.window_days as i64))
            .format("%Y-%m-%d")
            .to_string();

        for format in SourceFormat::ALL {
            let query = format!("\"{}\" committer-date:>{since}", format.filename());

            for page in 1..=MAX_PAGES {
                let response = match client.search_commits(&query, page).await {
                    Ok(response) => response,
                    Err(ClientError::BeyondResultCap) => break,
                    Err(err) => return Err(err.into()),
                };

                if response.items.is_empty() {
                    break;
                }

                for commit in &response.items {
                    let Some(repo_ref) = &commit.repository else {
                        continue;
                    };
                    let Some((owner, name)) = repo_ref.full_name.split_once('/') else {
                        continue;
                    };
                    output.repos.push(DiscoveredRepo {
                        owner: owner.to_string(),
                        repo: name.to_string(),
                        discovered_via: DiscoveryStrategy::RecentCommitSweep,
                        default_branch: String::new(),
                        stars: 0,
                        is_archived: false,
                        topics: Vec::new(),
                        last_scanned: None,
                    });
                }

                if (response.items.len() as u64) < 100 {
                    break;
                }
            }
        }

        Ok(output)
    }
}
