//! Strategy (c): popular-repo sweep, segmented into overlapping star
//! ranges to bypass the 1000-result cap on a single unbounded query.

use async_trait::async_trait;

use crate::errors::{ClientError, DiscoveryResult};
use crate::github_client::CodeHostClient;
use crate::types::{DiscoveredRepo, DiscoveryStrategy};

use super::{Discover, DiscoveryOutput};

const MAX_PAGES: u32 = 10;

/// Overlapping star-count boundaries. The last range is open-ended.
fn star_ranges(min_stars: u64) -> Vec<(u64, Option<u64>)> {
    let boundaries = [500, 1000, 2000, 5000, 10_000, 50_000, 100_000];
    let mut ranges = Vec::new();
    let mut lower = min_stars;
    for &upper in &boundaries {
        if upper > lower {
            ranges.push((lower, Some(upper)));
            lower = upper;
        }
    }
    ranges.push((lower, None));
    ranges
}

/// Strategy (c) from spec.md §4.2.
pub struct PopularRepoSweep {
    min_stars: u64,
}

impl PopularRepoSweep {
    pub fn new(min_stars: u64) -> Self {
        Self { min_stars }
    }
}

#[async_trait]
impl Discover for PopularRepoSweep {
    fn name(&self) -> &'static str {
        "popular_repo_sweep"
    }

    async fn discover(&self, client: &dyn CodeHostClient) -> DiscoveryResult<DiscoveryOutput> {
        let mut output = DiscoveryOutput::default();

        for (lower, upper) in star_ranges(self.min_stars) {
            let query = match upper {
                Some(upper) => format!("stars:{lower}..{upper}"),
                None => format!("stars:>{lower}"),
            };

            for page in 1..=MAX_PAGES {
                let response = match client.search_repos(&query, page).await {
                    Ok(response) => response,
                    Err(ClientError::BeyondResultCap) => break,
                    Err(err) => return Err(err.into()),
                };

                if response.items.is_empty() {
                    break;
                }

                for repo in &response.items {
                    if repo.archived {
                        continue;
                    }
                    let Some((owner, name)) = repo.full_name.split_once('/') else {
                        continue;
                    };
                    output.repos.push(DiscoveredRepo {
                        owner: owner.to_string(),
                        repo: name.to_string(),
                        discovered_via: DiscoveryStrategy::PopularRepoSweep,
                        default_branch: repo.default_branch.clone(),
                        stars: repo.stargazers_count,
                        is_archived: repo.archived,
                        topics: repo.topics.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_start_at_min_stars_and_end_open() {
        let ranges = star_ranges(2);
        assert_eq!(ranges.first(), Some(&(2, Some(500))));
        assert_eq!(ranges.last(), Some(&(100_000, None)));
    }

    #[test]
    fn min_stars_above_a_boundary_skips_it() {
        let ranges = star_ranges(1500);
        assert_eq!(ranges.first(), Some(&(1500, Some(2000))));
    }
}
