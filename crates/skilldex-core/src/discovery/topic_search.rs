//! Strategy (b): topic and description search. Feeds the discovered-repo
//! table rather than emitting candidates directly — the deep-tree walker
//! confirms whether these repos actually carry an instruction file.

use async_trait::async_trait;

use crate::errors::{ClientError, DiscoveryResult};
use crate::github_client::CodeHostClient;
use crate::types::{DiscoveredRepo, DiscoveryStrategy};

use super::{Discover, DiscoveryOutput};

const MAX_PAGES: u32 = 10;

fn queries() -> Vec<&'static str> {
    vec![
        "topic:claude-skills",
        "topic:cursor-rules",
        "topic:skill",
        "topic:skills",
        "topic:ai-agent-skills",
        "\"SKILL.md\" in:readme",
        "\".cursorrules\" in:readme",
        "\"AGENTS.md\" in:readme",
    ]
}

/// Strategy (b) from spec.md §4.2.
pub struct TopicSearch {
    queries: Vec<&'static str>,
}

impl TopicSearch {
    pub fn new() -> Self {
        Self { queries: queries() }
    }
}

impl Default for TopicSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discover for TopicSearch {
    fn name(&self) -> &'static str {
        "topic_search"
    }

    async fn discover(&self, client: &dyn CodeHostClient) -> DiscoveryResult<DiscoveryOutput> {
        let mut output = DiscoveryOutput::default();

        for query in &self.queries {
            for page in 1..=MAX_PAGES {
                let response = match client.search_repos(query, page).await {
                    Ok(response) => response,
                    Err(ClientError::BeyondResultCap) => break,
                    Err(err) => return Err(err.into()),
                };

                if response.items.is_empty() {
                    break;
                }

                for repo in &response.items {
                    let Some((owner, name)) = repo.full_name.split_once('/') else {
                        continue;
                    };
                    output.repos.push(DiscoveredRepo {
                        owner: owner.to_string(),
                        repo: name.to_string(),
                        discovered_via: DiscoveryStrategy::TopicSearch,
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
