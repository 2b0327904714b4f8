//! The discovery engine: five strategies that feed candidates and
//! discovered repos, merged and deduplicated by the orchestrator.

mod deep_tree_scan;
mod popular_repo_sweep;
mod recent_commit_sweep;
mod segmented_code_search;
mod topic_search;

pub use deep_tree_scan::DeepTreeScan;
pub use popular_repo_sweep::PopularRepoSweep;
pub use recent_commit_sweep::RecentCommitSweep;
pub use segmented_code_search::SegmentedCodeSearch;
pub use topic_search::TopicSearch;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::DiscoveryResult;
use crate::github_client::CodeHostClient;
use crate::types::{Candidate, DiscoveredRepo};

/// One discovery strategy's output: either direct candidates (it already
/// confirmed an instruction file) or repos to add to the discovered-repo
/// table for the deep-tree walker to process later.
#[derive(Debug, Default)]
pub struct DiscoveryOutput {
    pub candidates: Vec<Candidate>,
    pub repos: Vec<DiscoveredRepo>,
}

impl DiscoveryOutput {
    fn merge(&mut self, mut other: DiscoveryOutput) {
        self.candidates.append(&mut other.candidates);
        self.repos.append(&mut other.repos);
    }
}

/// A single discovery strategy, modeled per spec.md §9's "value
/// implementing a capability" dispatch — the orchestrator fans out over
/// a plain `Vec<Box<dyn Discover>>`.
#[async_trait]
pub trait Discover: Send + Sync {
    fn name(&self) -> &'static str;

    async fn discover(&self, client: &dyn CodeHostClient) -> DiscoveryResult<DiscoveryOutput>;
}

/// Runs a set of strategies and merges their output, deduplicating
/// candidates by `(owner, repo, path, format)` with first-occurrence-wins
/// ordering, and discovered repos by `(owner, repo)`.
pub struct DiscoveryOrchestrator {
    strategies: Vec<Box<dyn Discover>>,
}

impl DiscoveryOrchestrator {
    pub fn new(strategies: Vec<Box<dyn Discover>>) -> Self {
        Self { strategies }
    }

    /// The full set of strategies (a)-(d); `deep_tree_scan` is run
    /// separately against the discovered-repo table, since it needs
    /// persisted state from the others' output (spec.md §4.2(e)).
    pub fn full_crawl(client: Arc<dyn CodeHostClient>, min_stars: u64) -> Self {
        Self::new(vec![
            Box::new(SegmentedCodeSearch::new()),
            Box::new(TopicSearch::new()),
            Box::new(PopularRepoSweep::new(min_stars)),
            Box::new(RecentCommitSweep::new(30)),
        ])
        .with_client_unused(client)
    }

    /// Strategies (a) and (d) only, per `incremental-crawl` (spec.md §4.9).
    pub fn incremental_crawl(window_days: u32) -> Self {
        Self::new(vec![
            Box::new(SegmentedCodeSearch::new()),
            Box::new(RecentCommitSweep::new(window_days)),
        ])
    }

    // `full_crawl`'s client argument documents intent for callers; the
    // orchestrator itself takes the client at `run` time.
    fn with_client_unused(self, _client: Arc<dyn CodeHostClient>) -> Self {
        self
    }

    pub async fn run(&self, client: &dyn CodeHostClient) -> DiscoveryOutput {
        let mut merged = DiscoveryOutput::default();
        for strategy in &self.strategies {
            match strategy.discover(client).await {
                Ok(output) => {
                    info!(
                        strategy = strategy.name(),
                        candidates = output.candidates.len(),
                        repos = output.repos.len(),
                        "strategy completed"
                    );
                    merged.merge(output);
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "strategy failed, continuing");
                }
            }
        }
        dedupe(merged)
    }
}

fn dedupe(input: DiscoveryOutput) -> DiscoveryOutput {
    let mut seen_candidates = HashSet::new();
    let candidates = input
        .candidates
        .into_iter()
        .filter(|c| seen_candidates.insert((c.owner.clone(), c.repo.clone(), c.path.clone(), c.format)))
        .collect();

    let mut seen_repos = HashSet::new();
    let repos = input
        .repos
        .into_iter()
        .filter(|r| seen_repos.insert((r.owner.clone(), r.repo.clone())))
        .collect();

    DiscoveryOutput { candidates, repos }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::SourceFormat;

    fn candidate(owner: &str, repo: &str, path: &str) -> Candidate {
        Candidate {
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            branch: "main".into(),
            format: SourceFormat::SkillMd,
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let input = DiscoveryOutput {
            candidates: vec![
                candidate("alice", "demo", "skills/hello"),
                candidate("alice", "demo", "skills/hello"),
                candidate("bob", "demo2", "skills/hello"),
            ],
            repos: vec![],
        };
        let merged = dedupe(input);
        assert_eq!(merged.candidates.len(), 2);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let input = DiscoveryOutput {
            candidates: vec![
                candidate("alice", "demo", "skills/hello"),
                candidate("alice", "demo", "skills/hello"),
            ],
            repos: vec![],
        };
        let once = dedupe(input);
        let twice = dedupe(DiscoveryOutput {
            candidates: once.candidates.clone(),
            repos: once.repos.clone(),
        });
        assert_eq!(once.candidates.len(), twice.candidates.len());
    }
}
