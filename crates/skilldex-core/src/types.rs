//! Domain types shared across the discovery, fetch, parse, and scoring
//! stages.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::formats::SourceFormat;

/// A repository the discovery stage has surfaced, regardless of whether
/// it has been confirmed to carry an instruction file yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredRepo {
    pub owner: String,
    pub repo: String,
    /// Which discovery strategy first surfaced this repository.
    pub discovered_via: DiscoveryStrategy,
    pub default_branch: String,
    pub stars: u64,
    pub is_archived: bool,
    pub topics: Vec<String>,
    pub last_scanned: Option<DateTime<Utc>>,
}

/// The discovery strategies described in spec.md §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    SegmentedCodeSearch,
    TopicSearch,
    PopularRepoSweep,
    RecentCommitSweep,
    DeepTreeScan,
}

impl std::fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscoveryStrategy::SegmentedCodeSearch => "segmented_code_search",
            DiscoveryStrategy::TopicSearch => "topic_search",
            DiscoveryStrategy::PopularRepoSweep => "popular_repo_sweep",
            DiscoveryStrategy::RecentCommitSweep => "recent_commit_sweep",
            DiscoveryStrategy::DeepTreeScan => "deep_tree_scan",
        };
        write!(f, "{s}")
    }
}

/// A candidate instruction file located by discovery, ready to be fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub owner: String,
    pub repo: String,
    /// Path within the repository, relative to the repo root.
    /// `"."` for root-only formats resolved at the root.
    pub path: String,
    pub branch: String,
    pub format: SourceFormat,
}

impl Candidate {
    pub fn repo_full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Builds a skill record id per spec.md §3's "Id rule":
/// `owner/repo/<skill-name>[~<format-tag>]`, the suffix appended iff
/// `source_format != skill.md`.
pub fn build_skill_id(owner: &str, repo: &str, name: &str, format: SourceFormat) -> String {
    match format.id_tag() {
        Some(tag) => format!("{owner}/{repo}/{name}~{tag}"),
        None => format!("{owner}/{repo}/{name}"),
    }
}

/// Raw content fetched for a candidate, plus any sibling files the parser
/// needs (`scripts/`, `references/` for `skill.md`, per spec.md §4.3).
#[derive(Debug, Clone)]
pub struct FetchedCandidate {
    pub candidate: Candidate,
    pub raw_content: String,
    /// Sibling file path -> content, only populated for `skill.md`.
    pub cached_files: HashMap<String, String>,
}

/// Security scan status, computed per spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityStatus {
    Pass,
    Warning,
    Fail,
}

impl std::fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityStatus::Pass => "pass",
            SecurityStatus::Warning => "warning",
            SecurityStatus::Fail => "fail",
        };
        write!(f, "{s}")
    }
}

/// How a skill record relates to other skills in the same repository,
/// per spec.md §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    /// The only skill in its repository.
    Standalone,
    /// One of several skills living in the same repository.
    Collection,
    /// A repository whose sole purpose is to bundle unrelated skills.
    Aggregator,
    /// A skill folder embedded inside an unrelated project's repository.
    ProjectBound,
}

impl std::fmt::Display for SkillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkillType::Standalone => "standalone",
            SkillType::Collection => "collection",
            SkillType::Aggregator => "aggregator",
            SkillType::ProjectBound => "project-bound",
        };
        write!(f, "{s}")
    }
}

/// Compatibility metadata declared (or inferred) for a skill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Compatibility {
    pub platforms: Vec<String>,
}

/// When a skill should be surfaced to an agent, declared (or inferred).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Triggers {
    pub file_patterns: Vec<String>,
    pub keywords: Vec<String>,
    pub languages: Vec<String>,
}

/// A fully indexed skill, ready for catalog persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillRecord {
    /// `owner/repo/path` for `skill.md`, `owner/repo/path~<format-tag>`
    /// for every other format (spec.md §3, Id rule).
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub repo: String,
    pub skill_path: String,
    pub branch: String,
    pub source_format: SourceFormat,
    pub version: Option<String>,
    pub license: Option<String>,
    pub author: Option<String>,
    pub homepage: Option<String>,
    pub compatibility: Compatibility,
    pub triggers: Triggers,

    pub github_stars: u64,
    pub github_forks: u64,

    pub security_score: f64,
    pub security_status: SecurityStatus,
    pub security_findings: Vec<String>,

    pub quality_score: f64,
    pub quality_details: QualityDetails,

    pub content_hash: String,
    pub raw_content: String,
    pub cached_files: HashMap<String, String>,

    pub skill_type: SkillType,
    pub repo_skill_count: u32,

    pub is_duplicate: bool,
    pub canonical_skill_id: Option<String>,

    pub is_blocked: bool,
    pub is_verified: bool,
    pub is_featured: bool,

    pub indexed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-factor breakdown backing `quality_score`, per spec.md §4.6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityDetails {
    pub documentation: f64,
    pub maintenance: f64,
    pub popularity: f64,
    pub security: f64,
    pub validation: f64,
}

/// A GitHub credential tracked by the token pool.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub credential: String,
    pub name: String,
    pub remaining: u32,
    pub limit: u32,
    pub reset_epoch_secs: u64,
    pub last_used_epoch_secs: u64,
    pub is_exhausted: bool,
}

/// An operator request to add a specific repository or skill path to the
/// catalog out-of-band from normal discovery.
///
/// `user_email`/`locale` identify who to notify (spec.md §6's
/// `ClaimIndexedEvent`) once the requested repo is indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRequest {
    pub id: Uuid,
    pub owner: String,
    pub repo: String,
    pub path: Option<String>,
    pub user_email: String,
    pub locale: String,
    pub requested_at: DateTime<Utc>,
}

/// An operator request to block a skill record from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalRequest {
    pub id: Uuid,
    pub skill_id: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_full_name() {
        let candidate = Candidate {
            owner: "acme".into(),
            repo: "widgets".into(),
            path: "SKILL.md".into(),
            branch: "main".into(),
            format: SourceFormat::SkillMd,
        };
        assert_eq!(candidate.repo_full_name(), "acme/widgets");
    }

    #[test]
    fn security_status_display() {
        assert_eq!(SecurityStatus::Warning.to_string(), "warning");
    }

    #[test]
    fn skill_id_omits_tag_for_skill_md() {
        assert_eq!(build_skill_id("acme", "widgets", "hello", SourceFormat::SkillMd), "acme/widgets/hello");
    }

    #[test]
    fn skill_id_appends_tag_for_other_formats() {
        assert_eq!(
            build_skill_id("acme", "widgets", "hello", SourceFormat::Cursorrules),
            "acme/widgets/hello~cursorrules"
        );
    }
}
