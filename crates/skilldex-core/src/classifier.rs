//! Classifier and deduper (spec.md §4.7).
//!
//! Runs as a batch phase over a catalog snapshot: computes `repo_skill_count`,
//! assigns `skill_type`, fingerprints content, and picks a canonical record
//! per duplicate set. Pure and idempotent over its input — no I/O here, the
//! caller (in `skilldex-store`) reads the snapshot in and writes the result
//! back out.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::types::SkillType;

const AGGREGATOR_MIN_SKILLS: u32 = 50;
const AGGREGATOR_NAME_MATCH_MIN_SKILLS: u32 = 10;
const COLLECTION_MIN_SKILLS: u32 = 3;
const COLLECTION_MAX_SKILLS: u32 = 49;
const PROJECT_BOUND_MAX_SKILLS: u32 = 2;

const FORK_MARKETPLACE_MIN_SKILLS: u32 = 20;
const FORK_MARKETPLACE_MIN_OWNERS: usize = 3;

fn aggregator_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("(?i)marketplace|awesome|collection|registry").unwrap())
}

fn project_bound_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)my-|project|team|internal|\.mdc|cursorrule|config|setup").unwrap())
}

/// The static keyword → category table (spec.md §1 "no ML"; SPEC_FULL §3
/// expansion). Extend freely; order doesn't matter, all matches are kept.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("kubernetes", &["kubectl", "k8s", "helm", "cluster", "kubernetes"]),
    ("testing", &["pytest", "jest", "test", "coverage", "unittest"]),
    ("database", &["postgres", "mysql", "sqlite", "sql", "database", "orm"]),
    ("devops", &["terraform", "ansible", "ci/cd", "pipeline", "deploy", "docker"]),
    ("web-development", &["react", "vue", "html", "css", "frontend", "webpack"]),
    ("data-science", &["pandas", "numpy", "dataframe", "jupyter", "notebook"]),
    ("security", &["vulnerability", "cve", "pentest", "audit", "encryption"]),
    ("documentation", &["docs", "readme", "markdown", "changelog"]),
    ("version-control", &["git", "github", "gitlab", "branch", "commit"]),
    ("api", &["rest", "graphql", "endpoint", "swagger", "openapi"]),
];

/// Case-insensitively matches `text` against every category's keyword list.
pub fn match_categories(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(slug, _)| *slug)
        .collect()
}

/// Step 1 of §4.7: count non-blocked skills per `(owner, repo)`.
pub fn repo_skill_counts<'a>(skills: impl IntoIterator<Item = (&'a str, &'a str, bool)>) -> HashMap<(String, String), u32> {
    let mut counts = HashMap::new();
    for (owner, repo, is_blocked) in skills {
        if is_blocked {
            continue;
        }
        *counts.entry((owner.to_string(), repo.to_string())).or_insert(0) += 1;
    }
    counts
}

/// Step 2 of §4.7: repo names that exhibit the fork-marketplace pattern —
/// the same repo name shared by ≥20 non-blocked skills across ≥3 distinct
/// owners.
pub fn fork_marketplace_repo_names<'a>(
    skills: impl IntoIterator<Item = (&'a str, &'a str, bool)>,
) -> std::collections::HashSet<String> {
    let mut by_repo_name: HashMap<String, (u32, std::collections::HashSet<String>)> = HashMap::new();
    for (owner, repo, is_blocked) in skills {
        if is_blocked {
            continue;
        }
        let entry = by_repo_name.entry(repo.to_string()).or_default();
        entry.0 += 1;
        entry.1.insert(owner.to_string());
    }

    by_repo_name
        .into_iter()
        .filter(|(_, (count, owners))| *count >= FORK_MARKETPLACE_MIN_SKILLS && owners.len() >= FORK_MARKETPLACE_MIN_OWNERS)
        .map(|(repo_name, _)| repo_name)
        .collect()
}

/// Step 2 of §4.7: assigns `skill_type` for one repo given its skill count
/// and whether its repo name triggered the fork-marketplace pattern.
pub fn classify_skill_type(repo_name: &str, repo_skill_count: u32, is_fork_marketplace: bool) -> SkillType {
    if is_fork_marketplace {
        return SkillType::Aggregator;
    }
    if repo_skill_count >= AGGREGATOR_MIN_SKILLS {
        return SkillType::Aggregator;
    }
    if repo_skill_count >= AGGREGATOR_NAME_MATCH_MIN_SKILLS && aggregator_name_pattern().is_match(repo_name) {
        return SkillType::Aggregator;
    }
    if (COLLECTION_MIN_SKILLS..=COLLECTION_MAX_SKILLS).contains(&repo_skill_count) {
        return SkillType::Collection;
    }
    if repo_skill_count <= PROJECT_BOUND_MAX_SKILLS && project_bound_name_pattern().is_match(repo_name) {
        return SkillType::ProjectBound;
    }
    SkillType::Standalone
}

/// Step 3 of §4.7: `content_hash = md5(raw_content)`.
pub fn content_hash(raw_content: &str) -> String {
    format!("{:x}", md5::compute(raw_content.as_bytes()))
}

/// One record's identity and ranking inputs for the dedup pass.
#[derive(Debug, Clone)]
pub struct DedupeCandidate {
    pub id: String,
    pub content_hash: String,
    pub github_stars: u64,
    pub created_at: DateTime<Utc>,
}

/// The dedup verdict for one id: `None` if it is canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeVerdict {
    pub is_duplicate: bool,
    pub canonical_skill_id: Option<String>,
}

/// Step 4 of §4.7: partitions by `content_hash`, ranks each partition by
/// `(github_stars desc, created_at asc, id asc)`, and returns a verdict per
/// input id. Pure function over the current snapshot; calling it twice with
/// the same input yields identical output.
pub fn assign_canonical(candidates: &[DedupeCandidate]) -> HashMap<String, DedupeVerdict> {
    let mut by_hash: HashMap<&str, Vec<&DedupeCandidate>> = HashMap::new();
    for candidate in candidates {
        by_hash.entry(candidate.content_hash.as_str()).or_default().push(candidate);
    }

    let mut verdicts = HashMap::with_capacity(candidates.len());
    for mut group in by_hash.into_values() {
        group.sort_by(|a, b| {
            b.github_stars
                .cmp(&a.github_stars)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        let canonical_id = group[0].id.clone();
        for (rank, candidate) in group.into_iter().enumerate() {
            let verdict = if rank == 0 {
                DedupeVerdict { is_duplicate: false, canonical_skill_id: None }
            } else {
                DedupeVerdict { is_duplicate: true, canonical_skill_id: Some(canonical_id.clone()) }
            };
            verdicts.insert(candidate.id.clone(), verdict);
        }
    }

    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn aggregator_by_count_threshold() {
        assert_eq!(classify_skill_type("random-repo", 50, false), SkillType::Aggregator);
    }

    #[test]
    fn aggregator_by_name_pattern() {
        assert_eq!(classify_skill_type("awesome-skills", 15, false), SkillType::Aggregator);
        assert_eq!(classify_skill_type("random-repo", 15, false), SkillType::Collection);
    }

    #[test]
    fn collection_range() {
        assert_eq!(classify_skill_type("random-repo", 3, false), SkillType::Collection);
        assert_eq!(classify_skill_type("random-repo", 49, false), SkillType::Collection);
    }

    #[test]
    fn project_bound_requires_name_match_and_low_count() {
        assert_eq!(classify_skill_type("my-internal-tool", 1, false), SkillType::ProjectBound);
        assert_eq!(classify_skill_type("unrelated-name", 1, false), SkillType::Standalone);
    }

    #[test]
    fn fork_marketplace_upgrades_to_aggregator() {
        assert_eq!(classify_skill_type("anything", 1, true), SkillType::Aggregator);
    }

    #[test]
    fn fork_marketplace_detection_requires_both_thresholds() {
        let skills: Vec<(&str, &str, bool)> = (0..25).map(|i| (if i % 3 == 0 { "alice" } else if i % 3 == 1 { "bob" } else { "carol" }, "shared-repo", false)).collect();
        let names = fork_marketplace_repo_names(skills);
        assert!(names.contains("shared-repo"));

        let too_few_owners: Vec<(&str, &str, bool)> = (0..25).map(|_| ("alice", "shared-repo", false)).collect();
        let names = fork_marketplace_repo_names(too_few_owners);
        assert!(!names.contains("shared-repo"));
    }

    #[test]
    fn canonical_ranked_by_stars_then_created_at() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let candidates = vec![
            DedupeCandidate { id: "a/1".into(), content_hash: "h1".into(), github_stars: 10, created_at: newer },
            DedupeCandidate { id: "b/1".into(), content_hash: "h1".into(), github_stars: 10, created_at: older },
            DedupeCandidate { id: "c/1".into(), content_hash: "h2".into(), github_stars: 1, created_at: older },
        ];

        let verdicts = assign_canonical(&candidates);
        assert!(!verdicts["b/1"].is_duplicate);
        assert!(verdicts["a/1"].is_duplicate);
        assert_eq!(verdicts["a/1"].canonical_skill_id.as_deref(), Some("b/1"));
        assert!(!verdicts["c/1"].is_duplicate);
    }

    #[test]
    fn dedup_is_idempotent() {
        let candidates = vec![
            DedupeCandidate {
                id: "a/1".into(),
                content_hash: "h1".into(),
                github_stars: 5,
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
        ];
        assert_eq!(assign_canonical(&candidates), assign_canonical(&candidates));
    }

    #[test]
    fn categories_match_case_insensitively() {
        let categories = match_categories("Deploys via Kubectl and Helm charts");
        assert!(categories.contains(&"kubernetes"));
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("world"));
    }
}
