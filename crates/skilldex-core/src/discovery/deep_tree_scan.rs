//! Strategy (e): deep-tree scan. For a repository already in the
//! discovered-repo table (or an explicit seed), walk its tree on a bounded
//! set of branches and emit a candidate for every blob matching an
//! instruction-file pattern.
//!
//! Unlike the other four strategies this one does not implement [`Discover`]
//! directly — it needs per-repo state (the discovered-repo row) rather than
//! running once over the whole corpus, so the job worker drives it one
//! repository at a time (spec.md §4.9, `deep-scan(owner, repo)`).

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::errors::{ClientError, DiscoveryResult};
use crate::formats::SourceFormat;
use crate::github_client::{CodeHostClient, RepoMetadata, TreeEntry};
use crate::types::Candidate;

/// Branch roots always scanned by name, per spec.md §4.2(e).2.
const WELL_KNOWN_BRANCHES: [&str; 6] = ["stable", "next", "latest", "canary", "dev", "develop"];

/// Directory roots consulted when a branch's tree is truncated.
const WELL_KNOWN_SKILL_ROOTS: [&str; 5] =
    ["skills", ".claude/skills", ".github/skills", ".codex/skills", "."];

/// Cap on non-default branches scanned per repo, unless `all_branches` mode
/// is requested.
const MAX_NON_DEFAULT_BRANCHES: usize = 5;

/// Cap on version-style branches included among the selected set.
const MAX_VERSION_BRANCHES: usize = 5;

/// A caller-provided extra branch selector (spec.md §4.2(e).5).
#[derive(Debug, Clone)]
pub enum BranchPattern {
    Exact(String),
    Prefix(String),
}

impl BranchPattern {
    fn matches(&self, branch: &str) -> bool {
        match self {
            BranchPattern::Exact(name) => branch == name,
            BranchPattern::Prefix(prefix) => branch.starts_with(prefix.as_str()),
        }
    }
}

/// Selects and orders the branches to scan for one repository.
///
/// A pure, deterministic function of its inputs (spec.md §8's testable
/// property): starts with `default_branch`, contains only entries from
/// `branches`, and has at most 6 entries total unless `all_branches` is set.
pub fn filter_and_sort_branches(
    branches: &[String],
    default_branch: &str,
    extras: &[BranchPattern],
    all_branches: bool,
) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<String> = Vec::new();

    if branches.iter().any(|b| b == default_branch) && seen.insert(default_branch) {
        ordered.push(default_branch.to_string());
    }

    let mut non_default: Vec<String> = Vec::new();

    // 2. exact well-known names, in the fixed table order.
    for name in WELL_KNOWN_BRANCHES {
        if let Some(branch) = branches.iter().find(|b| b.as_str() == name) {
            if seen.insert(branch.as_str()) {
                non_default.push(branch.clone());
            }
        }
    }

    // 3. release/releases prefixed branches, in appearance order.
    for branch in branches {
        if (branch.starts_with("release/") || branch.starts_with("releases/")) && seen.insert(branch) {
            non_default.push(branch.clone());
        }
    }

    // 4. up to five version-style branches, descending by semantic value.
    let mut version_branches: Vec<(&String, Vec<u64>)> = branches
        .iter()
        .filter(|b| !seen.contains(b.as_str()))
        .filter_map(|b| version_value(b).map(|v| (b, v)))
        .collect();
    version_branches.sort_by(|a, b| b.1.cmp(&a.1));
    for (branch, _) in version_branches.into_iter().take(MAX_VERSION_BRANCHES) {
        if seen.insert(branch.as_str()) {
            non_default.push(branch.clone());
        }
    }

    // 5. caller-provided extra patterns.
    for branch in branches {
        if seen.contains(branch.as_str()) {
            continue;
        }
        if extras.iter().any(|p| p.matches(branch)) {
            seen.insert(branch.as_str());
            non_default.push(branch.clone());
        }
    }

    if !all_branches {
        non_default.truncate(MAX_NON_DEFAULT_BRANCHES);
    }

    ordered.extend(non_default);
    ordered
}

/// Parses `^[vV]\d...` branch names into a comparable numeric-segment
/// vector, splitting on `.`, `-`, and `x` per spec.md §4.2(e).4.
fn version_value(branch: &str) -> Option<Vec<u64>> {
    let mut chars = branch.chars();
    match chars.next() {
        Some('v') | Some('V') => {}
        _ => return None,
    }
    let rest: String = chars.collect();
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let segments: Vec<u64> = rest
        .split(['.', '-', 'x', 'X'])
        .map(|segment| segment.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
        .map(|digits| digits.parse().unwrap_or(0))
        .collect();
    Some(segments)
}

/// Candidates and metadata learned while scanning one repository.
#[derive(Debug, Default)]
pub struct DeepScanOutput {
    pub candidates: Vec<Candidate>,
    pub default_branch: String,
    pub is_archived: bool,
}

/// Strategy (e) from spec.md §4.2.
pub struct DeepTreeScan {
    extra_branch_patterns: Vec<BranchPattern>,
    all_branches: bool,
}

impl DeepTreeScan {
    pub fn new(extra_branch_patterns: Vec<BranchPattern>, all_branches: bool) -> Self {
        Self { extra_branch_patterns, all_branches }
    }

    /// Scans `owner/repo`, returning every instruction-file candidate found
    /// across the selected branches. Archived repositories are skipped
    /// (empty output, `is_archived = true`).
    pub async fn scan(
        &self,
        client: &dyn CodeHostClient,
        owner: &str,
        repo: &str,
    ) -> DiscoveryResult<DeepScanOutput> {
        let metadata: RepoMetadata = client.get_repo(owner, repo).await?;
        if metadata.archived {
            return Ok(DeepScanOutput {
                default_branch: metadata.default_branch,
                is_archived: true,
                ..Default::default()
            });
        }

        let branches = self.list_all_branches(client, owner, repo).await?;
        let selected = filter_and_sort_branches(
            &branches,
            &metadata.default_branch,
            &self.extra_branch_patterns,
            self.all_branches,
        );

        let mut seen_paths: HashSet<(String, SourceFormat)> = HashSet::new();
        let mut candidates = Vec::new();

        // Branches are scanned sequentially (not concurrently) so that the
        // deduper can deterministically prefer the default-branch variant
        // (spec.md §5, "Ordering guarantees").
        for branch in &selected {
            let entries = self.tree_for_branch(client, owner, repo, branch).await?;
            for entry in entries {
                let Some(format) = SourceFormat::from_path(&entry) else {
                    continue;
                };
                let key = (entry.clone(), format);
                if !seen_paths.insert(key) {
                    continue;
                }
                candidates.push(Candidate {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    path: path_for_entry(&entry, format),
                    branch: branch.clone(),
                    format,
                });
            }
        }

        Ok(DeepScanOutput {
            candidates,
            default_branch: metadata.default_branch,
            is_archived: false,
        })
    }

    async fn list_all_branches(
        &self,
        client: &dyn CodeHostClient,
        owner: &str,
        repo: &str,
    ) -> DiscoveryResult<Vec<String>> {
        let mut branches = Vec::new();
        let mut page = 1;
        loop {
            let batch = client.list_branches(owner, repo, page).await?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();
            branches.extend(batch.into_iter().map(|b| b.name));
            if batch_len < 100 || (!self.all_branches && page >= 3) {
                break;
            }
            page += 1;
        }
        Ok(branches)
    }

    /// Returns every blob path on `branch`, falling back to a
    /// directory-by-directory walk of well-known roots when the recursive
    /// tree response is truncated (spec.md §4.2(e), "truncated").
    async fn tree_for_branch(
        &self,
        client: &dyn CodeHostClient,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> DiscoveryResult<Vec<String>> {
        let tree = match client.get_tree(owner, repo, branch, true).await {
            Ok(tree) => tree,
            Err(ClientError::NotFound) => {
                debug!(owner, repo, branch, "branch tree not found, skipping");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        if !tree.truncated {
            return Ok(tree
                .tree
                .into_iter()
                .filter(|e| e.entry_type == "blob")
                .map(|e| e.path)
                .collect());
        }

        warn!(owner, repo, branch, "tree truncated, falling back to directory listing");
        let mut paths = Vec::new();
        for root in WELL_KNOWN_SKILL_ROOTS {
            let listing = match client.list_directory(owner, repo, root, branch).await {
                Ok(listing) => listing,
                Err(ClientError::NotFound) => continue,
                Err(err) => return Err(err.into()),
            };
            paths.extend(listing.into_iter().filter(|e| e.entry_type == "blob").map(|e| e.path));
        }
        for format in SourceFormat::ALL {
            if format.is_root_only() {
                paths.push(format.filename().to_string());
            }
        }
        Ok(paths)
    }
}

/// A matched tree path becomes a candidate's containing directory for
/// `anywhere`/`under-prefix` formats, or `"."` for root-only formats.
fn path_for_entry(path: &str, format: SourceFormat) -> String {
    if format.is_root_only() {
        return ".".to_string();
    }
    match path.rsplit_once('/') {
        Some((dir, _filename)) => dir.to_string(),
        None => ".".to_string(),
    }
}

/// A single tree/listing entry as returned to callers, re-exported for
/// convenience when constructing test fixtures.
pub type ScanTreeEntry = TreeEntry;

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn always_starts_with_default() {
        let branches = strs(&["main", "dev", "v1.0", "v2.0"]);
        let selected = filter_and_sort_branches(&branches, "main", &[], false);
        assert_eq!(selected.first(), Some(&"main".to_string()));
    }

    #[test]
    fn caps_at_six_entries_total() {
        let branches = strs(&[
            "main", "stable", "next", "latest", "canary", "dev", "develop", "release/1.0", "v9.0",
        ]);
        let selected = filter_and_sort_branches(&branches, "main", &[], false);
        assert!(selected.len() <= 6);
        assert_eq!(selected[0], "main");
    }

    #[test]
    fn only_contains_entries_from_input() {
        let branches = strs(&["main", "dev", "v1.2.0"]);
        let selected = filter_and_sort_branches(&branches, "main", &[], false);
        assert!(selected.iter().all(|b| branches.contains(b)));
    }

    #[test]
    fn is_deterministic() {
        let branches = strs(&["main", "dev", "v1.2.0", "v2.0.0", "release/3.0"]);
        let once = filter_and_sort_branches(&branches, "main", &[], false);
        let twice = filter_and_sort_branches(&branches, "main", &[], false);
        assert_eq!(once, twice);
    }

    #[test]
    fn version_branches_sort_descending() {
        let branches = strs(&["main", "v1.0.0", "v10.0.0", "v2.5.0"]);
        let selected = filter_and_sort_branches(&branches, "main", &[], false);
        assert_eq!(selected, strs(&["main", "v10.0.0", "v2.5.0", "v1.0.0"]));
    }

    #[test]
    fn all_branches_mode_lifts_the_cap() {
        let branches = strs(&[
            "main", "stable", "next", "latest", "canary", "dev", "develop", "release/1.0", "v9.0",
        ]);
        let selected = filter_and_sort_branches(&branches, "main", &[], true);
        assert!(selected.len() > 6);
    }

    #[test]
    fn extras_match_exact_and_prefix() {
        let branches = strs(&["main", "feature/x", "feature/y", "unrelated"]);
        let extras = vec![BranchPattern::Prefix("feature/".to_string())];
        let selected = filter_and_sort_branches(&branches, "main", &extras, false);
        assert!(selected.contains(&"feature/x".to_string()));
        assert!(selected.contains(&"feature/y".to_string()));
        assert!(!selected.contains(&"unrelated".to_string()));
    }

    #[test]
    fn path_for_entry_strips_filename_except_root_only() {
        assert_eq!(path_for_entry("skills/hello/SKILL.md", SourceFormat::SkillMd), "skills/hello");
        assert_eq!(path_for_entry(".cursorrules", SourceFormat::Cursorrules), ".");
    }
}
