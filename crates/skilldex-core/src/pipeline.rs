//! Per-candidate pipeline: fetch → parse → security → quality, producing a
//! freshly-minted `SkillRecord` ready for the classifier batch phase and
//! catalog upsert (spec.md §2 dataflow).

use chrono::Utc;
use tracing::instrument;

use crate::candidate_fetcher::fetch_candidate;
use crate::classifier::content_hash;
use crate::errors::{FetchError, ParseError};
use crate::github_client::{CodeHostClient, RepoMetadata};
use crate::parser::{self, SynthesisContext};
use crate::quality::{self, QualityInputs};
use crate::security;
use crate::types::{build_skill_id, Candidate, QualityDetails, SecurityStatus, SkillRecord, SkillType};

/// Why a candidate produced no record. Both are expected, routine outcomes,
/// not pipeline bugs — the caller logs and moves on.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("candidate fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("candidate parse failed: {0}")]
    Parse(#[from] ParseError),
}

/// Runs one candidate through the full per-skill pipeline.
#[instrument(skip(client, repo_metadata), fields(owner = %candidate.owner, repo = %candidate.repo, path = %candidate.path))]
pub async fn run(
    client: &dyn CodeHostClient,
    candidate: Candidate,
    repo_metadata: &RepoMetadata,
) -> Result<SkillRecord, PipelineError> {
    let fetched = fetch_candidate(client, candidate).await?;

    let (owner, repo) = (fetched.candidate.owner.clone(), fetched.candidate.repo.clone());
    let ctx = SynthesisContext {
        repo_name: &repo,
        repo_owner: &owner,
        repo_description: repo_metadata.description.as_deref(),
    };

    let parsed = parser::parse(fetched.candidate.format, &fetched.raw_content, &ctx)?;
    let error_count = parsed.warnings.len() as u32;
    let is_valid = error_count == 0;

    let scripts: Vec<(&str, &str)> = fetched
        .cached_files
        .iter()
        .filter(|(path, _)| path.contains("scripts/"))
        .map(|(path, content)| (path.as_str(), content.as_str()))
        .collect();
    let security_report = security::scan(&parsed.body, scripts.iter().copied());

    let has_scripts = fetched.cached_files.keys().any(|p| p.contains("scripts/"));
    let has_references = fetched.cached_files.keys().any(|p| p.contains("references/"));
    let days_since_push = (Utc::now() - repo_metadata.pushed_at).num_days();

    let quality_inputs = QualityInputs {
        description: &parsed.description,
        body: &parsed.body,
        version: parsed.version.as_deref(),
        license: parsed.license.as_deref(),
        compatibility_platforms: &parsed.compatibility.platforms,
        has_scripts,
        has_references,
        days_since_push,
        topics: &repo_metadata.topics,
        forks: repo_metadata.forks_count,
        stars: repo_metadata.stargazers_count,
        security_score: security_report.score,
        is_valid,
        error_count,
    };
    let (quality_score, quality_details): (f64, QualityDetails) = quality::score(&quality_inputs);

    let id = build_skill_id(&owner, &repo, &parsed.name, fetched.candidate.format);
    let now = Utc::now();

    Ok(SkillRecord {
        id,
        name: parsed.name,
        description: parsed.description,
        owner,
        repo,
        skill_path: fetched.candidate.path.clone(),
        branch: fetched.candidate.branch.clone(),
        source_format: fetched.candidate.format,
        version: parsed.version,
        license: parsed.license,
        author: parsed.author,
        homepage: parsed.homepage,
        compatibility: parsed.compatibility,
        triggers: parsed.triggers,

        github_stars: repo_metadata.stargazers_count,
        github_forks: repo_metadata.forks_count,

        security_score: security_report.score,
        security_status: security_report.status,
        security_findings: security_report.findings,

        quality_score,
        quality_details,

        content_hash: content_hash(&fetched.raw_content),
        raw_content: fetched.raw_content,
        cached_files: fetched.cached_files,

        // Assigned by the classifier batch phase (spec.md §4.7); defaults
        // here hold until that pass runs.
        skill_type: SkillType::Standalone,
        repo_skill_count: 1,
        is_duplicate: false,
        canonical_skill_id: None,

        is_blocked: false,
        is_verified: false,
        is_featured: false,

        indexed_at: now,
        updated_at: now,
    })
}

/// Is this security status one the catalog should still surface, or should
/// ingestion treat it as effectively blocked? Kept separate from the
/// `is_blocked` operator flag — a `fail` record is still written and
/// browsable per §4.5, it is merely flagged.
pub fn should_feature(status: SecurityStatus, quality_score: f64) -> bool {
    matches!(status, SecurityStatus::Pass) && quality_score >= 80.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    use crate::errors::ClientResult;
    use crate::formats::SourceFormat;
    use crate::github_client::{BranchRef, CodeSearchHit, CommitRef, SearchResponse, TreeEntry, TreeResponse};

    mock! {
        Client {}

        #[async_trait::async_trait]
        impl CodeHostClient for Client {
            async fn get_repo(&self, owner: &str, repo: &str) -> ClientResult<RepoMetadata>;
            async fn get_file_content(&self, owner: &str, repo: &str, path: &str, branch: &str) -> ClientResult<String>;
            async fn get_tree(&self, owner: &str, repo: &str, branch: &str, recursive: bool) -> ClientResult<TreeResponse>;
            async fn list_directory(&self, owner: &str, repo: &str, path: &str, branch: &str) -> ClientResult<Vec<TreeEntry>>;
            async fn list_branches(&self, owner: &str, repo: &str, page: u32) -> ClientResult<Vec<BranchRef>>;
            async fn search_code(&self, query: &str, page: u32) -> ClientResult<SearchResponse<CodeSearchHit>>;
            async fn search_repos(&self, query: &str, page: u32) -> ClientResult<SearchResponse<RepoMetadata>>;
            async fn search_commits(&self, query: &str, page: u32) -> ClientResult<SearchResponse<CommitRef>>;
        }
    }

    fn repo_metadata(description: Option<&str>) -> RepoMetadata {
        RepoMetadata {
            full_name: "owner/repo".to_string(),
            default_branch: "main".to_string(),
            stargazers_count: 10,
            forks_count: 1,
            archived: false,
            topics: Vec::new(),
            description: description.map(str::to_string),
            license: None,
            pushed_at: Utc::now(),
        }
    }

    #[test]
    fn should_feature_requires_pass_and_high_quality() {
        assert!(should_feature(SecurityStatus::Pass, 85.0));
        assert!(!should_feature(SecurityStatus::Pass, 50.0));
        assert!(!should_feature(SecurityStatus::Warning, 95.0));
    }

    /// Scenario 1 (spec's seed suite): a single `skill.md` with frontmatter
    /// name/description and no sibling scripts.
    #[tokio::test]
    async fn single_skill_md_produces_a_standalone_record() {
        let mut client = MockClient::new();
        client.expect_get_file_content().returning(|_, _, path, _| {
            assert_eq!(path, "skills/hello/SKILL.md");
            Ok("---\nname: hello\ndescription: \"A small example that demonstrates the parser\"\n---\nDo the thing.\n".to_string())
        });
        client.expect_list_directory().returning(|_, _, _, _| Err(crate::errors::ClientError::NotFound));

        let candidate = Candidate {
            owner: "alice".to_string(),
            repo: "demo".to_string(),
            path: "skills/hello".to_string(),
            branch: "main".to_string(),
            format: SourceFormat::SkillMd,
        };
        let metadata = repo_metadata(None);

        let record = run(&client, candidate, &metadata).await.unwrap();
        assert_eq!(record.id, "alice/demo/hello");
        assert_eq!(record.source_format, SourceFormat::SkillMd);
        assert_eq!(record.security_status, SecurityStatus::Pass);
        assert_eq!(record.skill_type, SkillType::Standalone);
        assert_eq!(record.repo_skill_count, 1);
    }

    /// Scenario 3: a root `.cursorrules` file with no frontmatter, relying
    /// on the repo description and owner for synthesized fields.
    #[tokio::test]
    async fn cursorrules_at_root_synthesizes_metadata_from_the_repo() {
        let mut client = MockClient::new();
        let body = "x".repeat(400);
        client.expect_get_file_content().returning(move |_, _, path, _| {
            assert_eq!(path, ".cursorrules");
            Ok(body.clone())
        });

        let candidate = Candidate {
            owner: "carol".to_string(),
            repo: "app".to_string(),
            path: ".".to_string(),
            branch: "main".to_string(),
            format: SourceFormat::Cursorrules,
        };
        let metadata = repo_metadata(Some("Cursor rules for Next.js"));

        let record = run(&client, candidate, &metadata).await.unwrap();
        assert_eq!(record.id, "carol/app/app~cursorrules");
        assert_eq!(record.compatibility.platforms, vec!["cursor".to_string()]);
        assert_eq!(record.description, "Cursor rules for Next.js");
        assert_eq!(record.author.as_deref(), Some("carol"));
    }
}
