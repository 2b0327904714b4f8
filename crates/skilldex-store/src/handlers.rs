//! Concrete `JobHandler` impls wiring `skilldex-core`'s discovery/pipeline/
//! classifier onto this crate's catalog, search, cache, and notifier
//! (spec.md §4.9's job kinds, generalized from the teacher's
//! skill-execution `JobHandler` pattern).

use std::sync::Arc;

use async_trait::async_trait;
use skilldex_core::classifier::{self, DedupeCandidate};
use skilldex_core::discovery::{DeepTreeScan, DiscoveryOrchestrator};
use skilldex_core::github_client::CodeHostClient;
use skilldex_core::jobs::{Job, JobError, JobHandler, JobQueue, JobType, MaintenanceTask, WorkerContext};
use skilldex_core::pipeline;
use skilldex_core::types::SkillType;
use tracing::{info, warn};

use crate::catalog::{CatalogStore, ClassificationUpdate};
use crate::cache::{cache_keys_for, CacheInvalidator};
use crate::notifier::{ClaimIndexedEvent, NotifierSink};
use crate::search_index::SearchIndexClient;

/// `index-skill(candidate)`: runs the per-candidate pipeline and upserts
/// the result, firing the search/cache/notifier side effects on a
/// successful write.
pub struct IndexSkillHandler {
    pub client: Arc<dyn CodeHostClient>,
    pub catalog: Arc<dyn CatalogStore>,
    pub search: Arc<dyn SearchIndexClient>,
    pub cache: Arc<dyn CacheInvalidator>,
    pub notifier: Arc<dyn NotifierSink>,
}

#[async_trait]
impl JobHandler for IndexSkillHandler {
    async fn handle(&self, job: &Job, ctx: &WorkerContext) -> Result<serde_json::Value, JobError> {
        let JobType::IndexSkill { candidate } = job.job_type.clone() else {
            return Err(JobError::InvalidJobType("expected index_skill".into()));
        };

        ctx.report_progress(job.id, 10, "fetching repository metadata").await;
        let repo_metadata = self
            .client
            .get_repo(&candidate.owner, &candidate.repo)
            .await
            .map_err(|e| JobError::Handler(e.into()))?;

        ctx.report_progress(job.id, 30, "running pipeline").await;
        let record = match pipeline::run(self.client.as_ref(), candidate, &repo_metadata).await {
            Ok(record) => record,
            Err(pipeline::PipelineError::Fetch(_)) => {
                // 404 / not-found candidate: skip silently (spec.md §7).
                return Ok(serde_json::json!({ "skipped": true }));
            }
            Err(err) => return Err(JobError::Handler(err.into())),
        };

        ctx.report_progress(job.id, 70, "upserting catalog record").await;
        let outcome = self
            .catalog
            .upsert(&record, false)
            .await
            .map_err(|e| JobError::Handler(e.into()))?;

        if !matches!(outcome, crate::catalog::UpsertOutcome::Written) {
            return Ok(serde_json::json!({ "id": record.id, "outcome": "unchanged" }));
        }

        let categories = classifier::match_categories(&format!(
            "{} {} {}",
            record.name,
            record.description,
            record.triggers.keywords.join(" ")
        ));
        if let Err(err) = self.catalog.write_categories(&record.id, &categories).await {
            warn!(skill_id = %record.id, error = %err, "failed to write category join rows");
        }

        let doc = crate::catalog::search_fields(&record);
        if let Err(err) = self.search.upsert(doc).await {
            warn!(skill_id = %record.id, error = %err, "search-index upsert failed");
        }

        let keys = cache_keys_for(&record, &categories);
        if let Err(err) = self.cache.invalidate(keys).await {
            warn!(skill_id = %record.id, error = %err, "cache invalidation failed");
        }

        if let Ok(pending) = self.catalog.pending_add_requests().await {
            if let Some(request) = pending
                .iter()
                .find(|r| r.owner == record.owner && r.repo == record.repo)
            {
                let event = ClaimIndexedEvent {
                    user_email: request.user_email.clone(),
                    locale: request.locale.clone(),
                    skill_id: record.id.clone(),
                    skill_name: record.name.clone(),
                    repository_url: format!("https://github.com/{}/{}", record.owner, record.repo),
                };
                if let Err(err) = self.notifier.notify(event).await {
                    warn!(request_id = %request.id, error = %err, "notifier failed");
                }
            }
        }

        ctx.report_progress(job.id, 100, "done").await;
        Ok(serde_json::json!({ "id": record.id, "outcome": "written" }))
    }

    fn can_handle(&self, job_type: &JobType) -> bool {
        matches!(job_type, JobType::IndexSkill { .. })
    }

    fn name(&self) -> &str {
        "index_skill"
    }
}

/// `deep-scan(owner, repo)`: walks one repository's branches/trees and
/// enqueues an `index-skill` job per candidate found.
pub struct DeepScanHandler {
    pub client: Arc<dyn CodeHostClient>,
    pub queue: Arc<JobQueue>,
}

#[async_trait]
impl JobHandler for DeepScanHandler {
    async fn handle(&self, job: &Job, ctx: &WorkerContext) -> Result<serde_json::Value, JobError> {
        let JobType::DeepScan { owner, repo } = job.job_type.clone() else {
            return Err(JobError::InvalidJobType("expected deep_scan".into()));
        };

        ctx.report_progress(job.id, 10, "scanning branches").await;
        let scan = DeepTreeScan::new(Vec::new(), false);
        let output = scan
            .scan(self.client.as_ref(), &owner, &repo)
            .await
            .map_err(|e| JobError::Handler(e.into()))?;

        if output.is_archived {
            return Ok(serde_json::json!({ "archived": true }));
        }

        let count = output.candidates.len();
        for candidate in output.candidates {
            self.queue
                .enqueue(Job::index_skill(candidate))
                .await
                .map_err(|e| JobError::Handler(e.into()))?;
        }

        ctx.report_progress(job.id, 100, "done").await;
        Ok(serde_json::json!({ "owner": owner, "repo": repo, "candidates_found": count }))
    }

    fn can_handle(&self, job_type: &JobType) -> bool {
        matches!(job_type, JobType::DeepScan { .. })
    }

    fn name(&self) -> &str {
        "deep_scan"
    }
}

/// `full-crawl`: runs discovery strategies (a)-(d), enqueues `index-skill`
/// for any directly-discovered candidates and `deep-scan` for every
/// newly-discovered repository.
pub struct FullCrawlHandler {
    pub client: Arc<dyn CodeHostClient>,
    pub min_stars: u64,
    pub queue: Arc<JobQueue>,
}

#[async_trait]
impl JobHandler for FullCrawlHandler {
    async fn handle(&self, job: &Job, ctx: &WorkerContext) -> Result<serde_json::Value, JobError> {
        if !matches!(job.job_type, JobType::FullCrawl) {
            return Err(JobError::InvalidJobType("expected full_crawl".into()));
        }

        ctx.report_progress(job.id, 10, "running discovery strategies").await;
        let orchestrator = DiscoveryOrchestrator::full_crawl(self.client.clone(), self.min_stars);
        let output = orchestrator.run(self.client.as_ref()).await;

        let (candidates, repos) = (output.candidates.len(), output.repos.len());
        for candidate in output.candidates {
            self.queue
                .enqueue(Job::index_skill(candidate))
                .await
                .map_err(|e| JobError::Handler(e.into()))?;
        }
        for repo in output.repos {
            self.queue
                .enqueue(Job::deep_scan(repo.owner, repo.repo))
                .await
                .map_err(|e| JobError::Handler(e.into()))?;
        }

        info!(candidates, repos, "full crawl enqueued follow-up jobs");
        ctx.report_progress(job.id, 100, "done").await;
        Ok(serde_json::json!({ "candidates_enqueued": candidates, "repos_enqueued": repos }))
    }

    fn can_handle(&self, job_type: &JobType) -> bool {
        matches!(job_type, JobType::FullCrawl)
    }

    fn name(&self) -> &str {
        "full_crawl"
    }
}

/// `incremental-crawl(window_days)`: strategies (a) and (d) only, over a
/// narrower recency window.
pub struct IncrementalCrawlHandler {
    pub client: Arc<dyn CodeHostClient>,
    pub queue: Arc<JobQueue>,
}

#[async_trait]
impl JobHandler for IncrementalCrawlHandler {
    async fn handle(&self, job: &Job, ctx: &WorkerContext) -> Result<serde_json::Value, JobError> {
        let JobType::IncrementalCrawl { window_days } = job.job_type else {
            return Err(JobError::InvalidJobType("expected incremental_crawl".into()));
        };

        ctx.report_progress(job.id, 10, "running narrow-window discovery").await;
        let orchestrator = DiscoveryOrchestrator::incremental_crawl(window_days);
        let output = orchestrator.run(self.client.as_ref()).await;

        let (candidates, repos) = (output.candidates.len(), output.repos.len());
        for candidate in output.candidates {
            self.queue
                .enqueue(Job::index_skill(candidate))
                .await
                .map_err(|e| JobError::Handler(e.into()))?;
        }
        for repo in output.repos {
            self.queue
                .enqueue(Job::deep_scan(repo.owner, repo.repo))
                .await
                .map_err(|e| JobError::Handler(e.into()))?;
        }

        ctx.report_progress(job.id, 100, "done").await;
        Ok(serde_json::json!({ "candidates_enqueued": candidates, "repos_enqueued": repos }))
    }

    fn can_handle(&self, job_type: &JobType) -> bool {
        matches!(job_type, JobType::IncrementalCrawl { .. })
    }

    fn name(&self) -> &str {
        "incremental_crawl"
    }
}

/// `score-batch`: the classifier/deduper batch phase (spec.md §4.7), run
/// over a full catalog snapshot.
pub struct ScoreBatchHandler {
    pub catalog: Arc<dyn CatalogStore>,
}

#[async_trait]
impl JobHandler for ScoreBatchHandler {
    async fn handle(&self, job: &Job, ctx: &WorkerContext) -> Result<serde_json::Value, JobError> {
        if !matches!(job.job_type, JobType::ScoreBatch) {
            return Err(JobError::InvalidJobType("expected score_batch".into()));
        }

        ctx.report_progress(job.id, 10, "reading catalog snapshot").await;
        let records = self
            .catalog
            .all_non_blocked()
            .await
            .map_err(|e| JobError::Handler(e.into()))?;

        ctx.report_progress(job.id, 40, "classifying").await;
        let repo_counts = classifier::repo_skill_counts(
            records.iter().map(|r| (r.owner.as_str(), r.repo.as_str(), false)),
        );
        let fork_marketplaces = classifier::fork_marketplace_repo_names(
            records.iter().map(|r| (r.owner.as_str(), r.repo.as_str(), false)),
        );

        let dedupe_candidates: Vec<DedupeCandidate> = records
            .iter()
            .map(|r| DedupeCandidate {
                id: r.id.clone(),
                content_hash: r.content_hash.clone(),
                github_stars: r.github_stars,
                created_at: r.indexed_at,
            })
            .collect();
        let verdicts = classifier::assign_canonical(&dedupe_candidates);

        let mut updates = Vec::with_capacity(records.len());
        for record in &records {
            let count = repo_counts
                .get(&(record.owner.clone(), record.repo.clone()))
                .copied()
                .unwrap_or(1);
            let is_fork_marketplace = fork_marketplaces.contains(&record.repo);
            let skill_type: SkillType =
                classifier::classify_skill_type(&record.repo, count, is_fork_marketplace);
            let verdict = verdicts.get(&record.id).cloned().unwrap_or(
                skilldex_core::classifier::DedupeVerdict { is_duplicate: false, canonical_skill_id: None },
            );

            updates.push(ClassificationUpdate {
                id: record.id.clone(),
                skill_type,
                repo_skill_count: count,
                is_duplicate: verdict.is_duplicate,
                canonical_skill_id: verdict.canonical_skill_id,
            });
        }

        ctx.report_progress(job.id, 70, "writing verdicts").await;
        self.catalog
            .apply_classification(&updates)
            .await
            .map_err(|e| JobError::Handler(e.into()))?;

        ctx.report_progress(job.id, 85, "writing category joins").await;
        for record in &records {
            let categories = classifier::match_categories(&format!(
                "{} {} {}",
                record.name,
                record.description,
                record.triggers.keywords.join(" ")
            ));
            if let Err(err) = self.catalog.write_categories(&record.id, &categories).await {
                warn!(skill_id = %record.id, error = %err, "failed to write category join rows");
            }
        }

        ctx.report_progress(job.id, 100, "done").await;
        Ok(serde_json::json!({ "classified": updates.len() }))
    }

    fn can_handle(&self, job_type: &JobType) -> bool {
        matches!(job_type, JobType::ScoreBatch)
    }

    fn name(&self) -> &str {
        "score_batch"
    }
}

/// `maintenance(task)`: queue housekeeping, delegated to the job queue's
/// own storage-backed operations.
pub struct MaintenanceHandler {
    pub queue: Arc<JobQueue>,
}

#[async_trait]
impl JobHandler for MaintenanceHandler {
    async fn handle(&self, job: &Job, ctx: &WorkerContext) -> Result<serde_json::Value, JobError> {
        let JobType::Maintenance { task } = job.job_type.clone() else {
            return Err(JobError::InvalidJobType("expected maintenance".into()));
        };

        ctx.report_progress(job.id, 20, "running maintenance task").await;
        let outcome = match task {
            MaintenanceTask::CleanupCompletedJobs { .. } | MaintenanceTask::CleanupDeadJobs => {
                let removed = self.queue.cleanup().await.map_err(|e| JobError::Handler(e.into()))?;
                serde_json::json!({ "removed": removed })
            }
            MaintenanceTask::RequeueOrphaned => {
                let requeued = self.queue.recover_orphans().await.map_err(|e| JobError::Handler(e.into()))?;
                serde_json::json!({ "requeued": requeued })
            }
            MaintenanceTask::VacuumDatabase => {
                // SQLite-only; the `JobStorage` trait has no vacuum hook for
                // other backends, so this is a no-op elsewhere.
                warn!("vacuum requested but not supported by the active storage backend");
                serde_json::json!({ "vacuumed": false })
            }
        };

        ctx.report_progress(job.id, 100, "done").await;
        Ok(outcome)
    }

    fn can_handle(&self, job_type: &JobType) -> bool {
        matches!(job_type, JobType::Maintenance { .. })
    }

    fn name(&self) -> &str {
        "maintenance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::Utc;
    use mockall::mock;
    use skilldex_core::errors::{ClientError, ClientResult};
    use skilldex_core::formats::SourceFormat;
    use skilldex_core::github_client::{
        BranchRef, CodeSearchHit, CommitRef, RepoMetadata, SearchResponse, TreeEntry, TreeResponse,
    };
    use skilldex_core::jobs::JobConfig;
    use skilldex_core::types::{
        AddRequest, Candidate, Compatibility, QualityDetails, RemovalRequest, SecurityStatus, SkillRecord, Triggers,
    };
    use crate::catalog::{CatalogStore as CatalogStoreTrait, ClassificationUpdate, RemovalResolution, UpsertOutcome};
    use crate::cache::CacheInvalidator as CacheInvalidatorTrait;
    use crate::errors::CatalogError;
    use crate::notifier::{ClaimIndexedEvent, NotifierSink as NotifierSinkTrait};
    use crate::search_index::{SearchDocument, SearchIndexClient as SearchIndexClientTrait};

    mock! {
        Client {}

        #[async_trait]
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

    mock! {
        Catalog {}

        #[async_trait]
        impl CatalogStoreTrait for Catalog {
            async fn setup(&self) -> Result<(), CatalogError>;
            async fn upsert(&self, record: &SkillRecord, force: bool) -> Result<UpsertOutcome, CatalogError>;
            async fn block(&self, id: &str) -> Result<(), CatalogError>;
            async fn get(&self, id: &str) -> Result<Option<SkillRecord>, CatalogError>;
            async fn all_non_blocked(&self) -> Result<Vec<SkillRecord>, CatalogError>;
            async fn apply_classification(&self, updates: &[ClassificationUpdate]) -> Result<(), CatalogError>;
            async fn write_categories(&self, id: &str, categories: &[&str]) -> Result<(), CatalogError>;
            async fn pending_add_requests(&self) -> Result<Vec<AddRequest>, CatalogError>;
            async fn insert_removal_request(&self, request: &RemovalRequest) -> Result<(), CatalogError>;
            async fn resolve_removal_request(&self, id: uuid::Uuid, resolution: RemovalResolution) -> Result<(), CatalogError>;
        }
    }

    mock! {
        Search {}

        #[async_trait]
        impl SearchIndexClientTrait for Search {
            async fn upsert(&self, doc: SearchDocument) -> anyhow::Result<()>;
            async fn delete(&self, id: &str) -> anyhow::Result<()>;
        }
    }

    mock! {
        Cache {}

        #[async_trait]
        impl CacheInvalidatorTrait for Cache {
            async fn invalidate(&self, keys: Vec<String>) -> anyhow::Result<()>;
        }
    }

    mock! {
        Notifier {}

        #[async_trait]
        impl NotifierSinkTrait for Notifier {
            async fn notify(&self, event: ClaimIndexedEvent) -> anyhow::Result<()>;
        }
    }

    fn sample_record(id: &str, owner: &str, repo: &str) -> SkillRecord {
        SkillRecord {
            id: id.to_string(),
            name: "hello".to_string(),
            description: "says hello".to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            skill_path: "skills/hello/SKILL.md".to_string(),
            branch: "main".to_string(),
            source_format: SourceFormat::SkillMd,
            version: None,
            license: None,
            author: None,
            homepage: None,
            compatibility: Compatibility { platforms: vec!["claude-code".to_string()] },
            triggers: Triggers::default(),
            github_stars: 10,
            github_forks: 0,
            security_score: 1.0,
            security_status: SecurityStatus::Pass,
            security_findings: Vec::new(),
            quality_score: 0.8,
            quality_details: QualityDetails::default(),
            content_hash: "deadbeef".to_string(),
            raw_content: "---\nname: hello\n---\n".to_string(),
            cached_files: HashMap::new(),
            skill_type: SkillType::Standalone,
            repo_skill_count: 1,
            is_duplicate: false,
            canonical_skill_id: None,
            is_blocked: false,
            is_verified: false,
            is_featured: false,
            indexed_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn repo_metadata(archived: bool) -> RepoMetadata {
        RepoMetadata {
            full_name: "acme/widgets".to_string(),
            default_branch: "main".to_string(),
            stargazers_count: 10,
            forks_count: 0,
            archived,
            topics: Vec::new(),
            description: Some("widgets".to_string()),
            license: None,
            pushed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn index_skill_skips_silently_on_missing_instruction_file() {
        let mut client = MockClient::new();
        client.expect_get_repo().returning(|_, _| Ok(repo_metadata(false)));
        client.expect_get_file_content().returning(|_, _, _, _| Err(ClientError::NotFound));

        let handler = IndexSkillHandler {
            client: Arc::new(client),
            catalog: Arc::new(MockCatalog::new()),
            search: Arc::new(MockSearch::new()),
            cache: Arc::new(MockCache::new()),
            notifier: Arc::new(MockNotifier::new()),
        };

        let candidate = Candidate {
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            path: ".".to_string(),
            branch: "main".to_string(),
            format: SourceFormat::AgentsMd,
        };
        let job = Job::index_skill(candidate);
        let ctx = WorkerContext::for_handler_test("test-worker");

        let result = handler.handle(&job, &ctx).await.unwrap();
        assert_eq!(result["skipped"], true);
    }

    #[tokio::test]
    async fn index_skill_writes_search_and_cache_on_a_fresh_candidate() {
        let mut client = MockClient::new();
        client.expect_get_repo().returning(|_, _| Ok(repo_metadata(false)));
        client
            .expect_get_file_content()
            .returning(|_, _, _, _| Ok("# Agents\n\nDo this and that.\n".to_string()));

        let mut catalog = MockCatalog::new();
        catalog.expect_upsert().returning(|_, _| Ok(UpsertOutcome::Written));
        catalog.expect_write_categories().returning(|_, _| Ok(()));
        catalog.expect_pending_add_requests().returning(|| Ok(Vec::new()));

        let mut search = MockSearch::new();
        search.expect_upsert().returning(|_| Ok(()));

        let mut cache = MockCache::new();
        cache.expect_invalidate().returning(|_| Ok(()));

        let handler = IndexSkillHandler {
            client: Arc::new(client),
            catalog: Arc::new(catalog),
            search: Arc::new(search),
            cache: Arc::new(cache),
            notifier: Arc::new(MockNotifier::new()),
        };

        let candidate = Candidate {
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            path: ".".to_string(),
            branch: "main".to_string(),
            format: SourceFormat::AgentsMd,
        };
        let job = Job::index_skill(candidate);
        let ctx = WorkerContext::for_handler_test("test-worker");

        let result = handler.handle(&job, &ctx).await.unwrap();
        assert_eq!(result["outcome"], "written");
    }

    #[tokio::test]
    async fn index_skill_notifies_with_the_matched_add_requests_contact_info() {
        let mut client = MockClient::new();
        client.expect_get_repo().returning(|_, _| Ok(repo_metadata(false)));
        client
            .expect_get_file_content()
            .returning(|_, _, _, _| Ok("# Agents\n\nDo this and that.\n".to_string()));

        let mut catalog = MockCatalog::new();
        catalog.expect_upsert().returning(|_, _| Ok(UpsertOutcome::Written));
        catalog.expect_write_categories().returning(|_, _| Ok(()));
        catalog.expect_pending_add_requests().returning(|| {
            Ok(vec![AddRequest {
                id: uuid::Uuid::new_v4(),
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                path: None,
                user_email: "requester@example.com".to_string(),
                locale: "fr".to_string(),
                requested_at: Utc::now(),
            }])
        });

        let mut search = MockSearch::new();
        search.expect_upsert().returning(|_| Ok(()));

        let mut cache = MockCache::new();
        cache.expect_invalidate().returning(|_| Ok(()));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|event| event.user_email == "requester@example.com" && event.locale == "fr")
            .times(1)
            .returning(|_| Ok(()));

        let handler = IndexSkillHandler {
            client: Arc::new(client),
            catalog: Arc::new(catalog),
            search: Arc::new(search),
            cache: Arc::new(cache),
            notifier: Arc::new(notifier),
        };

        let candidate = Candidate {
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            path: ".".to_string(),
            branch: "main".to_string(),
            format: SourceFormat::AgentsMd,
        };
        let job = Job::index_skill(candidate);
        let ctx = WorkerContext::for_handler_test("test-worker");

        let result = handler.handle(&job, &ctx).await.unwrap();
        assert_eq!(result["outcome"], "written");
    }

    #[tokio::test]
    async fn deep_scan_reports_archived_repos_without_enqueueing() {
        let mut client = MockClient::new();
        client.expect_get_repo().returning(|_, _| Ok(repo_metadata(true)));

        let storage = skilldex_core::create_storage(&JobConfig::memory()).await.unwrap();
        let queue = Arc::new(JobQueue::new(storage, JobConfig::memory()));

        let handler = DeepScanHandler { client: Arc::new(client), queue };
        let job = Job::deep_scan("acme", "widgets");
        let ctx = WorkerContext::for_handler_test("test-worker");

        let result = handler.handle(&job, &ctx).await.unwrap();
        assert_eq!(result["archived"], true);
    }

    #[tokio::test]
    async fn score_batch_classifies_and_applies_every_record() {
        let records = vec![sample_record("a", "acme", "widgets"), sample_record("b", "acme", "widgets")];

        let mut catalog = MockCatalog::new();
        let snapshot = records.clone();
        catalog.expect_all_non_blocked().returning(move || Ok(snapshot.clone()));
        catalog
            .expect_apply_classification()
            .withf(|updates| updates.len() == 2)
            .returning(|_| Ok(()));
        catalog.expect_write_categories().returning(|_, _| Ok(()));

        let handler = ScoreBatchHandler { catalog: Arc::new(catalog) };
        let job = Job::score_batch();
        let ctx = WorkerContext::for_handler_test("test-worker");

        let result = handler.handle(&job, &ctx).await.unwrap();
        assert_eq!(result["classified"], 2);
    }

    #[tokio::test]
    async fn maintenance_cleanup_reports_removed_count() {
        let config = JobConfig::memory();
        let storage = skilldex_core::create_storage(&config).await.unwrap();
        let queue = Arc::new(JobQueue::new(storage, config));

        let handler = MaintenanceHandler { queue };
        let job = Job::new(JobType::Maintenance { task: MaintenanceTask::CleanupDeadJobs });
        let ctx = WorkerContext::for_handler_test("test-worker");

        let result = handler.handle(&job, &ctx).await.unwrap();
        assert_eq!(result["removed"], 0);
    }
}
