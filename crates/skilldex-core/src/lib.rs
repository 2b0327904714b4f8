//! skilldex-core - discovery, fetch, parse, and scoring pipeline for the
//! skill indexer.
//!
//! This crate has no knowledge of how results are persisted: it turns a
//! `(owner, repo, path, format)` candidate into a scored [`SkillRecord`],
//! and leaves catalog storage, search sync, and cache invalidation to
//! `skilldex-store`.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌────────┐   ┌──────────┐   ┌─────────┐
//! │  discovery   │──▶│  fetcher   │──▶│ parser │──▶│ security │──▶│ quality │
//! │ (5 strategies)│   │ (+siblings)│   │(format-│   │ (regex   │   │ (5      │
//! │              │   │            │   │ aware) │   │  rules)  │   │ factors)│
//! └──────────────┘   └────────────┘   └────────┘   └──────────┘   └─────────┘
//! ```
//!
//! [`pipeline::run`] ties the fetch/parse/security/quality stages together
//! into one call per candidate; [`classifier`] runs separately, as a batch
//! pass over a catalog snapshot, to assign `skill_type` and dedupe.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use skilldex_core::{CodeHostClient, GitHubClient, TokenPool, pipeline};
//! use skilldex_core::types::Candidate;
//! use skilldex_core::formats::SourceFormat;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pool = Arc::new(TokenPool::new(vec![("primary".into(), "ghp_...".into())], 7));
//! let client = GitHubClient::new(pool);
//!
//! let candidate = Candidate {
//!     owner: "acme".into(),
//!     repo: "widgets".into(),
//!     path: "skills/hello/SKILL.md".into(),
//!     branch: String::new(),
//!     format: SourceFormat::SkillMd,
//! };
//! let repo_metadata = client.get_repo("acme", "widgets").await?;
//! let record = pipeline::run(&client, candidate, &repo_metadata).await?;
//! println!("indexed {}", record.id);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `job-queue` - job queue abstraction (storage-backend agnostic)
//! - `sqlite-storage` - SQLite-backed job storage (default, local-first)
//! - `postgres-storage` - PostgreSQL-backed job storage, for distributed
//!   deployments of the crawler

#![warn(missing_docs)]

/// Crawl-pipeline configuration, loaded from the environment.
pub mod config;
/// The five discovery strategies and their orchestrator.
pub mod discovery;
/// Crate-wide, per-stage error types.
pub mod errors;
/// The recognized instruction-file format table.
pub mod formats;
/// `reqwest`-based GitHub REST client and the `CodeHostClient` trait.
pub mod github_client;
/// Credential rotation and rate-limit tracking.
pub mod token_pool;
/// Shared domain types: `Candidate`, `SkillRecord`, and friends.
pub mod types;

/// §4.3: resolves a candidate's default branch and fetches its content
/// plus sibling `scripts/`/`references/` files.
pub mod candidate_fetcher;
/// §4.5: regex-rule-based prompt-injection, exfiltration, and credential
/// scanner.
pub mod security;
/// §4.4: frontmatter parsing for `SKILL.md`, metadata synthesis for the
/// other four formats.
pub mod parser;
/// §4.6: five-factor weighted quality scorer.
pub mod quality;
/// §4.7: repo-skill-count, skill-type classification, and content-hash
/// deduplication, run as a batch pass over a catalog snapshot.
pub mod classifier;
/// Ties fetch/parse/security/quality into one call per candidate.
pub mod pipeline;

#[cfg(feature = "job-queue")]
pub mod jobs;

pub use errors::{ClientError, DiscoveryError, FetchError, ParseError};
pub use github_client::{CodeHostClient, GitHubClient, RepoMetadata, TreeEntry, TreeResponse};
pub use token_pool::{QuotaKind, TokenPool};
pub use types::{
    AddRequest, Candidate, Compatibility, DiscoveredRepo, DiscoveryStrategy, FetchedCandidate,
    QualityDetails, RemovalRequest, SecurityStatus, SkillRecord, SkillType, TokenInfo, Triggers,
    build_skill_id,
};
pub use formats::{FileLocation, SourceFormat};
pub use discovery::{Discover, DiscoveryOrchestrator, DiscoveryOutput};
pub use config::{ConfigError, IndexerConfig};
pub use security::{SecurityReport};
pub use parser::{ParsedSkill, SynthesisContext};
pub use quality::QualityInputs;
pub use classifier::{DedupeCandidate, DedupeVerdict};
pub use pipeline::PipelineError;

#[cfg(feature = "job-queue")]
pub use jobs::{
    Job, JobConfig, JobError, JobFilter, JobHandler, JobId, JobPriority, JobProgress, JobQueue,
    JobStats, JobStatus, JobStorage, JobType, MaintenanceTask, PoolState,
    StorageBackend, StorageError, StorageResult, WorkerConfig, WorkerContext, WorkerPool,
    WorkerPoolError, WorkerPoolStats, create_job_queue, create_storage,
};
#[cfg(feature = "job-queue")]
pub use jobs::ConfigError as JobConfigError;

#[cfg(feature = "sqlite-storage")]
pub use jobs::SqliteJobStorage;

#[cfg(feature = "postgres-storage")]
pub use jobs::PostgresJobStorage;
