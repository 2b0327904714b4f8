//! Catalog store: upserts, blocking, and the classifier batch's read/write
//! surface, backed by Postgres via `sqlx` (SPEC_FULL.md §4.8 expansion).
//!
//! Queries are plain runtime-checked `sqlx::query`/`query_as`, not the
//! `query!` compile-time macro — following the teacher's
//! `jobs/sqlite.rs` convention so the crate builds without a live
//! `DATABASE_URL` at compile time.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use skilldex_core::types::{
    AddRequest, Compatibility, QualityDetails, RemovalRequest, SecurityStatus, SkillRecord,
    SkillType, Triggers,
};
use skilldex_core::formats::SourceFormat;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::errors::{CatalogError, CatalogResult};

/// What happened as a result of calling [`CatalogStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The row was written (new record, or content/force changed it).
    Written,
    /// An existing row has `is_blocked = true`; nothing was written.
    SkippedBlocked,
    /// `content_hash` is unchanged and `force` was not set; nothing written.
    SkippedUnchanged,
}

/// A classifier-batch verdict for one skill id (SPEC_FULL.md §4.7).
#[derive(Debug, Clone)]
pub struct ClassificationUpdate {
    pub id: String,
    pub skill_type: SkillType,
    pub repo_skill_count: u32,
    pub is_duplicate: bool,
    pub canonical_skill_id: Option<String>,
}

/// A resolution written back to a removal request once the operator or
/// the block path acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalResolution {
    Applied,
    Rejected,
}

/// The catalog's persistence surface. A trait so pipeline-wiring code in
/// `handlers.rs` can be tested against an in-memory stub instead of a live
/// database.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Creates tables/indexes if absent.
    async fn setup(&self) -> CatalogResult<()>;

    /// `upsert(record)` per spec.md §4.8: keyed on id, aborts without
    /// writing if the existing row is blocked, aborts as a no-op if the
    /// content hash is unchanged and `force` is false.
    async fn upsert(&self, record: &SkillRecord, force: bool) -> CatalogResult<UpsertOutcome>;

    /// Flips `is_blocked = true`. Caller is responsible for the paired
    /// search-index delete and cache invalidation.
    async fn block(&self, id: &str) -> CatalogResult<()>;

    async fn get(&self, id: &str) -> CatalogResult<Option<SkillRecord>>;

    /// Every non-blocked record, for the classifier batch's snapshot read
    /// (spec.md §4.7: "pure over the current catalog snapshot").
    async fn all_non_blocked(&self) -> CatalogResult<Vec<SkillRecord>>;

    /// Writes back the classifier's per-id verdicts in one pass.
    async fn apply_classification(&self, updates: &[ClassificationUpdate]) -> CatalogResult<()>;

    /// Replaces the skill↔category join rows for one skill id.
    async fn write_categories(&self, id: &str, categories: &[&str]) -> CatalogResult<()>;

    /// Add-requests the core reads to decide whether an upsert corresponds
    /// to an approved request (spec.md §6, notifier hook).
    async fn pending_add_requests(&self) -> CatalogResult<Vec<AddRequest>>;

    async fn insert_removal_request(&self, request: &RemovalRequest) -> CatalogResult<()>;

    async fn resolve_removal_request(&self, id: Uuid, resolution: RemovalResolution) -> CatalogResult<()>;
}

/// [`CatalogStore`] backed by a Postgres connection pool.
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Connects with pool settings proportioned for a long-lived service
    /// process rather than a short-lived CLI invocation.
    pub async fn new(database_url: &str) -> CatalogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| CatalogError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_record(row: &PgRow) -> CatalogResult<SkillRecord> {
        let source_format: String = row
            .try_get("source_format")
            .map_err(|e| CatalogError::Database(format!("missing source_format: {e}")))?;
        let source_format = parse_source_format(&source_format)?;

        let skill_type: String = row
            .try_get("skill_type")
            .map_err(|e| CatalogError::Database(format!("missing skill_type: {e}")))?;
        let skill_type = parse_skill_type(&skill_type)?;

        let security_status: String = row
            .try_get("security_status")
            .map_err(|e| CatalogError::Database(format!("missing security_status: {e}")))?;
        let security_status = parse_security_status(&security_status)?;

        let compatibility: serde_json::Value = row
            .try_get("compatibility")
            .map_err(|e| CatalogError::Database(format!("missing compatibility: {e}")))?;
        let compatibility: Compatibility = serde_json::from_value(compatibility)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        let triggers: serde_json::Value = row
            .try_get("triggers")
            .map_err(|e| CatalogError::Database(format!("missing triggers: {e}")))?;
        let triggers: Triggers =
            serde_json::from_value(triggers).map_err(|e| CatalogError::Serialization(e.to_string()))?;

        let security_findings: serde_json::Value = row
            .try_get("security_findings")
            .map_err(|e| CatalogError::Database(format!("missing security_findings: {e}")))?;
        let security_findings: Vec<String> = serde_json::from_value(security_findings)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        let quality_details: serde_json::Value = row
            .try_get("quality_details")
            .map_err(|e| CatalogError::Database(format!("missing quality_details: {e}")))?;
        let quality_details: QualityDetails = serde_json::from_value(quality_details)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        let cached_files: serde_json::Value = row
            .try_get("cached_files")
            .map_err(|e| CatalogError::Database(format!("missing cached_files: {e}")))?;
        let cached_files: HashMap<String, String> = serde_json::from_value(cached_files)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        Ok(SkillRecord {
            id: row.try_get("id").map_err(db_err("id"))?,
            name: row.try_get("name").map_err(db_err("name"))?,
            description: row.try_get("description").map_err(db_err("description"))?,
            owner: row.try_get("owner").map_err(db_err("owner"))?,
            repo: row.try_get("repo").map_err(db_err("repo"))?,
            skill_path: row.try_get("skill_path").map_err(db_err("skill_path"))?,
            branch: row.try_get("branch").map_err(db_err("branch"))?,
            source_format,
            version: row.try_get("version").map_err(db_err("version"))?,
            license: row.try_get("license").map_err(db_err("license"))?,
            author: row.try_get("author").map_err(db_err("author"))?,
            homepage: row.try_get("homepage").map_err(db_err("homepage"))?,
            compatibility,
            triggers,
            github_stars: row.try_get::<i64, _>("github_stars").map_err(db_err("github_stars"))? as u64,
            github_forks: row.try_get::<i64, _>("github_forks").map_err(db_err("github_forks"))? as u64,
            security_score: row.try_get("security_score").map_err(db_err("security_score"))?,
            security_status,
            security_findings,
            quality_score: row.try_get("quality_score").map_err(db_err("quality_score"))?,
            quality_details,
            content_hash: row.try_get("content_hash").map_err(db_err("content_hash"))?,
            raw_content: row.try_get("raw_content").map_err(db_err("raw_content"))?,
            cached_files,
            skill_type,
            repo_skill_count: row.try_get::<i32, _>("repo_skill_count").map_err(db_err("repo_skill_count"))? as u32,
            is_duplicate: row.try_get("is_duplicate").map_err(db_err("is_duplicate"))?,
            canonical_skill_id: row.try_get("canonical_skill_id").map_err(db_err("canonical_skill_id"))?,
            is_blocked: row.try_get("is_blocked").map_err(db_err("is_blocked"))?,
            is_verified: row.try_get("is_verified").map_err(db_err("is_verified"))?,
            is_featured: row.try_get("is_featured").map_err(db_err("is_featured"))?,
            indexed_at: row.try_get("indexed_at").map_err(db_err("indexed_at"))?,
            updated_at: row.try_get("updated_at").map_err(db_err("updated_at"))?,
        })
    }
}

fn db_err(field: &'static str) -> impl Fn(sqlx::Error) -> CatalogError {
    move |e| CatalogError::Database(format!("missing {field}: {e}"))
}

fn parse_source_format(s: &str) -> CatalogResult<SourceFormat> {
    SourceFormat::ALL
        .into_iter()
        .find(|f| f.to_string() == s)
        .ok_or_else(|| CatalogError::Database(format!("unknown source_format: {s}")))
}

fn parse_skill_type(s: &str) -> CatalogResult<SkillType> {
    match s {
        "standalone" => Ok(SkillType::Standalone),
        "collection" => Ok(SkillType::Collection),
        "aggregator" => Ok(SkillType::Aggregator),
        "project-bound" => Ok(SkillType::ProjectBound),
        other => Err(CatalogError::Database(format!("unknown skill_type: {other}"))),
    }
}

fn parse_security_status(s: &str) -> CatalogResult<SecurityStatus> {
    match s {
        "pass" => Ok(SecurityStatus::Pass),
        "warning" => Ok(SecurityStatus::Warning),
        "fail" => Ok(SecurityStatus::Fail),
        other => Err(CatalogError::Database(format!("unknown security_status: {other}"))),
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn setup(&self) -> CatalogResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS skills (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                skill_path TEXT NOT NULL,
                branch TEXT NOT NULL,
                source_format TEXT NOT NULL,
                version TEXT,
                license TEXT,
                author TEXT,
                homepage TEXT,
                compatibility JSONB NOT NULL DEFAULT '{}',
                triggers JSONB NOT NULL DEFAULT '{}',
                github_stars BIGINT NOT NULL DEFAULT 0,
                github_forks BIGINT NOT NULL DEFAULT 0,
                security_score DOUBLE PRECISION NOT NULL,
                security_status TEXT NOT NULL,
                security_findings JSONB NOT NULL DEFAULT '[]',
                quality_score DOUBLE PRECISION NOT NULL,
                quality_details JSONB NOT NULL DEFAULT '{}',
                content_hash TEXT NOT NULL,
                raw_content TEXT NOT NULL,
                cached_files JSONB NOT NULL DEFAULT '{}',
                skill_type TEXT NOT NULL DEFAULT 'standalone',
                repo_skill_count INTEGER NOT NULL DEFAULT 1,
                is_duplicate BOOLEAN NOT NULL DEFAULT FALSE,
                canonical_skill_id TEXT,
                is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
                is_verified BOOLEAN NOT NULL DEFAULT FALSE,
                is_featured BOOLEAN NOT NULL DEFAULT FALSE,
                indexed_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_skills_owner_repo ON skills(owner, repo)")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_skills_content_hash ON skills(content_hash) WHERE NOT is_blocked")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS skill_categories (
                skill_id TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
                category TEXT NOT NULL,
                PRIMARY KEY (skill_id, category)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS add_requests (
                id UUID PRIMARY KEY,
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                path TEXT,
                user_email TEXT NOT NULL,
                locale TEXT NOT NULL,
                requested_at TIMESTAMPTZ NOT NULL,
                resolved BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS removal_requests (
                id UUID PRIMARY KEY,
                skill_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                requested_at TIMESTAMPTZ NOT NULL,
                resolution TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    async fn upsert(&self, record: &SkillRecord, force: bool) -> CatalogResult<UpsertOutcome> {
        let existing = sqlx::query("SELECT is_blocked, content_hash FROM skills WHERE id = $1")
            .bind(&record.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if let Some(row) = &existing {
            let is_blocked: bool = row.try_get("is_blocked").map_err(db_err("is_blocked"))?;
            if is_blocked {
                return Ok(UpsertOutcome::SkippedBlocked);
            }
            let existing_hash: String = row.try_get("content_hash").map_err(db_err("content_hash"))?;
            if !force && existing_hash == record.content_hash {
                return Ok(UpsertOutcome::SkippedUnchanged);
            }
        }

        let compatibility = serde_json::to_value(&record.compatibility)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let triggers =
            serde_json::to_value(&record.triggers).map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let security_findings = serde_json::to_value(&record.security_findings)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let quality_details = serde_json::to_value(&record.quality_details)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let cached_files = serde_json::to_value(&record.cached_files)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO skills (
                id, name, description, owner, repo, skill_path, branch, source_format,
                version, license, author, homepage, compatibility, triggers,
                github_stars, github_forks, security_score, security_status, security_findings,
                quality_score, quality_details, content_hash, raw_content, cached_files,
                skill_type, repo_skill_count, is_duplicate, canonical_skill_id,
                is_blocked, is_verified, is_featured, indexed_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28,
                $29, $30, $31, $32, $33
            )
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, description = EXCLUDED.description,
                owner = EXCLUDED.owner, repo = EXCLUDED.repo, skill_path = EXCLUDED.skill_path,
                branch = EXCLUDED.branch, source_format = EXCLUDED.source_format,
                version = EXCLUDED.version, license = EXCLUDED.license, author = EXCLUDED.author,
                homepage = EXCLUDED.homepage, compatibility = EXCLUDED.compatibility,
                triggers = EXCLUDED.triggers, github_stars = EXCLUDED.github_stars,
                github_forks = EXCLUDED.github_forks, security_score = EXCLUDED.security_score,
                security_status = EXCLUDED.security_status, security_findings = EXCLUDED.security_findings,
                quality_score = EXCLUDED.quality_score, quality_details = EXCLUDED.quality_details,
                content_hash = EXCLUDED.content_hash, raw_content = EXCLUDED.raw_content,
                cached_files = EXCLUDED.cached_files, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.owner)
        .bind(&record.repo)
        .bind(&record.skill_path)
        .bind(&record.branch)
        .bind(record.source_format.to_string())
        .bind(&record.version)
        .bind(&record.license)
        .bind(&record.author)
        .bind(&record.homepage)
        .bind(compatibility)
        .bind(triggers)
        .bind(record.github_stars as i64)
        .bind(record.github_forks as i64)
        .bind(record.security_score)
        .bind(record.security_status.to_string())
        .bind(security_findings)
        .bind(record.quality_score)
        .bind(quality_details)
        .bind(&record.content_hash)
        .bind(&record.raw_content)
        .bind(cached_files)
        .bind(record.skill_type.to_string())
        .bind(record.repo_skill_count as i32)
        .bind(record.is_duplicate)
        .bind(&record.canonical_skill_id)
        .bind(record.is_blocked)
        .bind(record.is_verified)
        .bind(record.is_featured)
        .bind(record.indexed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(UpsertOutcome::Written)
    }

    async fn block(&self, id: &str) -> CatalogResult<()> {
        let rows = sqlx::query("UPDATE skills SET is_blocked = TRUE, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> CatalogResult<Option<SkillRecord>> {
        let row = sqlx::query("SELECT * FROM skills WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn all_non_blocked(&self) -> CatalogResult<Vec<SkillRecord>> {
        let rows = sqlx::query("SELECT * FROM skills WHERE NOT is_blocked")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn apply_classification(&self, updates: &[ClassificationUpdate]) -> CatalogResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| CatalogError::Database(e.to_string()))?;
        for update in updates {
            sqlx::query(
                r#"
                UPDATE skills SET
                    skill_type = $1, repo_skill_count = $2,
                    is_duplicate = $3, canonical_skill_id = $4
                WHERE id = $5
                "#,
            )
            .bind(update.skill_type.to_string())
            .bind(update.repo_skill_count as i32)
            .bind(update.is_duplicate)
            .bind(&update.canonical_skill_id)
            .bind(&update.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(())
    }

    async fn write_categories(&self, id: &str, categories: &[&str]) -> CatalogResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM skill_categories WHERE skill_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        for category in categories {
            sqlx::query("INSERT INTO skill_categories (skill_id, category) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(category)
                .execute(&mut *tx)
                .await
                .map_err(|e| CatalogError::Database(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(())
    }

    async fn pending_add_requests(&self) -> CatalogResult<Vec<AddRequest>> {
        let rows = sqlx::query("SELECT * FROM add_requests WHERE NOT resolved")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(AddRequest {
                    id: row.try_get("id").map_err(db_err("id"))?,
                    owner: row.try_get("owner").map_err(db_err("owner"))?,
                    repo: row.try_get("repo").map_err(db_err("repo"))?,
                    path: row.try_get("path").map_err(db_err("path"))?,
                    user_email: row.try_get("user_email").map_err(db_err("user_email"))?,
                    locale: row.try_get("locale").map_err(db_err("locale"))?,
                    requested_at: row.try_get("requested_at").map_err(db_err("requested_at"))?,
                })
            })
            .collect()
    }

    async fn insert_removal_request(&self, request: &RemovalRequest) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO removal_requests (id, skill_id, reason, requested_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(request.id)
        .bind(&request.skill_id)
        .bind(&request.reason)
        .bind(request.requested_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(())
    }

    async fn resolve_removal_request(&self, id: Uuid, resolution: RemovalResolution) -> CatalogResult<()> {
        let resolution = match resolution {
            RemovalResolution::Applied => "applied",
            RemovalResolution::Rejected => "rejected",
        };
        sqlx::query("UPDATE removal_requests SET resolution = $1 WHERE id = $2")
            .bind(resolution)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(())
    }
}

/// The subset of `SkillRecord` fields needed for the search-index side
/// effect (spec.md §4.8): "id, name, description, owner, repo,
/// compatibility, stars, security_score, indexed_at".
pub fn search_fields(record: &SkillRecord) -> crate::search_index::SearchDocument {
    crate::search_index::SearchDocument {
        id: record.id.clone(),
        name: record.name.clone(),
        description: record.description.clone(),
        owner: record.owner.clone(),
        repo: record.repo.clone(),
        platforms: record.compatibility.platforms.clone(),
        stars: record.github_stars,
        security_score: record.security_score,
        indexed_at: record.indexed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_record() -> SkillRecord {
        SkillRecord {
            id: "acme/widgets/skills/hello/SKILL.md".to_string(),
            name: "hello".to_string(),
            description: "says hello".to_string(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
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

    #[test]
    fn parse_source_format_round_trips_every_variant() {
        for format in SourceFormat::ALL {
            assert_eq!(parse_source_format(&format.to_string()).unwrap(), format);
        }
        assert!(parse_source_format("not-a-format").is_err());
    }

    #[test]
    fn parse_skill_type_covers_every_variant() {
        assert_eq!(parse_skill_type("standalone").unwrap(), SkillType::Standalone);
        assert_eq!(parse_skill_type("collection").unwrap(), SkillType::Collection);
        assert_eq!(parse_skill_type("aggregator").unwrap(), SkillType::Aggregator);
        assert_eq!(parse_skill_type("project-bound").unwrap(), SkillType::ProjectBound);
        assert!(parse_skill_type("unknown").is_err());
    }

    #[test]
    fn parse_security_status_covers_every_variant() {
        assert_eq!(parse_security_status("pass").unwrap(), SecurityStatus::Pass);
        assert_eq!(parse_security_status("warning").unwrap(), SecurityStatus::Warning);
        assert_eq!(parse_security_status("fail").unwrap(), SecurityStatus::Fail);
        assert!(parse_security_status("unknown").is_err());
    }

    #[test]
    fn search_fields_projects_the_documented_subset() {
        let record = sample_record();
        let doc = search_fields(&record);
        assert_eq!(doc.id, record.id);
        assert_eq!(doc.owner, "acme");
        assert_eq!(doc.platforms, vec!["claude-code".to_string()]);
        assert_eq!(doc.stars, 10);
        assert_eq!(doc.security_score, 1.0);
    }

    async fn test_store() -> Option<PostgresCatalogStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let store = PostgresCatalogStore::new(&url).await.unwrap();
        store.setup().await.unwrap();
        Some(store)
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_the_record() {
        let Some(store) = test_store().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };

        let record = sample_record();
        let outcome = store.upsert(&record, false).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Written);

        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.content_hash, record.content_hash);
    }

    #[tokio::test]
    async fn upsert_skips_unchanged_content_hash() {
        let Some(store) = test_store().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };

        let record = sample_record();
        store.upsert(&record, false).await.unwrap();
        let second = store.upsert(&record, false).await.unwrap();
        assert_eq!(second, UpsertOutcome::SkippedUnchanged);
    }

    #[tokio::test]
    async fn block_then_upsert_is_skipped() {
        let Some(store) = test_store().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };

        let mut record = sample_record();
        record.id = "acme/widgets/skills/blocked/SKILL.md".to_string();
        store.upsert(&record, false).await.unwrap();
        store.block(&record.id).await.unwrap();

        record.content_hash = "changed".to_string();
        let outcome = store.upsert(&record, false).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::SkippedBlocked);
    }
}
