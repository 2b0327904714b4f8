//! Cache invalidation: the second side effect of a catalog upsert
//! (spec.md §4.8), targeting Redis via the `redis` crate.
//!
//! "The cache is fire-and-forget" (spec.md §5) — callers invalidate and
//! move on; a failure here never blocks or fails the upsert.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use skilldex_core::types::SkillRecord;
use tracing::warn;

/// The cache-invalidation surface.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, keys: Vec<String>) -> anyhow::Result<()>;
}

/// Talks to a Redis instance via a pooled, auto-reconnecting connection.
pub struct RedisCacheInvalidator {
    conn: ConnectionManager,
}

impl RedisCacheInvalidator {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheInvalidator for RedisCacheInvalidator {
    async fn invalidate(&self, keys: Vec<String>) -> anyhow::Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}

/// Used when `REDIS_URL` is unset — caching is disabled, per §6.
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate(&self, _keys: Vec<String>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds the configured invalidator from the environment.
pub async fn from_env() -> Box<dyn CacheInvalidator> {
    match std::env::var("REDIS_URL") {
        Ok(url) => match RedisCacheInvalidator::connect(&url).await {
            Ok(invalidator) => Box::new(invalidator),
            Err(err) => {
                warn!(error = %err, "failed to connect to Redis, cache invalidation disabled");
                Box::new(NoopCacheInvalidator)
            }
        },
        Err(_) => {
            warn!("REDIS_URL not set, cache invalidation disabled");
            Box::new(NoopCacheInvalidator)
        }
    }
}

/// The cache keys touched by one skill record (spec.md §4.8): skill-detail,
/// owner pages, featured/recent lists, and category pages.
pub fn cache_keys_for(record: &SkillRecord, categories: &[&str]) -> Vec<String> {
    let mut keys = vec![
        format!("skill:{}", record.id),
        format!("owner:{}", record.owner),
        "list:featured".to_string(),
        "list:recent".to_string(),
    ];
    keys.extend(categories.iter().map(|c| format!("category:{c}")));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skilldex_core::formats::SourceFormat;
    use skilldex_core::types::{Compatibility, QualityDetails, SecurityStatus, SkillType, Triggers};
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
    fn cache_keys_cover_detail_owner_lists_and_categories() {
        let record = sample_record();
        let keys = cache_keys_for(&record, &["kubernetes", "testing"]);

        assert!(keys.contains(&format!("skill:{}", record.id)));
        assert!(keys.contains(&"owner:acme".to_string()));
        assert!(keys.contains(&"list:featured".to_string()));
        assert!(keys.contains(&"list:recent".to_string()));
        assert!(keys.contains(&"category:kubernetes".to_string()));
        assert!(keys.contains(&"category:testing".to_string()));
    }

    #[test]
    fn cache_keys_with_no_categories_omits_category_entries() {
        let record = sample_record();
        let keys = cache_keys_for(&record, &[]);
        assert!(!keys.iter().any(|k| k.starts_with("category:")));
        assert_eq!(keys.len(), 4);
    }

    #[tokio::test]
    async fn noop_invalidator_always_succeeds() {
        let invalidator = NoopCacheInvalidator;
        invalidator.invalidate(vec!["skill:x".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn from_env_falls_back_to_noop_without_redis_url() {
        std::env::remove_var("REDIS_URL");
        let invalidator = from_env().await;
        invalidator.invalidate(vec!["skill:x".to_string()]).await.unwrap();
    }
}
