//! Search-index sync: the search-side effect of a catalog upsert
//! (spec.md §4.8), targeting a Meilisearch-shaped REST API via `reqwest`
//! (SPEC_FULL.md §4.8 expansion — the teacher has no search-index client
//! of its own, so this follows `reqwest` usage the way `github_client.rs`
//! does: a thin trait over a real HTTP implementation plus a no-op stub).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

const INDEX_NAME: &str = "skills";

/// The subset of a skill record needed for browse/search, per spec.md
/// §4.8: "id, name, description, owner, repo, compatibility, stars,
/// security_score, indexed_at".
#[derive(Debug, Clone, Serialize)]
pub struct SearchDocument {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub repo: String,
    pub platforms: Vec<String>,
    pub stars: u64,
    pub security_score: f64,
    pub indexed_at: DateTime<Utc>,
}

/// The search side-effect surface. Failures here are logged, never
/// propagated — the catalog upsert has already committed (spec.md §7,
/// "External side-effect ... Log, do not fail the upsert or job").
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    async fn upsert(&self, doc: SearchDocument) -> anyhow::Result<()>;

    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

/// Talks to a Meilisearch (or Meilisearch-compatible) instance.
pub struct MeilisearchIndexClient {
    client: reqwest::Client,
    base_url: String,
    master_key: String,
}

impl MeilisearchIndexClient {
    pub fn new(base_url: impl Into<String>, master_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            master_key: master_key.into(),
        }
    }
}

#[async_trait]
impl SearchIndexClient for MeilisearchIndexClient {
    async fn upsert(&self, doc: SearchDocument) -> anyhow::Result<()> {
        let url = format!("{}/indexes/{INDEX_NAME}/documents", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(&self.master_key)
            .json(&[doc])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let url = format!("{}/indexes/{INDEX_NAME}/documents/{id}", self.base_url);
        self.client
            .delete(&url)
            .bearer_auth(&self.master_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Used when `MEILI_URL` is unset — search sync is disabled, per §6.
pub struct NoopSearchIndex;

#[async_trait]
impl SearchIndexClient for NoopSearchIndex {
    async fn upsert(&self, _doc: SearchDocument) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds the configured client from the environment, logging once which
/// mode was chosen (spec.md §6: "absent → search sync disabled").
pub fn from_env() -> Box<dyn SearchIndexClient> {
    match (std::env::var("MEILI_URL"), std::env::var("MEILI_MASTER_KEY")) {
        (Ok(url), Ok(key)) => Box::new(MeilisearchIndexClient::new(url, key)),
        _ => {
            warn!("MEILI_URL/MEILI_MASTER_KEY not set, search-index sync disabled");
            Box::new(NoopSearchIndex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> SearchDocument {
        SearchDocument {
            id: "acme/widgets:hello".to_string(),
            name: "hello".to_string(),
            description: "says hello".to_string(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            platforms: vec!["claude-code".to_string()],
            stars: 42,
            security_score: 0.9,
            indexed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn noop_search_index_always_succeeds() {
        let client = NoopSearchIndex;
        client.upsert(sample_doc()).await.unwrap();
        client.delete("acme/widgets:hello").await.unwrap();
    }

    #[test]
    fn from_env_falls_back_to_noop_without_meili_config() {
        std::env::remove_var("MEILI_URL");
        std::env::remove_var("MEILI_MASTER_KEY");
        let _client = from_env();
    }

    #[test]
    fn meilisearch_client_builds_document_url_under_skills_index() {
        let client = MeilisearchIndexClient::new("https://search.internal", "key123");
        assert_eq!(client.base_url, "https://search.internal");
    }
}
