//! Shared environment-driven construction for every subcommand: the
//! code-host client, job queue storage, and the catalog/search/cache/
//! notifier side-effect clients.

use std::sync::Arc;

use anyhow::{Context, Result};
use skilldex_core::{CodeHostClient, GitHubClient, IndexerConfig, JobConfig, JobStorage, TokenPool};
use skilldex_store::{CacheInvalidator, CatalogStore, NotifierSink, PostgresCatalogStore, SearchIndexClient};

/// The code-host client and job queue storage, enough for a command that
/// enqueues a job and exits (`crawl`, `scan`).
pub struct EnqueueResources {
    pub client: Arc<dyn CodeHostClient>,
    pub job_storage: Arc<dyn JobStorage>,
    pub job_config: JobConfig,
}

impl EnqueueResources {
    pub async fn build() -> Result<Self> {
        let indexer_config = IndexerConfig::from_env().context("loading indexer config")?;
        let client = build_client(&indexer_config);

        let job_config = load_job_config()?;
        let job_storage = skilldex_core::create_storage(&job_config)
            .await
            .context("connecting to job storage")?;

        Ok(Self { client, job_storage, job_config })
    }
}

/// Every resource the worker pool's handlers need.
pub struct WorkerResources {
    pub indexer_config: IndexerConfig,
    pub client: Arc<dyn CodeHostClient>,
    pub job_storage: Arc<dyn JobStorage>,
    pub job_config: JobConfig,
    pub catalog: Arc<dyn CatalogStore>,
    pub search: Arc<dyn SearchIndexClient>,
    pub cache: Arc<dyn CacheInvalidator>,
    pub notifier: Arc<dyn NotifierSink>,
}

impl WorkerResources {
    pub async fn build() -> Result<Self> {
        let indexer_config = IndexerConfig::from_env().context("loading indexer config")?;
        let client = build_client(&indexer_config);

        let job_config = load_job_config()?;
        let job_storage = skilldex_core::create_storage(&job_config)
            .await
            .context("connecting to job storage")?;

        let catalog: Arc<dyn CatalogStore> = Arc::new(build_catalog().await?);

        let search: Arc<dyn SearchIndexClient> = Arc::from(skilldex_store::search_index::from_env());
        let cache: Arc<dyn CacheInvalidator> = Arc::from(skilldex_store::cache::from_env().await);
        let notifier: Arc<dyn NotifierSink> = Arc::from(skilldex_store::notifier::from_env());

        Ok(Self {
            indexer_config,
            client,
            job_storage,
            job_config,
            catalog,
            search,
            cache,
            notifier,
        })
    }
}

/// `stats` needs both the queue and the catalog; `block` only the
/// catalog. Each builds independently so `block` doesn't have to open a
/// job storage connection it never uses.
pub struct CatalogResources {
    pub job_storage: Arc<dyn JobStorage>,
    pub job_config: JobConfig,
    pub catalog: Arc<dyn CatalogStore>,
}

impl CatalogResources {
    pub async fn build() -> Result<Self> {
        let job_config = load_job_config()?;
        let job_storage = skilldex_core::create_storage(&job_config)
            .await
            .context("connecting to job storage")?;

        Ok(Self {
            job_storage,
            job_config,
            catalog: Arc::new(build_catalog().await?),
        })
    }
}

fn load_job_config() -> Result<JobConfig> {
    let config = JobConfig::from_env().context("loading job queue config")?;
    config.validate().context("validating job queue config")?;
    Ok(config)
}

/// Connects to the catalog database only.
pub async fn build_catalog_only() -> Result<Arc<dyn CatalogStore>> {
    Ok(Arc::new(build_catalog().await?))
}

async fn build_catalog() -> Result<PostgresCatalogStore> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
    let catalog_store = PostgresCatalogStore::new(&database_url)
        .await
        .context("connecting to catalog database")?;
    catalog_store.setup().await.context("setting up catalog schema")?;
    Ok(catalog_store)
}

fn build_client(config: &IndexerConfig) -> Arc<dyn CodeHostClient> {
    let pool = Arc::new(TokenPool::new(
        config.github_tokens.clone(),
        config.code_search_spacing_secs,
    ));
    Arc::new(GitHubClient::with_base_url(pool, config.github_api_base_url.clone()))
}
