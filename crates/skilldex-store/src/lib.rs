//! skilldex-store - catalog persistence, search-index sync, cache
//! invalidation, and the notifier hook for the skill indexer, plus the
//! `JobHandler` implementations that wire `skilldex-core`'s pipeline onto
//! them.
//!
//! # Layout
//!
//! - [`catalog`] - `CatalogStore`, the Postgres-backed implementation, and
//!   the upsert/classification/request surface.
//! - [`search_index`] - best-effort sync to a Meilisearch-shaped index.
//! - [`cache`] - best-effort Redis invalidation.
//! - [`notifier`] - the claim-indexed webhook hook.
//! - [`handlers`] - `JobHandler` impls for every job kind, built on the
//!   above plus `skilldex_core`'s discovery/pipeline/classifier.
#![warn(missing_docs)]

pub mod cache;
pub mod catalog;
pub mod errors;
pub mod handlers;
pub mod notifier;
pub mod search_index;

pub use cache::{CacheInvalidator, NoopCacheInvalidator, RedisCacheInvalidator};
pub use catalog::{CatalogStore, ClassificationUpdate, PostgresCatalogStore, RemovalResolution, UpsertOutcome};
pub use errors::{CatalogError, CatalogResult};
pub use handlers::{
    DeepScanHandler, FullCrawlHandler, IncrementalCrawlHandler, IndexSkillHandler, MaintenanceHandler,
    ScoreBatchHandler,
};
pub use notifier::{ClaimIndexedEvent, NoopNotifier, NotifierSink, WebhookNotifier};
pub use search_index::{MeilisearchIndexClient, NoopSearchIndex, SearchDocument, SearchIndexClient};
