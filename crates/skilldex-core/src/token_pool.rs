//! Credential rotation and rate-limit tracking for the GitHub REST client.
//!
//! A single mutex guards the whole table so that selecting a credential,
//! updating its counters from response headers, and marking it exhausted
//! all happen as one atomic step (spec.md §5).

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::errors::{ClientError, ClientResult};
use crate::types::TokenInfo;

/// Which quota a request draws from. GitHub tracks these independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    /// REST/GraphQL core quota (5000/hr per authenticated user by default).
    Primary,
    /// Search quota, which is far tighter (30/min for code search).
    CodeSearch,
}

struct PoolEntry {
    info: TokenInfo,
}

/// Rotates across a set of GitHub credentials, tracking each one's
/// remaining quota and exhaustion state.
pub struct TokenPool {
    entries: Mutex<Vec<PoolEntry>>,
    /// Minimum spacing enforced between successive code-search requests,
    /// regardless of which credential serves them.
    code_search_spacing_secs: u64,
    last_code_search_epoch_secs: Mutex<u64>,
}

impl TokenPool {
    pub fn new(credentials: Vec<(String, String)>, code_search_spacing_secs: u64) -> Self {
        let now = now_epoch_secs();
        let entries = credentials
            .into_iter()
            .map(|(name, credential)| PoolEntry {
                info: TokenInfo {
                    credential,
                    name,
                    remaining: u32::MAX,
                    limit: u32::MAX,
                    reset_epoch_secs: now,
                    last_used_epoch_secs: 0,
                    is_exhausted: false,
                },
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
            code_search_spacing_secs,
            last_code_search_epoch_secs: Mutex::new(0),
        }
    }

    /// Selects the credential with the most remaining quota that is not
    /// currently marked exhausted, rotating past a reset deadline that has
    /// already elapsed.
    pub fn best_credential(&self) -> ClientResult<String> {
        let now = now_epoch_secs();
        let mut entries = self.entries.lock().expect("token pool mutex poisoned");

        for entry in entries.iter_mut() {
            if entry.info.is_exhausted && entry.info.reset_epoch_secs <= now {
                entry.info.is_exhausted = false;
                entry.info.remaining = entry.info.limit;
            }
        }

        let best = entries
            .iter_mut()
            .filter(|e| !e.info.is_exhausted)
            .max_by_key(|e| e.info.remaining);

        match best {
            Some(entry) => {
                entry.info.last_used_epoch_secs = now;
                Ok(entry.info.credential.clone())
            }
            None => Err(ClientError::PoolExhausted),
        }
    }

    /// Updates the tracked counters for `credential` from GitHub's
    /// `x-ratelimit-*` response headers. Responses advertising a limit
    /// under 100 are ignored — spec.md §5 treats those as belonging to an
    /// endpoint outside the quotas this pool manages.
    pub fn update_from_headers(&self, credential: &str, remaining: u32, limit: u32, reset_epoch_secs: u64) {
        if limit < 100 {
            debug!(limit, "ignoring rate-limit headers below tracked threshold");
            return;
        }
        let mut entries = self.entries.lock().expect("token pool mutex poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.info.credential == credential) {
            entry.info.remaining = remaining;
            entry.info.limit = limit;
            entry.info.reset_epoch_secs = reset_epoch_secs;
            entry.info.is_exhausted = remaining == 0;
        }
    }

    /// Marks `credential` exhausted until `reset_epoch_secs`, used when a
    /// primary rate limit response is received directly (remaining == 0).
    pub fn mark_exhausted(&self, credential: &str, reset_epoch_secs: u64) {
        let mut entries = self.entries.lock().expect("token pool mutex poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.info.credential == credential) {
            entry.info.is_exhausted = true;
            entry.info.reset_epoch_secs = reset_epoch_secs;
            warn!(name = %entry.info.name, reset_epoch_secs, "credential exhausted");
        }
    }

    /// Sleeps as needed to respect the abuse-detection (secondary) rate
    /// limit: at least 10s, defaulting to 60s when GitHub does not supply
    /// a `retry-after` header.
    pub async fn wait_for_secondary_limit(&self, retry_after_secs: Option<u64>) {
        let wait = retry_after_secs.unwrap_or(60).max(10);
        warn!(wait_secs = wait, "backing off for secondary rate limit");
        tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
    }

    /// Blocks until the configured spacing since the last code-search
    /// request has elapsed, serializing code-search traffic across all
    /// credentials.
    pub async fn pace_code_search(&self) {
        loop {
            let now = now_epoch_secs();
            let wait_secs = {
                let mut last = self
                    .last_code_search_epoch_secs
                    .lock()
                    .expect("token pool mutex poisoned");
                let elapsed = now.saturating_sub(*last);
                if elapsed >= self.code_search_spacing_secs {
                    *last = now;
                    0
                } else {
                    self.code_search_spacing_secs - elapsed
                }
            };
            if wait_secs == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_secs(wait_secs)).await;
        }
    }

    pub fn quota_kind_for_path(path: &str) -> QuotaKind {
        if path.contains("/search/code") {
            QuotaKind::CodeSearch
        } else {
            QuotaKind::Primary
        }
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}
