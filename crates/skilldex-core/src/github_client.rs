//! Raw `reqwest`-based GitHub REST client.
//!
//! We talk to the API directly instead of through an SDK crate so the
//! token pool can see `x-ratelimit-*` headers on every response.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{ClientError, ClientResult};
use crate::token_pool::{QuotaKind, TokenPool};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "skilldex/1.0";

/// A repository as returned by the GitHub repo/search APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoMetadata {
    pub full_name: String,
    pub default_branch: String,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub archived: bool,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<RepoLicense>,
    pub pushed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoLicense {
    #[serde(rename = "spdx_id")]
    pub spdx_id: String,
}

/// One hit from `/search/code`.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeSearchHit {
    pub path: String,
    pub repository: RepoSearchRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoSearchRef {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}

/// A single entry in a git tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeResponse {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// A single entry from `/repos/:owner/:repo/branches`.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    pub name: String,
}

/// A commit as returned by `/search/commits` and `/repos/:owner/:repo/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    pub repository: Option<RepoSearchRef>,
}

/// The operations the crawl pipeline needs from a code-hosting API.
///
/// Modeled as a trait so discovery/fetch logic can be tested against a
/// mock implementation instead of live GitHub.
#[async_trait]
pub trait CodeHostClient: Send + Sync {
    async fn get_repo(&self, owner: &str, repo: &str) -> ClientResult<RepoMetadata>;

    async fn get_file_content(&self, owner: &str, repo: &str, path: &str, branch: &str) -> ClientResult<String>;

    async fn get_tree(&self, owner: &str, repo: &str, branch: &str, recursive: bool) -> ClientResult<TreeResponse>;

    /// Lists the immediate contents of `path` on `branch`, used as the
    /// truncated-tree fallback (spec.md §4.2(e)).
    async fn list_directory(&self, owner: &str, repo: &str, path: &str, branch: &str) -> ClientResult<Vec<TreeEntry>>;

    async fn list_branches(&self, owner: &str, repo: &str, page: u32) -> ClientResult<Vec<BranchRef>>;

    async fn search_code(&self, query: &str, page: u32) -> ClientResult<SearchResponse<CodeSearchHit>>;

    async fn search_repos(&self, query: &str, page: u32) -> ClientResult<SearchResponse<RepoMetadata>>;

    async fn search_commits(&self, query: &str, page: u32) -> ClientResult<SearchResponse<CommitRef>>;
}

/// [`CodeHostClient`] backed by real HTTP calls against `api.github.com`.
pub struct GitHubClient {
    http: Client,
    pool: Arc<TokenPool>,
    base_url: String,
}

impl GitHubClient {
    pub fn new(pool: Arc<TokenPool>) -> Self {
        Self::with_base_url(pool, API_BASE.to_string())
    }

    pub fn with_base_url(pool: Arc<TokenPool>, base_url: String) -> Self {
        Self {
            http: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .expect("failed to build HTTP client"),
            pool,
            base_url,
        }
    }

    async fn request(&self, method: Method, path: &str) -> ClientResult<reqwest::Response> {
        if TokenPool::quota_kind_for_path(path) == QuotaKind::CodeSearch {
            self.pool.pace_code_search().await;
        }

        let credential = self.pool.best_credential()?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {credential}"))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        self.record_rate_limit(&credential, &response);

        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                self.handle_rate_limit_response(&credential, response).await
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::UnexpectedStatus {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    fn record_rate_limit(&self, credential: &str, response: &reqwest::Response) {
        let headers = response.headers();
        let remaining = header_u32(headers, "x-ratelimit-remaining");
        let limit = header_u32(headers, "x-ratelimit-limit");
        let reset = header_u64(headers, "x-ratelimit-reset");
        if let (Some(remaining), Some(limit), Some(reset)) = (remaining, limit, reset) {
            self.pool.update_from_headers(credential, remaining, limit, reset);
        }
    }

    async fn handle_rate_limit_response(
        &self,
        credential: &str,
        response: reqwest::Response,
    ) -> ClientResult<reqwest::Response> {
        let retry_after = header_u64(response.headers(), "retry-after");
        let remaining = header_u32(response.headers(), "x-ratelimit-remaining");

        if remaining == Some(0) {
            let reset = header_u64(response.headers(), "x-ratelimit-reset").unwrap_or(0);
            self.pool.mark_exhausted(credential, reset);
            return Err(ClientError::PrimaryRateLimited);
        }

        warn!("secondary rate limit encountered");
        let retry_after_secs = retry_after.unwrap_or(60);
        self.pool.wait_for_secondary_limit(Some(retry_after_secs)).await;
        Err(ClientError::SecondaryRateLimited { retry_after_secs })
    }
}

fn header_u32(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn header_u64(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[async_trait]
impl CodeHostClient for GitHubClient {
    async fn get_repo(&self, owner: &str, repo: &str) -> ClientResult<RepoMetadata> {
        let path = format!("/repos/{owner}/{repo}");
        let response = self.request(Method::GET, &path).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get_file_content(&self, owner: &str, repo: &str, path: &str, branch: &str) -> ClientResult<String> {
        let api_path = format!("/repos/{owner}/{repo}/contents/{path}?ref={branch}");
        let response = self.request(Method::GET, &api_path).await?;
        let parsed: ContentResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if parsed.encoding != "base64" {
            return Err(ClientError::Decode(format!("unsupported encoding {}", parsed.encoding)));
        }
        let cleaned: String = parsed.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get_tree(&self, owner: &str, repo: &str, branch: &str, recursive: bool) -> ClientResult<TreeResponse> {
        let recursive_qs = if recursive { "?recursive=1" } else { "" };
        let path = format!("/repos/{owner}/{repo}/git/trees/{branch}{recursive_qs}");
        let response = self.request(Method::GET, &path).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn list_directory(&self, owner: &str, repo: &str, path: &str, branch: &str) -> ClientResult<Vec<TreeEntry>> {
        let api_path = if path == "." {
            format!("/repos/{owner}/{repo}/contents?ref={branch}")
        } else {
            format!("/repos/{owner}/{repo}/contents/{path}?ref={branch}")
        };
        let response = self.request(Method::GET, &api_path).await?;
        let entries: Vec<ContentsEntry> = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(entries
            .into_iter()
            .map(|e| TreeEntry {
                path: e.path,
                entry_type: if e.entry_type == "file" { "blob".to_string() } else { "tree".to_string() },
            })
            .collect())
    }

    async fn search_code(&self, query: &str, page: u32) -> ClientResult<SearchResponse<CodeSearchHit>> {
        let path = format!("/search/code?q={}&per_page=100&page={page}", urlencode(query));
        if page > 10 {
            return Err(ClientError::BeyondResultCap);
        }
        let response = self.request(Method::GET, &path).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn search_repos(&self, query: &str, page: u32) -> ClientResult<SearchResponse<RepoMetadata>> {
        let path = format!("/search/repositories?q={}&per_page=100&page={page}", urlencode(query));
        if page > 10 {
            return Err(ClientError::BeyondResultCap);
        }
        let response = self.request(Method::GET, &path).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn search_commits(&self, query: &str, page: u32) -> ClientResult<SearchResponse<CommitRef>> {
        let path = format!("/search/commits?q={}&per_page=100&page={page}", urlencode(query));
        if page > 10 {
            return Err(ClientError::BeyondResultCap);
        }
        debug!(query, page, "searching commits");
        let response = self.request(Method::GET, &path).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
