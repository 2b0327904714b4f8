//! Crawl-pipeline configuration, loaded from environment variables.
//!
//! Mirrors the teacher's `jobs::config` pattern: a plain struct with a
//! `from_env` constructor and sensible defaults, rather than a config-file
//! format — this process is meant to run as a long-lived service whose
//! environment is set by its deployment, not edited by hand.

use thiserror::Error;

/// The safe default spacing between code-search requests, per GitHub's
/// documented 10 requests/minute budget for that endpoint.
pub const DEFAULT_CODE_SEARCH_SPACING_SECS: u64 = 7;

const DEFAULT_MIN_STARS: u64 = 5;
const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration for the discovery/fetch/parse/score pipeline.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// `(name, credential)` pairs for the token pool.
    pub github_tokens: Vec<(String, String)>,
    pub github_api_base_url: String,
    /// Repos below this star count are not discovered, except via
    /// `deep_tree_scan` run against an explicit add request.
    pub min_stars: u64,
    pub code_search_spacing_secs: u64,
    pub concurrency: usize,
}

impl IndexerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let github_tokens = read_tokens()?;

        let github_api_base_url = std::env::var("GITHUB_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string());

        let min_stars = parse_env_or("INDEXER_MIN_STARS", DEFAULT_MIN_STARS)?;
        let code_search_spacing_secs =
            parse_env_or("INDEXER_CODE_SEARCH_SPACING_SECS", DEFAULT_CODE_SEARCH_SPACING_SECS)?;
        let concurrency = parse_env_or("INDEXER_CONCURRENCY", DEFAULT_CONCURRENCY)?;

        Ok(Self {
            github_tokens,
            github_api_base_url,
            min_stars,
            code_search_spacing_secs,
            concurrency,
        })
    }
}

fn read_tokens() -> Result<Vec<(String, String)>, ConfigError> {
    if let Ok(joined) = std::env::var("GITHUB_TOKENS") {
        let names: Vec<String> = std::env::var("GITHUB_TOKEN_NAMES")
            .ok()
            .map(|n| n.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let tokens: Vec<(String, String)> = joined
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, credential)| {
                let name = names.get(i).cloned().unwrap_or_else(|| format!("token-{i}"));
                (name, credential)
            })
            .collect();

        if tokens.is_empty() {
            return Err(ConfigError::Invalid {
                name: "GITHUB_TOKENS",
                value: joined,
            });
        }
        return Ok(tokens);
    }

    if let Ok(single) = std::env::var("GITHUB_TOKEN") {
        if single.trim().is_empty() {
            return Err(ConfigError::Missing("GITHUB_TOKEN"));
        }
        return Ok(vec![("token-0".to_string(), single)]);
    }

    Err(ConfigError::Missing("GITHUB_TOKENS"))
}

fn parse_env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "GITHUB_TOKENS",
            "GITHUB_TOKEN_NAMES",
            "GITHUB_TOKEN",
            "GITHUB_API_BASE_URL",
            "INDEXER_MIN_STARS",
            "INDEXER_CODE_SEARCH_SPACING_SECS",
            "INDEXER_CONCURRENCY",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn single_token_fallback() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("GITHUB_TOKEN", "abc123");
        let config = IndexerConfig::from_env().unwrap();
        assert_eq!(config.github_tokens, vec![("token-0".to_string(), "abc123".to_string())]);
        assert_eq!(config.code_search_spacing_secs, DEFAULT_CODE_SEARCH_SPACING_SECS);
        clear_env();
    }

    #[test]
    fn multi_token_with_names() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("GITHUB_TOKENS", "aaa,bbb");
        std::env::set_var("GITHUB_TOKEN_NAMES", "primary, secondary");
        let config = IndexerConfig::from_env().unwrap();
        assert_eq!(
            config.github_tokens,
            vec![
                ("primary".to_string(), "aaa".to_string()),
                ("secondary".to_string(), "bbb".to_string())
            ]
        );
        clear_env();
    }

    #[test]
    fn missing_tokens_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        assert!(matches!(IndexerConfig::from_env(), Err(ConfigError::Missing("GITHUB_TOKENS"))));
    }
}
