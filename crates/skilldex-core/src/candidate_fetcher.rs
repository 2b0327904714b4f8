//! The candidate fetcher (spec.md §4.3): resolves a candidate's branch,
//! fetches its instruction-file content, and — for `skill.md` only — its
//! sibling `scripts/` and `references/` directories.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::errors::{ClientError, FetchError, FetchResult};
use crate::formats::SourceFormat;
use crate::github_client::CodeHostClient;
use crate::types::{Candidate, FetchedCandidate};

/// Extensions fetched from a `skill.md` candidate's `scripts/` directory.
const SCRIPT_EXTENSIONS: [&str; 7] = [".sh", ".bash", ".py", ".js", ".ts", ".rb", ".ps1"];

/// Extensions fetched from a `skill.md` candidate's `references/` directory.
const REFERENCE_EXTENSIONS: [&str; 7] = [".md", ".txt", ".json", ".yaml", ".yml", ".xml", ".html"];

/// Extra reference extension kept separate so the table above stays
/// aligned with spec.md's listed set (`.css` included, eight total).
const REFERENCE_EXTENSIONS_EXTRA: [&str; 1] = [".css"];

const REFERENCE_SIZE_CAP_BYTES: usize = 100 * 1024;

/// Fetches one candidate's content, resolving its branch from repo
/// metadata first when the discovery stage left it blank.
pub async fn fetch_candidate(
    client: &dyn CodeHostClient,
    mut candidate: Candidate,
) -> FetchResult<FetchedCandidate> {
    if candidate.branch.is_empty() {
        let metadata = match client.get_repo(&candidate.owner, &candidate.repo).await {
            Ok(metadata) => metadata,
            Err(ClientError::NotFound) => return Err(FetchError::Skip),
            Err(err) => return Err(err.into()),
        };
        candidate.branch = metadata.default_branch;
    }

    let file_path = instruction_file_path(&candidate);
    let raw_content = match client
        .get_file_content(&candidate.owner, &candidate.repo, &file_path, &candidate.branch)
        .await
    {
        Ok(content) => content,
        Err(ClientError::NotFound) => return Err(FetchError::Skip),
        Err(err) => return Err(err.into()),
    };

    let mut cached_files = HashMap::new();
    if candidate.format == SourceFormat::SkillMd {
        cached_files = fetch_sibling_files(client, &candidate).await;
    }

    Ok(FetchedCandidate { candidate, raw_content, cached_files })
}

/// The repository-relative path to the instruction file itself, per the
/// per-format placement rule (spec.md §4.3).
fn instruction_file_path(candidate: &Candidate) -> String {
    match candidate.format {
        SourceFormat::SkillMd | SourceFormat::AgentsMd => {
            if candidate.path == "." {
                candidate.format.filename().to_string()
            } else {
                format!("{}/{}", candidate.path, candidate.format.filename())
            }
        }
        SourceFormat::Cursorrules | SourceFormat::Windsurfrules => candidate.format.filename().to_string(),
        SourceFormat::CopilotInstructions => format!(".github/{}", candidate.format.filename()),
    }
}

/// Fetches `scripts/` and `references/` siblings for a `skill.md`
/// candidate. A sibling file that fails to fetch is omitted; the overall
/// candidate still proceeds (spec.md §4.3, "Failure semantics").
async fn fetch_sibling_files(client: &dyn CodeHostClient, candidate: &Candidate) -> HashMap<String, String> {
    let mut files = HashMap::new();

    for (subdir, extensions, size_cap) in [
        ("scripts", SCRIPT_EXTENSIONS.as_slice(), None),
        ("references", REFERENCE_EXTENSIONS.as_slice(), Some(REFERENCE_SIZE_CAP_BYTES)),
    ] {
        let dir_path = join_path(&candidate.path, subdir);
        let entries = match client
            .list_directory(&candidate.owner, &candidate.repo, &dir_path, &candidate.branch)
            .await
        {
            Ok(entries) => entries,
            Err(ClientError::NotFound) => continue,
            Err(err) => {
                debug!(dir = %dir_path, error = %err, "skipping sibling directory after error");
                continue;
            }
        };

        for entry in entries {
            if entry.entry_type != "blob" {
                continue;
            }
            let matches_extension = extensions.iter().any(|ext| entry.path.ends_with(ext))
                || (subdir == "references"
                    && REFERENCE_EXTENSIONS_EXTRA.iter().any(|ext| entry.path.ends_with(ext)));
            if !matches_extension {
                continue;
            }

            match client
                .get_file_content(&candidate.owner, &candidate.repo, &entry.path, &candidate.branch)
                .await
            {
                Ok(content) => {
                    if let Some(cap) = size_cap {
                        if content.len() > cap {
                            warn!(path = %entry.path, "sibling file exceeds size cap, skipping");
                            continue;
                        }
                    }
                    files.insert(entry.path, content);
                }
                Err(err) => {
                    debug!(path = %entry.path, error = %err, "failed to fetch sibling file, omitting");
                }
            }
        }
    }

    files
}

fn join_path(base: &str, subdir: &str) -> String {
    if base == "." {
        subdir.to_string()
    } else {
        format!("{base}/{subdir}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(format: SourceFormat, path: &str) -> Candidate {
        Candidate {
            owner: "alice".into(),
            repo: "demo".into(),
            path: path.into(),
            branch: "main".into(),
            format,
        }
    }

    #[test]
    fn skill_md_path_includes_directory() {
        let c = candidate(SourceFormat::SkillMd, "skills/hello");
        assert_eq!(instruction_file_path(&c), "skills/hello/SKILL.md");
    }

    #[test]
    fn skill_md_at_root() {
        let c = candidate(SourceFormat::SkillMd, ".");
        assert_eq!(instruction_file_path(&c), "SKILL.md");
    }

    #[test]
    fn cursorrules_ignores_path() {
        let c = candidate(SourceFormat::Cursorrules, ".");
        assert_eq!(instruction_file_path(&c), ".cursorrules");
    }

    #[test]
    fn copilot_instructions_under_github() {
        let c = candidate(SourceFormat::CopilotInstructions, ".");
        assert_eq!(instruction_file_path(&c), ".github/copilot-instructions.md");
    }

    #[test]
    fn join_path_handles_root() {
        assert_eq!(join_path(".", "scripts"), "scripts");
        assert_eq!(join_path("skills/hello", "scripts"), "skills/hello/scripts");
    }
}
