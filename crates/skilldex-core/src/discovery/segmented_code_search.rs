//! Strategy (a): segmented code search, partitioning the host's
//! 1000-result cap across filename, path, size, and format dimensions.

use async_trait::async_trait;

use crate::errors::{ClientError, DiscoveryResult};
use crate::formats::SourceFormat;
use crate::github_client::CodeHostClient;
use crate::types::Candidate;

use super::{Discover, DiscoveryOutput};

const MAX_PAGES: u32 = 10;

struct Segment {
    query: &'static str,
    format: SourceFormat,
}

fn segments() -> Vec<Segment> {
    vec![
        Segment { query: "filename:SKILL.md", format: SourceFormat::SkillMd },
        Segment { query: "filename:SKILL.md path:skills", format: SourceFormat::SkillMd },
        Segment { query: "filename:SKILL.md path:.claude", format: SourceFormat::SkillMd },
        Segment { query: "filename:SKILL.md path:.github", format: SourceFormat::SkillMd },
        Segment { query: "filename:SKILL.md path:.codex", format: SourceFormat::SkillMd },
        Segment { query: "filename:SKILL.md size:<1000", format: SourceFormat::SkillMd },
        Segment { query: "filename:SKILL.md size:1000..5000", format: SourceFormat::SkillMd },
        Segment { query: "filename:SKILL.md size:>5000", format: SourceFormat::SkillMd },
        Segment { query: "filename:AGENTS.md", format: SourceFormat::AgentsMd },
        Segment { query: "filename:AGENTS.md path:.claude", format: SourceFormat::AgentsMd },
        Segment { query: "filename:.cursorrules", format: SourceFormat::Cursorrules },
        Segment { query: "filename:.windsurfrules", format: SourceFormat::Windsurfrules },
        Segment {
            query: "filename:copilot-instructions.md path:.github",
            format: SourceFormat::CopilotInstructions,
        },
        Segment { query: "filename:AGENTS.md path:.github", format: SourceFormat::AgentsMd },
    ]
}

/// Strategy (a) from spec.md §4.2.
pub struct SegmentedCodeSearch {
    segments: Vec<Segment>,
}

impl SegmentedCodeSearch {
    pub fn new() -> Self {
        Self { segments: segments() }
    }
}

impl Default for SegmentedCodeSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discover for SegmentedCodeSearch {
    fn name(&self) -> &'static str {
        "segmented_code_search"
    }

    async fn discover(&self, client: &dyn CodeHostClient) -> DiscoveryResult<DiscoveryOutput> {
        let mut output = DiscoveryOutput::default();

        for segment in &self.segments {
            for page in 1..=MAX_PAGES {
                let response = match client.search_code(segment.query, page).await {
                    Ok(response) => response,
                    Err(ClientError::BeyondResultCap) => break,
                    Err(err) => return Err(err.into()),
                };

                if response.items.is_empty() {
                    break;
                }

                for hit in &response.items {
                    if !hit_matches_filename(&hit.path, segment.format) {
                        continue;
                    }
                    let Some((owner, repo)) = hit.repository.full_name.split_once('/') else {
                        continue;
                    };
                    output.candidates.push(Candidate {
                        owner: owner.to_string(),
                        repo: repo.to_string(),
                        path: path_for_hit(&hit.path, segment.format),
                        branch: String::new(),
                        format: segment.format,
                    });
                }

                if (response.items.len() as u64) < 100 {
                    break;
                }
            }
        }

        Ok(output)
    }
}

fn hit_matches_filename(path: &str, format: SourceFormat) -> bool {
    path.rsplit('/').next().unwrap_or(path) == format.filename()
}

/// `SKILL.md`/`AGENTS.md` hits carry the containing directory as the
/// skill path; root-only formats always resolve to `"."`.
fn path_for_hit(hit_path: &str, format: SourceFormat) -> String {
    if format.is_root_only() {
        return ".".to_string();
    }
    match hit_path.rsplit_once('/') {
        Some((dir, _filename)) => dir.to_string(),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_filename_to_containing_dir() {
        assert_eq!(path_for_hit("skills/hello/SKILL.md", SourceFormat::SkillMd), "skills/hello");
        assert_eq!(path_for_hit("SKILL.md", SourceFormat::SkillMd), ".");
    }

    #[test]
    fn root_only_formats_always_dot() {
        assert_eq!(path_for_hit("sub/.cursorrules", SourceFormat::Cursorrules), ".");
    }
}
