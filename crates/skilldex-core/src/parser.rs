//! Format-aware parser (spec.md §4.4).
//!
//! `skill.md` carries a rich YAML frontmatter schema; every other format is
//! synthesized from whatever frontmatter it happens to have, the repo's own
//! metadata, and the body text.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::{ParseError, ParseResult};
use crate::formats::SourceFormat;
use crate::types::{Compatibility, Triggers};

/// `name` must match this pattern for `skill.md` frontmatter (spec.md §4.4).
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[a-z0-9][a-z0-9_-]*$").unwrap())
}

const MIN_DESCRIPTION_LEN: usize = 20;

/// The result of parsing one candidate's raw content.
#[derive(Debug, Clone, Default)]
pub struct ParsedSkill {
    pub name: String,
    pub description: String,
    pub version: Option<String>,
    pub license: Option<String>,
    pub author: Option<String>,
    pub homepage: Option<String>,
    pub compatibility: Compatibility,
    pub triggers: Triggers,
    /// The body after frontmatter has been stripped.
    pub body: String,
    /// `scripts/<name>` and `references/<name>` mentions found in the body.
    pub resource_references: Vec<String>,
    /// Non-fatal issues; feed the validation quality sub-score (§4.6).
    pub warnings: Vec<String>,
}

/// Raw frontmatter shape shared by every format. `skill.md` requires
/// `name`/`description`; other formats use whatever subset is present.
#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    license: Option<String>,
    author: Option<String>,
    homepage: Option<String>,
    #[serde(default)]
    compatibility: FrontmatterCompatibility,
    #[serde(default)]
    triggers: FrontmatterTriggers,
}

#[derive(Debug, Default, Deserialize)]
struct FrontmatterCompatibility {
    #[serde(default)]
    platforms: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FrontmatterTriggers {
    #[serde(default, rename = "filePatterns")]
    file_patterns: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    languages: Vec<String>,
}

/// Context the synthesis path needs when frontmatter is absent or partial.
pub struct SynthesisContext<'a> {
    pub repo_name: &'a str,
    pub repo_owner: &'a str,
    pub repo_description: Option<&'a str>,
}

/// Parses one candidate's raw content for its format.
pub fn parse(format: SourceFormat, raw_content: &str, ctx: &SynthesisContext<'_>) -> ParseResult<ParsedSkill> {
    let (frontmatter, body) = split_frontmatter(raw_content)?;

    if body.trim().is_empty() {
        return Err(ParseError::EmptyBody);
    }

    let parsed = if format.is_skill_md() {
        parse_skill_md(frontmatter, body)?
    } else {
        synthesize(format, frontmatter, body, ctx)
    };

    Ok(parsed)
}

/// Splits a `---`-delimited YAML frontmatter block from the body, if present.
fn split_frontmatter(raw_content: &str) -> ParseResult<(Option<Frontmatter>, &str)> {
    let trimmed = raw_content.trim_start_matches('\u{feff}');
    let Some(rest) = trimmed.strip_prefix("---") else {
        return Ok((None, raw_content));
    };
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")).unwrap_or(rest);

    let Some(end) = rest.find("\n---") else {
        return Ok((None, raw_content));
    };
    let yaml_block = &rest[..end];
    let after_delimiter = &rest[end + 4..];
    let body = after_delimiter
        .strip_prefix('\n')
        .or_else(|| after_delimiter.strip_prefix("\r\n"))
        .unwrap_or(after_delimiter);

    let frontmatter: Frontmatter = serde_yaml::from_str(yaml_block)?;
    Ok((Some(frontmatter), body))
}

fn parse_skill_md(frontmatter: Option<Frontmatter>, body: &str) -> ParseResult<ParsedSkill> {
    let frontmatter = frontmatter.ok_or_else(|| ParseError::InvalidFrontmatter("no frontmatter block".into()))?;

    let name = frontmatter
        .name
        .filter(|n| name_pattern().is_match(n))
        .ok_or_else(|| ParseError::InvalidFrontmatter("name".into()))?;

    let description = frontmatter
        .description
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ParseError::InvalidFrontmatter("description".into()))?;

    let mut warnings = Vec::new();
    if description.len() < MIN_DESCRIPTION_LEN {
        warnings.push(format!("description shorter than {MIN_DESCRIPTION_LEN} characters"));
    }

    Ok(ParsedSkill {
        name,
        description,
        version: frontmatter.version,
        license: frontmatter.license,
        author: frontmatter.author,
        homepage: frontmatter.homepage,
        compatibility: Compatibility { platforms: frontmatter.compatibility.platforms },
        triggers: Triggers {
            file_patterns: frontmatter.triggers.file_patterns,
            keywords: frontmatter.triggers.keywords,
            languages: frontmatter.triggers.languages,
        },
        body: body.to_string(),
        resource_references: find_resource_references(body),
        warnings,
    })
}

fn synthesize(
    format: SourceFormat,
    frontmatter: Option<Frontmatter>,
    body: &str,
    ctx: &SynthesisContext<'_>,
) -> ParsedSkill {
    let frontmatter = frontmatter.unwrap_or_default();

    let name = frontmatter
        .name
        .filter(|n| name_pattern().is_match(n))
        .unwrap_or_else(|| sanitize_name(ctx.repo_name));

    let description = frontmatter
        .description
        .filter(|d| !d.trim().is_empty())
        .or_else(|| ctx.repo_description.map(str::to_string).filter(|d| !d.trim().is_empty()))
        .or_else(|| first_paragraph_at_least(body, MIN_DESCRIPTION_LEN))
        .unwrap_or_else(|| format!("{format} from {}/{}", ctx.repo_owner, ctx.repo_name));

    let mut platforms = frontmatter.compatibility.platforms;
    if !platforms.iter().any(|p| p == format.platform()) {
        platforms.push(format.platform().to_string());
    }

    ParsedSkill {
        name,
        description,
        version: frontmatter.version,
        license: frontmatter.license,
        author: Some(frontmatter.author.unwrap_or_else(|| ctx.repo_owner.to_string())),
        homepage: frontmatter.homepage,
        compatibility: Compatibility { platforms },
        triggers: Triggers {
            file_patterns: frontmatter.triggers.file_patterns,
            keywords: frontmatter.triggers.keywords,
            languages: frontmatter.triggers.languages,
        },
        body: body.to_string(),
        resource_references: find_resource_references(body),
        warnings: Vec::new(),
    }
}

/// `sanitize(repo_name)` per spec.md §4.4: lowercase, non-`[a-z0-9_-]`
/// characters collapsed to a single `-`.
fn sanitize_name(repo_name: &str) -> String {
    let lowered = repo_name.to_lowercase();
    let mut sanitized = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            sanitized.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            sanitized.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-');
    if trimmed.is_empty() {
        "skill".to_string()
    } else {
        trimmed.to_string()
    }
}

fn first_paragraph_at_least(body: &str, min_len: usize) -> Option<String> {
    body.split("\n\n")
        .map(str::trim)
        .find(|paragraph| paragraph.len() >= min_len)
        .map(str::to_string)
}

fn find_resource_references(body: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"(scripts|references)/[A-Za-z0-9_.\-/]+").unwrap());
    let mut seen = Vec::new();
    for m in pattern.find_iter(body) {
        let reference = m.as_str().to_string();
        if !seen.contains(&reference) {
            seen.push(reference);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>() -> SynthesisContext<'a> {
        SynthesisContext { repo_name: "My Repo!!", repo_owner: "acme", repo_description: None }
    }

    #[test]
    fn skill_md_requires_name_and_description() {
        let raw = "---\nname: hello-world\ndescription: A skill that does a thing, at length.\n---\nBody text.";
        let parsed = parse(SourceFormat::SkillMd, raw, &ctx()).unwrap();
        assert_eq!(parsed.name, "hello-world");
        assert_eq!(parsed.body.trim(), "Body text.");
    }

    #[test]
    fn skill_md_missing_name_fails() {
        let raw = "---\ndescription: Long enough description here.\n---\nBody.";
        let err = parse(SourceFormat::SkillMd, raw, &ctx()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidFrontmatter(_)));
    }

    #[test]
    fn skill_md_empty_body_fails() {
        let raw = "---\nname: hello\ndescription: Long enough description here.\n---\n   \n";
        let err = parse(SourceFormat::SkillMd, raw, &ctx()).unwrap_err();
        assert!(matches!(err, ParseError::EmptyBody));
    }

    #[test]
    fn cursorrules_synthesizes_name_from_repo() {
        let raw = "Always use snake_case for Python files.";
        let parsed = parse(SourceFormat::Cursorrules, raw, &ctx()).unwrap();
        assert_eq!(parsed.name, "my-repo");
        assert!(parsed.description.contains("cursorrules from acme/My Repo!!"));
        assert_eq!(parsed.author.as_deref(), Some("acme"));
        assert!(parsed.compatibility.platforms.contains(&"cursor".to_string()));
    }

    #[test]
    fn non_skill_md_empty_body_fails() {
        let err = parse(SourceFormat::Cursorrules, "   \n", &ctx()).unwrap_err();
        assert!(matches!(err, ParseError::EmptyBody));
    }

    #[test]
    fn resource_references_are_deduped() {
        let body = "See scripts/run.sh and references/guide.md, also scripts/run.sh again.";
        let refs = find_resource_references(body);
        assert_eq!(refs, vec!["scripts/run.sh", "references/guide.md"]);
    }

    #[test]
    fn sanitize_name_collapses_runs() {
        assert_eq!(sanitize_name("My Cool--Repo!!"), "my-cool-repo");
    }
}
