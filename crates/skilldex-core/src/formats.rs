//! The instruction-file format table.
//!
//! Filenames, placement rules, and target platforms are the single source
//! of truth consulted by discovery, parsing, and classification — see
//! `spec.md` §9 ("Pattern matching for instruction files").

use serde::{Deserialize, Serialize};

/// Recognized instruction-file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    SkillMd,
    AgentsMd,
    Cursorrules,
    Windsurfrules,
    CopilotInstructions,
}

impl SourceFormat {
    /// All recognized formats, in the order `spec.md` §6 lists them.
    pub const ALL: [SourceFormat; 5] = [
        SourceFormat::SkillMd,
        SourceFormat::AgentsMd,
        SourceFormat::Cursorrules,
        SourceFormat::Windsurfrules,
        SourceFormat::CopilotInstructions,
    ];

    /// The exact filename this format is recognized by.
    pub fn filename(self) -> &'static str {
        match self {
            SourceFormat::SkillMd => "SKILL.md",
            SourceFormat::AgentsMd => "AGENTS.md",
            SourceFormat::Cursorrules => ".cursorrules",
            SourceFormat::Windsurfrules => ".windsurfrules",
            SourceFormat::CopilotInstructions => "copilot-instructions.md",
        }
    }

    /// Where the file is allowed to live.
    pub fn location(self) -> FileLocation {
        match self {
            SourceFormat::SkillMd => FileLocation::Anywhere,
            SourceFormat::AgentsMd => FileLocation::Anywhere,
            SourceFormat::Cursorrules => FileLocation::RootOnly,
            SourceFormat::Windsurfrules => FileLocation::RootOnly,
            SourceFormat::CopilotInstructions => FileLocation::UnderPrefix(".github/"),
        }
    }

    /// The compatibility platform this format implies.
    pub fn platform(self) -> &'static str {
        match self {
            SourceFormat::SkillMd => "claude",
            SourceFormat::AgentsMd => "codex",
            SourceFormat::Cursorrules => "cursor",
            SourceFormat::Windsurfrules => "windsurf",
            SourceFormat::CopilotInstructions => "copilot",
        }
    }

    /// The `~<format-tag>` suffix appended to skill ids for non-`skill.md`
    /// formats (`spec.md` §3, Skill record "Id rule").
    pub fn id_tag(self) -> Option<&'static str> {
        match self {
            SourceFormat::SkillMd => None,
            SourceFormat::AgentsMd => Some("agents.md"),
            SourceFormat::Cursorrules => Some("cursorrules"),
            SourceFormat::Windsurfrules => Some("windsurfrules"),
            SourceFormat::CopilotInstructions => Some("copilot-instructions"),
        }
    }

    /// True for `SKILL.md`, which carries the rich frontmatter schema;
    /// all other formats go through metadata synthesis (§4.4).
    pub fn is_skill_md(self) -> bool {
        matches!(self, SourceFormat::SkillMd)
    }

    /// Is this format confined to the repository root (`path = "."`)?
    pub fn is_root_only(self) -> bool {
        matches!(self.location(), FileLocation::RootOnly)
    }

    /// Resolve the format whose filename matches exactly, honoring
    /// placement rules (e.g. a `copilot-instructions.md` hit outside
    /// `.github/` does not count).
    pub fn from_path(path: &str) -> Option<SourceFormat> {
        let filename = path.rsplit('/').next().unwrap_or(path);
        SourceFormat::ALL.into_iter().find(|fmt| {
            if filename != fmt.filename() {
                return false;
            }
            match fmt.location() {
                FileLocation::Anywhere => true,
                FileLocation::RootOnly => !path.contains('/'),
                FileLocation::UnderPrefix(prefix) => path.starts_with(prefix),
            }
        })
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceFormat::SkillMd => "skill.md",
            SourceFormat::AgentsMd => "agents.md",
            SourceFormat::Cursorrules => "cursorrules",
            SourceFormat::Windsurfrules => "windsurfrules",
            SourceFormat::CopilotInstructions => "copilot-instructions",
        };
        write!(f, "{s}")
    }
}

/// Where a format's file is allowed to appear in a repository tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLocation {
    /// May live under any directory (including the root).
    Anywhere,
    /// Must live at the repository root.
    RootOnly,
    /// Must live under the given path prefix.
    UnderPrefix(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_root_only_formats() {
        assert_eq!(
            SourceFormat::from_path(".cursorrules"),
            Some(SourceFormat::Cursorrules)
        );
        assert_eq!(SourceFormat::from_path("sub/.cursorrules"), None);
    }

    #[test]
    fn resolves_prefixed_formats() {
        assert_eq!(
            SourceFormat::from_path(".github/copilot-instructions.md"),
            Some(SourceFormat::CopilotInstructions)
        );
        assert_eq!(SourceFormat::from_path("copilot-instructions.md"), None);
    }

    #[test]
    fn resolves_anywhere_formats() {
        assert_eq!(
            SourceFormat::from_path("skills/hello/SKILL.md"),
            Some(SourceFormat::SkillMd)
        );
        assert_eq!(
            SourceFormat::from_path("SKILL.md"),
            Some(SourceFormat::SkillMd)
        );
    }

    #[test]
    fn id_tag_only_for_non_skill_md() {
        assert_eq!(SourceFormat::SkillMd.id_tag(), None);
        assert_eq!(SourceFormat::Cursorrules.id_tag(), Some("cursorrules"));
    }
}
