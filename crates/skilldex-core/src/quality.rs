//! Quality scorer (spec.md §4.6): five weighted factors blended into a
//! 0-100 overall score.

use crate::types::QualityDetails;

const DOCUMENTATION_WEIGHT: f64 = 0.30;
const MAINTENANCE_WEIGHT: f64 = 0.25;
const POPULARITY_WEIGHT: f64 = 0.20;
const SECURITY_WEIGHT: f64 = 0.15;
const VALIDATION_WEIGHT: f64 = 0.10;

/// Keywords checked against a repo's topics for the popularity factor's
/// AI-agent bonus (spec.md §4.6, "bonus if any repo topic contains an
/// AI-agent keyword").
const AI_AGENT_TOPIC_KEYWORDS: &[&str] =
    &["ai", "agent", "agents", "llm", "claude", "copilot", "cursor", "skill", "skills", "mcp", "windsurf"];

/// Everything the quality scorer needs about one parsed, scanned candidate.
pub struct QualityInputs<'a> {
    pub description: &'a str,
    pub body: &'a str,
    pub version: Option<&'a str>,
    pub license: Option<&'a str>,
    pub compatibility_platforms: &'a [String],
    pub has_scripts: bool,
    pub has_references: bool,

    pub days_since_push: i64,
    pub topics: &'a [String],
    pub forks: u64,

    pub stars: u64,

    pub security_score: f64,

    pub is_valid: bool,
    pub error_count: u32,
}

/// The overall 0-100 score plus its per-factor breakdown.
pub fn score(inputs: &QualityInputs<'_>) -> (f64, QualityDetails) {
    let documentation = documentation_score(inputs);
    let maintenance = maintenance_score(inputs);
    let popularity = popularity_score(inputs);
    let security = inputs.security_score.clamp(0.0, 100.0);
    let validation = validation_score(inputs);

    let overall = documentation * DOCUMENTATION_WEIGHT
        + maintenance * MAINTENANCE_WEIGHT
        + popularity * POPULARITY_WEIGHT
        + security * SECURITY_WEIGHT
        + validation * VALIDATION_WEIGHT;

    let details = QualityDetails { documentation, maintenance, popularity, security, validation };
    (overall.round().clamp(0.0, 100.0), details)
}

fn documentation_score(inputs: &QualityInputs<'_>) -> f64 {
    let mut points = 0.0;

    points += match inputs.description.len() {
        0..=19 => 0.0,
        20..=79 => 10.0,
        _ => 20.0,
    };

    points += match inputs.body.len() {
        0..=199 => 0.0,
        200..=999 => 15.0,
        1000..=4999 => 25.0,
        _ => 30.0,
    };

    let header_count = inputs.body.lines().filter(|line| line.trim_start().starts_with('#')).count();
    points += (header_count.min(5) as f64) * 2.0;

    if inputs.body.contains("```") {
        points += 10.0;
    }
    if inputs.version.is_some() {
        points += 5.0;
    }
    if inputs.license.is_some() {
        points += 5.0;
    }
    if !inputs.compatibility_platforms.is_empty() {
        points += 5.0;
    }
    if inputs.has_scripts {
        points += 5.0;
    }
    if inputs.has_references {
        points += 5.0;
    }

    points.clamp(0.0, 100.0)
}

fn maintenance_score(inputs: &QualityInputs<'_>) -> f64 {
    let mut points = match inputs.days_since_push {
        d if d < 30 => 50.0,
        d if d < 90 => 35.0,
        d if d < 180 => 20.0,
        d if d < 365 => 10.0,
        _ => 0.0,
    };

    if inputs.license.is_some() {
        points += 15.0;
    }
    if !inputs.description.is_empty() {
        points += 10.0;
    }
    if !inputs.topics.is_empty() {
        points += 10.0;
    }

    points += match inputs.forks {
        0 => 0.0,
        1..=4 => 5.0,
        5..=19 => 10.0,
        _ => 15.0,
    };

    points.clamp(0.0, 100.0)
}

fn popularity_score(inputs: &QualityInputs<'_>) -> f64 {
    let mut points = match inputs.stars {
        0 => 0.0,
        1..=4 => 10.0,
        5..=9 => 20.0,
        10..=49 => 35.0,
        50..=99 => 50.0,
        100..=999 => 65.0,
        _ => 80.0,
    };

    points += match inputs.forks {
        0 => 0.0,
        1..=9 => 5.0,
        10..=49 => 10.0,
        _ => 15.0,
    };

    let has_ai_agent_topic = inputs
        .topics
        .iter()
        .any(|topic| AI_AGENT_TOPIC_KEYWORDS.iter().any(|kw| topic.to_lowercase().contains(kw)));
    if has_ai_agent_topic {
        points += 5.0;
    }

    points.clamp(0.0, 100.0)
}

fn validation_score(inputs: &QualityInputs<'_>) -> f64 {
    if inputs.is_valid {
        100.0
    } else {
        (100.0 - 20.0 * inputs.error_count as f64).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> QualityInputs<'static> {
        QualityInputs {
            description: "A skill that manages Kubernetes deployments end to end.",
            body: "# Overview\n\nThis does things.\n\n```bash\nkubectl get pods\n```\n",
            version: Some("1.0.0"),
            license: Some("MIT"),
            compatibility_platforms: Vec::leak(vec!["claude".to_string()]),
            has_scripts: true,
            has_references: false,
            days_since_push: 10,
            topics: Vec::leak(vec!["kubernetes".to_string()]),
            forks: 3,
            stars: 42,
            security_score: 100.0,
            is_valid: true,
            error_count: 0,
        }
    }

    #[test]
    fn well_rounded_skill_scores_high() {
        let (overall, details) = score(&base_inputs());
        assert!(overall > 50.0, "overall = {overall}");
        assert!(details.documentation > 0.0);
        assert!(details.maintenance > 0.0);
    }

    #[test]
    fn invalid_skill_penalizes_validation_factor() {
        let mut inputs = base_inputs();
        inputs.is_valid = false;
        inputs.error_count = 2;
        let (_, details) = score(&inputs);
        assert_eq!(details.validation, 60.0);
    }

    #[test]
    fn stale_repo_scores_lower_maintenance() {
        let mut inputs = base_inputs();
        inputs.days_since_push = 400;
        let (_, details) = score(&inputs);
        assert!(details.maintenance < 50.0);
    }

    #[test]
    fn ai_agent_topic_bonus_applies() {
        let ai_topics = vec!["claude-skills".to_string()];
        let other_topics = vec!["devops".to_string()];

        let mut with_topic = base_inputs();
        with_topic.topics = &ai_topics;
        let mut without_topic = base_inputs();
        without_topic.topics = &other_topics;

        let (_, with_details) = score(&with_topic);
        let (_, without_details) = score(&without_topic);
        assert!(with_details.popularity > without_details.popularity);
    }

    #[test]
    fn zero_stars_scores_zero_popularity_base() {
        let mut inputs = base_inputs();
        inputs.stars = 0;
        inputs.forks = 0;
        inputs.topics = &[];
        let (_, details) = score(&inputs);
        assert_eq!(details.popularity, 0.0);
    }
}
