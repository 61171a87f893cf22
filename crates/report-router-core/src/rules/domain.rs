//! Hand-authored routing rules and the YAML format for extending them.
//!
//! A rule file looks like:
//!
//! ```yaml
//! rules:
//!   - name: bus_waivers
//!     intent: waivers
//!     priority: 40
//!     keywords: ["field trip forms"]
//! ```

use std::path::Path;

use serde::Deserialize;

use super::{HeuristicRule, RuleMetadata};
use crate::error::RuleError;

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<HeuristicRule>,
}

#[must_use]
pub fn builtin_rules() -> Vec<HeuristicRule> {
    vec![
        HeuristicRule::new("student_counts", "student_counts")
            .with_priority(50)
            .with_keywords([
                "student counts",
                "how many students",
                "number of students",
                "headcount",
                "enrollment",
            ]),
        HeuristicRule::new("who_teaches", "staff")
            .with_priority(90)
            .with_pattern(r"\bwho\s+(?:teaches|is\s+teaching)\b"),
        HeuristicRule::new("staff_directory", "staff_directory").with_keywords([
            "staff directory",
            "staff list",
            "faculty",
            "teachers",
            "who works",
        ]),
        HeuristicRule::new("waivers", "waivers")
            .with_keywords([
                "waiver",
                "waivers",
                "permission slip",
                "permission slips",
                "consent form",
                "consent forms",
            ])
            .with_metadata(RuleMetadata {
                urgency: Some("normal".to_string()),
                ..RuleMetadata::default()
            }),
        HeuristicRule::new("votes", "votes").with_keywords([
            "vote",
            "votes",
            "ballot",
            "poll results",
            "election",
        ]),
        HeuristicRule::new("materials", "materials")
            .with_priority(110)
            .with_keywords(["material", "materials", "textbook", "textbooks", "supplies"]),
        HeuristicRule::new("roles", "roles")
            .with_priority(110)
            .with_keywords(["role", "roles", "permissions", "access level"]),
        HeuristicRule::new("subjects", "subjects")
            .with_priority(110)
            .with_keywords(["subject", "subjects", "course catalog", "courses"]),
        HeuristicRule::new("tags", "tags")
            .with_priority(120)
            .with_keywords(["tag", "tags", "labels"]),
    ]
}

pub fn parse_rules_yaml(text: &str) -> Result<Vec<HeuristicRule>, serde_yaml::Error> {
    serde_yaml::from_str::<RuleFile>(text).map(|file| file.rules)
}

pub async fn load_rules_file(path: &Path) -> Result<Vec<HeuristicRule>, RuleError> {
    let load_error = |message: String| RuleError::Load {
        path: path.to_path_buf(),
        message,
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|error| load_error(error.to_string()))?;
    parse_rules_yaml(&text).map_err(|error| load_error(error.to_string()))
}
