//! Priority-ordered heuristic rules mapping free text to an intent.
//!
//! Rules come from two places: hand-authored domain rules and one generated
//! keyword rule per intent. They are aggregated domain-first, compiled and
//! validated once, then sorted by priority. Equal priorities keep their
//! aggregation order.

use serde::{Deserialize, Serialize};

pub mod domain;
mod engine;
mod generated;
mod matcher;

pub use engine::{normalize, Classification, CompiledRule, RuleEngine};
pub use generated::generated_rules;
pub use matcher::RuleMatcher;

/// Default priority of hand-authored rules.
pub const DOMAIN_BASE_PRIORITY: u32 = 100;
/// Default priority of rules generated from intent keywords.
pub const GENERATED_BASE_PRIORITY: u32 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    #[default]
    Domain,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleMetadata {
    pub source: RuleSource,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
}

impl Default for RuleMetadata {
    fn default() -> Self {
        Self {
            source: RuleSource::Domain,
            action: "read".to_string(),
            tone: None,
            urgency: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicRule {
    pub name: String,
    /// Intent value or alias; resolved through the taxonomy when compiled.
    pub intent: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default = "default_word_boundary")]
    pub word_boundary: bool,
    #[serde(default)]
    pub metadata: RuleMetadata,
}

fn default_priority() -> u32 {
    DOMAIN_BASE_PRIORITY
}

fn default_word_boundary() -> bool {
    true
}

impl HeuristicRule {
    pub fn new(name: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intent: intent.into(),
            priority: DOMAIN_BASE_PRIORITY,
            keywords: Vec::new(),
            pattern: None,
            word_boundary: true,
            metadata: RuleMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn with_word_boundary(mut self, enabled: bool) -> Self {
        self.word_boundary = enabled;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: RuleMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Concatenates rule sources in evaluation tie-break order.
#[must_use]
pub fn aggregate(domain: Vec<HeuristicRule>, generated: Vec<HeuristicRule>) -> Vec<HeuristicRule> {
    domain.into_iter().chain(generated).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_rule_fills_defaults() {
        let rule: HeuristicRule = serde_yaml::from_str(
            "name: lunch_menu\nintent: general\nkeywords: [\"lunch menu\"]\n",
        )
        .expect("valid yaml");
        assert_eq!(rule.priority, DOMAIN_BASE_PRIORITY);
        assert!(rule.word_boundary);
        assert_eq!(rule.metadata.source, RuleSource::Domain);
        assert_eq!(rule.metadata.action, "read");
    }

    #[test]
    fn aggregate_puts_domain_rules_first() {
        let rules = aggregate(
            vec![HeuristicRule::new("a", "tags")],
            vec![HeuristicRule::new("b", "tags")],
        );
        let names: Vec<_> = rules.iter().map(|rule| rule.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
