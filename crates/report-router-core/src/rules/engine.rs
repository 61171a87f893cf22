use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::{HeuristicRule, RuleMatcher, RuleSource};
use crate::{
    error::RuleError,
    taxonomy::{Intent, Taxonomy},
};

#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: HeuristicRule,
    intent: Intent,
    matcher: RuleMatcher,
}

impl CompiledRule {
    fn compile(taxonomy: &Taxonomy, rule: HeuristicRule) -> Result<Self, RuleError> {
        let intent = taxonomy
            .resolve(&rule.intent)
            .map_err(|source| RuleError::UnknownIntent {
                rule: rule.name.clone(),
                source,
            })?;
        let matcher = RuleMatcher::compile(&rule.keywords, rule.pattern.as_deref(), rule.word_boundary)
            .map_err(|source| RuleError::InvalidPattern {
                rule: rule.name.clone(),
                source,
            })?;
        Ok(Self {
            rule,
            intent,
            matcher,
        })
    }

    #[must_use]
    pub fn rule(&self) -> &HeuristicRule {
        &self.rule
    }

    /// Canonical intent after alias resolution.
    #[must_use]
    pub fn intent(&self) -> Intent {
        self.intent
    }

    #[must_use]
    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    fn classification(&self) -> Classification {
        Classification {
            intent: self.intent,
            rule: self.rule.name.clone(),
            priority: self.rule.priority,
            source: self.rule.metadata.source,
            action: self.rule.metadata.action.clone(),
        }
    }
}

/// Which rule produced an intent, for callers that need to explain a routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    pub rule: String,
    pub priority: u32,
    pub source: RuleSource,
    pub action: String,
}

/// Compiled, priority-sorted rule set. Immutable once built.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    taxonomy: Arc<Taxonomy>,
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Compiles and validates every rule up front.
    ///
    /// A rule naming an unknown intent or carrying a broken pattern fails the
    /// whole build, so misconfiguration surfaces at startup.
    pub fn new(taxonomy: Arc<Taxonomy>, rules: Vec<HeuristicRule>) -> Result<Self, RuleError> {
        let rules = compile_sorted(&taxonomy, rules)?;
        debug!(target: "report_router_rules", rules = rules.len(), "rule engine compiled");
        Ok(Self { taxonomy, rules })
    }

    #[must_use]
    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    /// Compiled rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> Option<Intent> {
        self.explain(text).map(|classification| classification.intent)
    }

    #[must_use]
    pub fn explain(&self, text: &str) -> Option<Classification> {
        let classification = first_match(&self.rules, text).map(CompiledRule::classification);
        if let Some(found) = &classification {
            debug!(
                target: "report_router_rules",
                rule = %found.rule,
                intent = %found.intent,
                priority = found.priority,
                "rule matched"
            );
        }
        classification
    }

    /// Evaluates `rules` instead of the loaded set.
    ///
    /// The subset is compiled, validated and sorted on every call.
    pub fn classify_with(
        &self,
        text: &str,
        rules: &[HeuristicRule],
    ) -> Result<Option<Classification>, RuleError> {
        let compiled = compile_sorted(&self.taxonomy, rules.to_vec())?;
        Ok(first_match(&compiled, text).map(CompiledRule::classification))
    }
}

/// Trims and lower-cases input before matching.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn compile_sorted(
    taxonomy: &Taxonomy,
    rules: Vec<HeuristicRule>,
) -> Result<Vec<CompiledRule>, RuleError> {
    let mut compiled = rules
        .into_iter()
        .map(|rule| CompiledRule::compile(taxonomy, rule))
        .collect::<Result<Vec<_>, _>>()?;
    // Stable: equal priorities keep aggregation order.
    compiled.sort_by_key(|rule| rule.rule.priority);
    Ok(compiled)
}

fn first_match<'a>(rules: &'a [CompiledRule], text: &str) -> Option<&'a CompiledRule> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }
    rules.iter().find(|rule| rule.matcher.is_match(&normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleMetadata, GENERATED_BASE_PRIORITY};

    fn engine(rules: Vec<HeuristicRule>) -> RuleEngine {
        let taxonomy = Arc::new(Taxonomy::builtin().expect("taxonomy"));
        RuleEngine::new(taxonomy, rules).expect("rules compile")
    }

    #[test]
    fn lower_priority_value_wins() {
        let engine = engine(vec![
            HeuristicRule::new("late", "tags")
                .with_priority(200)
                .with_keywords(["report"]),
            HeuristicRule::new("early", "votes")
                .with_priority(50)
                .with_keywords(["report"]),
        ]);
        assert_eq!(engine.classify("vote report"), Some(Intent::Votes));
        assert_eq!(engine.rules()[0].rule().name, "early");
    }

    #[test]
    fn ties_keep_declaration_order() {
        let engine = engine(vec![
            HeuristicRule::new("first", "roles").with_keywords(["list"]),
            HeuristicRule::new("second", "tags").with_keywords(["list"]),
        ]);
        let found = engine.explain("list everything").expect("match");
        assert_eq!(found.rule, "first");
        assert_eq!(found.intent, Intent::Roles);
    }

    #[test]
    fn empty_input_never_matches() {
        let engine = engine(vec![HeuristicRule::new("catch_all", "general")
            .with_pattern(".*")
            .with_word_boundary(false)]);
        assert_eq!(engine.classify(""), None);
        assert_eq!(engine.classify("   \n\t"), None);
        assert_eq!(engine.classify("anything"), Some(Intent::General));
    }

    #[test]
    fn legacy_labels_resolve_through_aliases() {
        let engine = engine(vec![
            HeuristicRule::new("legacy_counts", "counts").with_keywords(["headcount"])
        ]);
        let found = engine.explain("  HEADCOUNT please ").expect("match");
        assert_eq!(found.intent, Intent::StudentCounts);
        assert_eq!(engine.rules()[0].intent(), Intent::StudentCounts);
    }

    #[test]
    fn unknown_intent_fails_the_build() {
        let taxonomy = Arc::new(Taxonomy::builtin().expect("taxonomy"));
        let error = RuleEngine::new(
            taxonomy,
            vec![HeuristicRule::new("weather", "forecast").with_keywords(["rain"])],
        )
        .expect_err("forecast is not an intent");
        assert!(matches!(error, RuleError::UnknownIntent { ref rule, .. } if rule == "weather"));
    }

    #[test]
    fn invalid_pattern_fails_the_build() {
        let taxonomy = Arc::new(Taxonomy::builtin().expect("taxonomy"));
        let error = RuleEngine::new(
            taxonomy,
            vec![HeuristicRule::new("broken", "tags").with_pattern("[a-")],
        )
        .expect_err("bad regex");
        assert!(matches!(error, RuleError::InvalidPattern { .. }));
    }

    #[test]
    fn subset_evaluation_resorts_each_call() {
        let engine = engine(Vec::new());
        let subset = vec![
            HeuristicRule::new("generated", "tags")
                .with_priority(GENERATED_BASE_PRIORITY)
                .with_keywords(["waiver tags"])
                .with_metadata(RuleMetadata {
                    source: RuleSource::Generated,
                    ..RuleMetadata::default()
                }),
            HeuristicRule::new("domain", "waivers")
                .with_priority(10)
                .with_keywords(["waiver"]),
        ];
        let found = engine
            .classify_with("show waiver tags", &subset)
            .expect("subset compiles")
            .expect("match");
        assert_eq!(found.rule, "domain");
        assert_eq!(found.source, RuleSource::Domain);
        assert_eq!(engine.classify("show waiver tags"), None);
    }

    #[test]
    fn subset_with_unknown_intent_is_an_error() {
        let engine = engine(Vec::new());
        let result = engine.classify_with(
            "anything",
            &[HeuristicRule::new("bad", "not_a_thing").with_keywords(["anything"])],
        );
        assert!(matches!(result, Err(RuleError::UnknownIntent { .. })));
    }

    #[test]
    fn classification_is_deterministic() {
        let engine = engine(vec![
            HeuristicRule::new("a", "tags").with_keywords(["tag"]),
            HeuristicRule::new("b", "votes").with_keywords(["vote"]),
        ]);
        let first = engine.explain("tag the vote");
        for _ in 0..50 {
            assert_eq!(engine.explain("tag the vote"), first);
        }
    }
}
