use super::{HeuristicRule, RuleMetadata, RuleSource, GENERATED_BASE_PRIORITY};
use crate::{registry::HandlerRegistry, taxonomy::Taxonomy};

/// One keyword rule per described intent.
///
/// Keywords come from the intent spec, followed by any keywords the handler
/// registered under the intent's mode adds. Intents without keywords still get
/// a rule, which never matches.
#[must_use]
pub fn generated_rules(taxonomy: &Taxonomy, registry: &HandlerRegistry) -> Vec<HeuristicRule> {
    taxonomy
        .specs()
        .map(|(intent, spec)| {
            let mut keywords = spec.keywords.clone();
            if let Some(handler) = registry.get(intent.mode()) {
                for keyword in handler.keywords() {
                    if !keywords
                        .iter()
                        .any(|existing| existing.eq_ignore_ascii_case(keyword))
                    {
                        keywords.push(keyword.clone());
                    }
                }
            }

            HeuristicRule::new(format!("generated:{intent}"), intent.as_str())
                .with_priority(GENERATED_BASE_PRIORITY)
                .with_keywords(keywords)
                .with_metadata(RuleMetadata {
                    source: RuleSource::Generated,
                    action: spec.default_action.clone(),
                    ..RuleMetadata::default()
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ResourceHandler;
    use crate::taxonomy::{Intent, IntentSpec};

    #[test]
    fn merges_handler_keywords_without_duplicates() {
        let taxonomy = Taxonomy::builder()
            .spec(Intent::Tags, IntentSpec::new("Tags").with_keywords(["tag"]))
            .spec(Intent::General, IntentSpec::new("Anything"))
            .build()
            .expect("taxonomy");
        let registry = HandlerRegistry::default();
        registry.register_handler(
            ResourceHandler::new("tags", "tags").with_keywords(["Tag", "hashtag"]),
        );

        let rules = generated_rules(&taxonomy, &registry);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "generated:general");
        assert!(rules[0].keywords.is_empty());
        assert_eq!(rules[1].keywords, vec!["tag".to_string(), "hashtag".to_string()]);
        assert_eq!(rules[1].priority, GENERATED_BASE_PRIORITY);
        assert_eq!(rules[1].metadata.source, RuleSource::Generated);
    }
}
