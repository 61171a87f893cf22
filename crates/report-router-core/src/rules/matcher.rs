use regex::Regex;

/// Disjunction of a rule's keyword phrases and raw pattern.
///
/// A rule with nothing to match compiles to a matcher that never matches.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    regex: Option<Regex>,
}

impl RuleMatcher {
    pub fn compile(
        keywords: &[String],
        pattern: Option<&str>,
        word_boundary: bool,
    ) -> Result<Self, regex::Error> {
        let mut branches: Vec<String> = keywords
            .iter()
            .filter_map(|phrase| phrase_fragment(phrase, word_boundary))
            .collect();

        if let Some(raw) = pattern.map(str::trim).filter(|raw| !raw.is_empty()) {
            // Surface a bad pattern under its own text rather than the combined one.
            Regex::new(raw)?;
            branches.push(raw.to_string());
        }

        if branches.is_empty() {
            return Ok(Self::never());
        }

        let combined = branches
            .iter()
            .map(|branch| format!("(?:{branch})"))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!("(?i:{combined})"))?;
        Ok(Self { regex: Some(regex) })
    }

    #[must_use]
    pub fn never() -> Self {
        Self { regex: None }
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(text))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.regex.as_ref().map(Regex::as_str)
    }
}

/// Escaped phrase where internal whitespace matches any whitespace run.
fn phrase_fragment(phrase: &str, word_boundary: bool) -> Option<String> {
    let tokens: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
    if tokens.is_empty() {
        return None;
    }
    let body = tokens.join(r"\s+");
    if word_boundary {
        Some(format!(r"\b{{start-half}}{body}\b{{end-half}}"))
    } else {
        Some(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(phrases: &[&str]) -> Vec<String> {
        phrases.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn phrase_whitespace_matches_runs() {
        let matcher = RuleMatcher::compile(&keywords(&["student counts"]), None, true)
            .expect("compiles");
        assert!(matcher.is_match("show student \t  counts by grade"));
        assert!(!matcher.is_match("show studentcounts"));
    }

    #[test]
    fn word_boundary_blocks_partial_words() {
        let bounded = RuleMatcher::compile(&keywords(&["tag"]), None, true).expect("compiles");
        assert!(bounded.is_match("list every tag"));
        assert!(!bounded.is_match("vintage furniture"));

        let loose = RuleMatcher::compile(&keywords(&["tag"]), None, false).expect("compiles");
        assert!(loose.is_match("vintage furniture"));
    }

    #[test]
    fn punctuation_in_phrases_is_literal() {
        let matcher =
            RuleMatcher::compile(&keywords(&["c++ club"]), None, true).expect("compiles");
        assert!(matcher.is_match("who runs the c++ club?"));
        assert!(!matcher.is_match("who runs the cc club?"));
    }

    #[test]
    fn empty_rule_never_matches() {
        let matcher =
            RuleMatcher::compile(&keywords(&["", "   "]), Some("  "), true).expect("compiles");
        assert!(matcher.as_str().is_none());
        assert!(!matcher.is_match(""));
        assert!(!matcher.is_match("anything at all"));
    }

    #[test]
    fn raw_pattern_joins_the_disjunction() {
        let matcher = RuleMatcher::compile(
            &keywords(&["staff directory"]),
            Some(r"\bwho\s+teaches\b"),
            true,
        )
        .expect("compiles");
        assert!(matcher.is_match("who teaches biology"));
        assert!(matcher.is_match("open the staff directory"));
        assert!(!matcher.is_match("teaching schedule"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(RuleMatcher::compile(&[], Some("(unclosed"), true).is_err());
    }
}
