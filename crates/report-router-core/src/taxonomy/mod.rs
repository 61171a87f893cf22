//! Closed vocabulary of report intents and the aliases older rules still use.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{TaxonomyError, UnknownIntentError};

mod builtin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    General,
    StudentCounts,
    StaffDirectory,
    Materials,
    Roles,
    Subjects,
    Tags,
    Votes,
    Waivers,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 9] = [
        Intent::General,
        Intent::StudentCounts,
        Intent::StaffDirectory,
        Intent::Materials,
        Intent::Roles,
        Intent::Subjects,
        Intent::Tags,
        Intent::Votes,
        Intent::Waivers,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::StudentCounts => "student_counts",
            Self::StaffDirectory => "staff_directory",
            Self::Materials => "materials",
            Self::Roles => "roles",
            Self::Subjects => "subjects",
            Self::Tags => "tags",
            Self::Votes => "votes",
            Self::Waivers => "waivers",
        }
    }

    /// Exact lookup of a canonical value; aliases are not consulted.
    #[must_use]
    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|intent| intent.as_str() == value)
    }

    /// Handler mode serving this intent. Modes and intents share one string space.
    #[must_use]
    pub const fn mode(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = UnknownIntentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_value(value).ok_or_else(|| UnknownIntentError::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentSpec {
    pub description: String,
    pub examples: Vec<String>,
    /// Phrases turned into one generated rule per intent.
    pub keywords: Vec<String>,
    pub default_action: String,
}

impl IntentSpec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            examples: Vec::new(),
            keywords: Vec::new(),
            default_action: "read".to_string(),
        }
    }

    #[must_use]
    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
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
    pub fn with_default_action(mut self, action: impl Into<String>) -> Self {
        self.default_action = action.into();
        self
    }
}

/// Validated, immutable taxonomy.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    specs: Vec<(Intent, IntentSpec)>,
    aliases: BTreeMap<String, Intent>,
}

impl Taxonomy {
    #[must_use]
    pub fn builder() -> TaxonomyBuilder {
        TaxonomyBuilder::default()
    }

    /// The taxonomy shipped with the router.
    pub fn builtin() -> Result<Self, TaxonomyError> {
        builtin::taxonomy()
    }

    /// Resolves a label to its canonical intent.
    ///
    /// Tries the label as an intent value first, then as an alias. Labels are
    /// compared after trimming and lower-casing.
    pub fn resolve(&self, label: &str) -> Result<Intent, UnknownIntentError> {
        let normalized = normalize_label(label);
        Intent::from_value(&normalized)
            .or_else(|| self.aliases.get(&normalized).copied())
            .ok_or_else(|| UnknownIntentError::new(label))
    }

    #[must_use]
    pub fn describe(&self, intent: Intent) -> String {
        self.spec(intent).map_or_else(
            || intent.as_str().to_string(),
            |spec| spec.description.clone(),
        )
    }

    #[must_use]
    pub fn all_intent_values(&self) -> Vec<&'static str> {
        Intent::ALL.iter().map(|intent| intent.as_str()).collect()
    }

    #[must_use]
    pub fn spec(&self, intent: Intent) -> Option<&IntentSpec> {
        self.specs
            .iter()
            .find(|(candidate, _)| *candidate == intent)
            .map(|(_, spec)| spec)
    }

    /// Described intents in declaration order.
    pub fn specs(&self) -> impl Iterator<Item = (Intent, &IntentSpec)> {
        Intent::ALL
            .into_iter()
            .filter_map(move |intent| self.spec(intent).map(|spec| (intent, spec)))
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, Intent)> {
        self.aliases
            .iter()
            .map(|(alias, intent)| (alias.as_str(), *intent))
    }
}

#[derive(Debug, Default)]
pub struct TaxonomyBuilder {
    specs: Vec<(Intent, IntentSpec)>,
    aliases: Vec<(String, String)>,
}

impl TaxonomyBuilder {
    #[must_use]
    pub fn spec(mut self, intent: Intent, spec: IntentSpec) -> Self {
        self.specs.push((intent, spec));
        self
    }

    /// Maps `alias` to the canonical intent value `target`.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), target.into()));
        self
    }

    pub fn build(self) -> Result<Taxonomy, TaxonomyError> {
        let mut specs: Vec<(Intent, IntentSpec)> = Vec::with_capacity(self.specs.len());
        for (intent, spec) in self.specs {
            if specs.iter().any(|(existing, _)| *existing == intent) {
                return Err(TaxonomyError::DuplicateSpec(intent.to_string()));
            }
            specs.push((intent, spec));
        }

        let mut aliases = BTreeMap::new();
        for (alias, target) in self.aliases {
            let Some(intent) = Intent::from_value(&normalize_label(&target)) else {
                return Err(TaxonomyError::DanglingAlias { alias, target });
            };
            aliases.insert(normalize_label(&alias), intent);
        }

        Ok(Taxonomy { specs, aliases })
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}
