use std::path::PathBuf;

use report_router_client::FetchError;
use serde::Serialize;
use thiserror::Error;

/// A label that is neither an intent value nor a known alias.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown intent `{label}`")]
pub struct UnknownIntentError {
    pub label: String,
}

impl UnknownIntentError {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("alias `{alias}` points at unknown intent `{target}`")]
    DanglingAlias { alias: String, target: String },
    #[error("intent `{0}` is described more than once")]
    DuplicateSpec(String),
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{rule}` has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule `{rule}` targets an unknown intent")]
    UnknownIntent {
        rule: String,
        #[source]
        source: UnknownIntentError,
    },
    #[error("failed to load rules from {path}: {message}")]
    Load { path: PathBuf, message: String },
}

/// Rows that no table can be built from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot render rows: {message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("api_base must not be empty")]
    EmptyApiBase,
    #[error("safe_max_rows must be greater than zero")]
    ZeroRowCap,
    #[error("fetch_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownIntent,
    NoIntentMatched,
    UnknownHandler,
    UpstreamFetch,
    Render,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownIntent => "unknown_intent",
            Self::NoIntentMatched => "no_intent_matched",
            Self::UnknownHandler => "unknown_handler",
            Self::UpstreamFetch => "upstream_fetch",
            Self::Render => "render",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    UnknownIntent(#[from] UnknownIntentError),
    #[error("no rule matched the request")]
    NoIntentMatched,
    #[error("no handler registered for mode `{0}`")]
    UnknownHandler(String),
    #[error("{source_label}: {error}")]
    UpstreamFetch {
        source_label: String,
        #[source]
        error: FetchError,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl DispatchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownIntent(_) => ErrorKind::UnknownIntent,
            Self::NoIntentMatched => ErrorKind::NoIntentMatched,
            Self::UnknownHandler(_) => ErrorKind::UnknownHandler,
            Self::UpstreamFetch { .. } => ErrorKind::UpstreamFetch,
            Self::Render(_) => ErrorKind::Render,
        }
    }

    /// Short message safe to show to the person who asked the question.
    ///
    /// Upstream payloads and internal labels stay in the `Display` form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownIntent(_) => {
                "That request maps to a report type that is not configured.".to_string()
            }
            Self::NoIntentMatched => "Sorry, I could not understand the request.".to_string(),
            Self::UnknownHandler(mode) => format!("No report is available for `{mode}`."),
            Self::UpstreamFetch {
                source_label,
                error,
            } => format!(
                "Could not load records from {source_label} (status {}). Please try again later.",
                error.status
            ),
            Self::Render(_) => "The records could not be formatted as a table.".to_string(),
        }
    }

    #[must_use]
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::UpstreamFetch { error, .. } => Some(error),
            _ => None,
        }
    }
}
