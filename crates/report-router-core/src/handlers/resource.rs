use async_trait::async_trait;
use report_router_client::FetchError;

use super::{FetchContext, FetchResult, QueryHandler};

/// Handler backed by one record-service resource.
///
/// Reporting domains differ only in resource name, keywords, column
/// preference and an optional sort key, so they share this type.
#[derive(Debug, Clone)]
pub struct ResourceHandler {
    mode: String,
    resource: String,
    noun: Option<String>,
    source_label: String,
    keywords: Vec<String>,
    columns: Vec<String>,
    sort_by: Option<String>,
}

impl ResourceHandler {
    pub fn new(mode: impl Into<String>, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            mode: mode.into(),
            source_label: format!("records service `{resource}`"),
            resource,
            noun: None,
            keywords: Vec::new(),
            columns: Vec::new(),
            sort_by: None,
        }
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
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }

    #[must_use]
    pub fn with_noun(mut self, noun: impl Into<String>) -> Self {
        self.noun = Some(noun.into());
        self
    }

    /// Orders fetched rows by `field`; ties keep upstream order.
    #[must_use]
    pub fn sorted_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self
    }
}

#[async_trait]
impl QueryHandler for ResourceHandler {
    fn mode(&self) -> &str {
        &self.mode
    }

    fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn source_label(&self) -> &str {
        &self.source_label
    }

    fn resource(&self) -> &str {
        &self.resource
    }

    fn record_noun(&self) -> &str {
        self.noun.as_deref().unwrap_or(&self.resource)
    }

    fn preferred_columns(&self) -> &[String] {
        &self.columns
    }

    async fn fetch(
        &self,
        context: &FetchContext,
        skip: u64,
        limit: u64,
    ) -> Result<FetchResult, FetchError> {
        let mut rows = context
            .client()
            .fetch_records(&self.resource, skip, limit)
            .await?;

        if let Some(field) = &self.sort_by {
            rows.sort_by(|left, right| match (left.get(field), right.get(field)) {
                (Some(a), Some(b)) => a.sort_cmp(b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }

        Ok(FetchResult::new(self.resource.clone(), rows))
    }
}
