use std::sync::Arc;

use async_trait::async_trait;
use report_router_client::{FetchError, ReportClient, Row};
use serde::{ser::SerializeMap, Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use crate::{error::RenderError, render};

mod catalog;
mod resource;

pub use catalog::{builtin_handlers, register_builtin};
pub use resource::ResourceHandler;

/// What a handler needs to reach the record service for one dispatch.
#[derive(Debug, Clone)]
pub struct FetchContext {
    client: Arc<ReportClient>,
    cancellation: CancellationToken,
}

impl FetchContext {
    #[must_use]
    pub fn new(client: Arc<ReportClient>) -> Self {
        Self {
            client,
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn client(&self) -> &ReportClient {
        &self.client
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Context for a single request; cancelling it leaves the parent untouched.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            client: self.client.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }
}

/// Rows returned by a handler, also reachable under the resource name.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    alias: String,
    rows: Vec<Row>,
}

impl FetchResult {
    pub fn new(alias: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            alias: alias.into(),
            rows,
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Looks up the rows by `"rows"` or by the handler's alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Row]> {
        (name == "rows" || name == self.alias).then_some(self.rows.as_slice())
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl Serialize for FetchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("rows", &self.rows)?;
        if self.alias != "rows" {
            map.serialize_entry(&self.alias, &self.rows)?;
        }
        map.end()
    }
}

/// Capability every reporting handler exposes to the dispatcher.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    /// Registry key; unique across a registry.
    fn mode(&self) -> &str;

    fn keywords(&self) -> &[String];

    /// Human-readable provenance used in error and attribution messages.
    fn source_label(&self) -> &str;

    /// Upstream resource name.
    fn resource(&self) -> &str;

    /// Word used in the "No ... records" sentence.
    fn record_noun(&self) -> &str {
        self.resource()
    }

    fn preferred_columns(&self) -> &[String] {
        &[]
    }

    async fn fetch(
        &self,
        context: &FetchContext,
        skip: u64,
        limit: u64,
    ) -> Result<FetchResult, FetchError>;

    fn to_markdown(&self, rows: &[Row]) -> Result<String, RenderError> {
        render::markdown_table(rows, self.preferred_columns(), self.record_noun())
    }

    fn to_csv(&self, rows: &[Row]) -> Result<String, RenderError> {
        render::csv_table(rows, self.preferred_columns())
    }
}
