//! In-memory handlers for unit tests.

use std::time::Duration;

use async_trait::async_trait;
use report_router_client::{CellValue, FetchError, Row};

use crate::handlers::{FetchContext, FetchResult, QueryHandler};

/// Serves a fixed row set, optionally after a delay.
pub(crate) struct CannedHandler {
    mode: String,
    keywords: Vec<String>,
    rows: Vec<Row>,
    delay: Option<Duration>,
}

impl CannedHandler {
    pub(crate) fn new(mode: &str, rows: Vec<Row>) -> Self {
        Self {
            mode: mode.to_string(),
            keywords: Vec::new(),
            rows,
            delay: None,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl QueryHandler for CannedHandler {
    fn mode(&self) -> &str {
        &self.mode
    }

    fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn source_label(&self) -> &str {
        "canned records"
    }

    fn resource(&self) -> &str {
        &self.mode
    }

    async fn fetch(
        &self,
        _context: &FetchContext,
        skip: u64,
        limit: u64,
    ) -> Result<FetchResult, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let rows = self
            .rows
            .iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(FetchResult::new(self.mode.clone(), rows))
    }
}

pub(crate) fn tag_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|index| {
            [
                ("id", CellValue::from(i64::try_from(index).expect("fits"))),
                ("name", CellValue::from(format!("tag-{index}"))),
            ]
            .into_iter()
            .collect()
        })
        .collect()
}
