use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;
use report_router_client::{FetchError, Row, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    error::DispatchError,
    handlers::{FetchContext, FetchResult, QueryHandler},
    policy::{self, SAFE_MAX_ROWS},
    registry::HandlerRegistry,
    rules::RuleEngine,
    state::{DispatchOrigin, DispatchTelemetry, TelemetryLog},
};

pub const DEFAULT_LIMIT: u64 = 100;

/// Rendered report for one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub mode: String,
    pub source_label: String,
    /// Every fetched row, including those past the render cap.
    pub rows: Vec<Row>,
    pub rendered_markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_csv: Option<String>,
    pub total_rows: usize,
    pub rendered_rows: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchTarget {
    Text(String),
    Mode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(flatten)]
    pub target: DispatchTarget,
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

impl DispatchRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            target: DispatchTarget::Text(text.into()),
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn mode(mode: impl Into<String>) -> Self {
        Self {
            target: DispatchTarget::Mode(mode.into()),
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }

    #[must_use]
    pub fn page(mut self, skip: u64, limit: u64) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone)]
struct DispatchOptions {
    safe_max_rows: usize,
    fetch_timeout: Duration,
    render_csv: bool,
    record_telemetry: bool,
}

#[derive(Debug, Clone)]
pub struct DispatcherBuilder {
    engine: Arc<RuleEngine>,
    registry: HandlerRegistry,
    context: FetchContext,
    options: DispatchOptions,
}

impl DispatcherBuilder {
    pub fn new(engine: Arc<RuleEngine>, registry: HandlerRegistry, context: FetchContext) -> Self {
        Self {
            engine,
            registry,
            context,
            options: DispatchOptions {
                safe_max_rows: SAFE_MAX_ROWS,
                fetch_timeout: DEFAULT_TIMEOUT,
                render_csv: true,
                record_telemetry: true,
            },
        }
    }

    #[must_use]
    pub fn safe_max_rows(mut self, rows: usize) -> Self {
        self.options.safe_max_rows = rows;
        self
    }

    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.options.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn render_csv(mut self, enabled: bool) -> Self {
        self.options.render_csv = enabled;
        self
    }

    #[must_use]
    pub fn record_telemetry(mut self, enabled: bool) -> Self {
        self.options.record_telemetry = enabled;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            engine: self.engine,
            registry: self.registry,
            context: self.context,
            options: self.options,
            telemetry: Arc::new(TelemetryLog::default()),
        }
    }
}

/// Classifies requests, runs the matching handler and renders its rows.
///
/// Cheap to clone; clones share the registry, rules and telemetry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    engine: Arc<RuleEngine>,
    registry: HandlerRegistry,
    context: FetchContext,
    options: DispatchOptions,
    telemetry: Arc<TelemetryLog>,
}

impl Dispatcher {
    pub fn builder(
        engine: Arc<RuleEngine>,
        registry: HandlerRegistry,
        context: FetchContext,
    ) -> DispatcherBuilder {
        DispatcherBuilder::new(engine, registry, context)
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<RuleEngine> {
        &self.engine
    }

    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Context used by [`Dispatcher::dispatch_by_text`].
    #[must_use]
    pub fn context(&self) -> &FetchContext {
        &self.context
    }

    #[must_use]
    pub fn safe_max_rows(&self) -> usize {
        self.options.safe_max_rows
    }

    pub async fn telemetry_snapshot(&self) -> Vec<DispatchTelemetry> {
        self.telemetry.snapshot().await
    }

    /// Classifies `text` and dispatches to the handler for the resulting intent.
    ///
    /// Runs under a fresh child of the dispatcher context.
    pub async fn dispatch_by_text(
        &self,
        text: &str,
        skip: u64,
        limit: u64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let context = self.context.child();
        self.dispatch_by_text_in(text, &context, skip, limit).await
    }

    /// Like [`Dispatcher::dispatch_by_text`], fetching under the caller's `context`.
    pub async fn dispatch_by_text_in(
        &self,
        text: &str,
        context: &FetchContext,
        skip: u64,
        limit: u64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let started = Instant::now();
        let Some(classification) = self.engine.explain(text) else {
            let result = Err(DispatchError::NoIntentMatched);
            self.observe(DispatchOrigin::Text, None, started, &result).await;
            return result;
        };

        let mode = classification.intent.mode();
        debug!(
            target: "report_router_dispatch",
            mode,
            rule = %classification.rule,
            "request classified"
        );
        let result = self.run(mode, context, skip, limit).await;
        self.observe(DispatchOrigin::Text, Some(mode), started, &result)
            .await;
        result
    }

    /// Dispatches straight to the handler registered under `mode`.
    pub async fn dispatch_by_mode(
        &self,
        mode: &str,
        context: &FetchContext,
        skip: u64,
        limit: u64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let started = Instant::now();
        let result = self.run(mode, context, skip, limit).await;
        self.observe(DispatchOrigin::Mode, Some(mode), started, &result)
            .await;
        result
    }

    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        match &request.target {
            DispatchTarget::Text(text) => {
                self.dispatch_by_text(text, request.skip, request.limit)
                    .await
            }
            DispatchTarget::Mode(mode) => {
                let context = self.context.child();
                self.dispatch_by_mode(mode, &context, request.skip, request.limit)
                    .await
            }
        }
    }

    /// Runs independent dispatches concurrently; results keep request order.
    pub async fn dispatch_batch(
        &self,
        requests: &[DispatchRequest],
    ) -> Vec<Result<DispatchOutcome, DispatchError>> {
        join_all(requests.iter().map(|request| self.dispatch(request))).await
    }

    async fn run(
        &self,
        mode: &str,
        context: &FetchContext,
        skip: u64,
        limit: u64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let handler = self
            .registry
            .get(mode)
            .ok_or_else(|| DispatchError::UnknownHandler(mode.to_string()))?;

        let rows = self
            .fetch(handler.as_ref(), context, skip, limit)
            .await?
            .into_rows();

        let visible = policy::cap_rows(&rows, self.options.safe_max_rows);
        let rendered_markdown = handler.to_markdown(visible)?;
        let rendered_csv = if self.options.render_csv {
            Some(handler.to_csv(visible)?)
        } else {
            None
        };
        let rendered_rows = visible.len();

        Ok(DispatchOutcome {
            mode: handler.mode().to_string(),
            source_label: handler.source_label().to_string(),
            total_rows: rows.len(),
            rendered_rows,
            truncated: rows.len() > rendered_rows,
            rows,
            rendered_markdown,
            rendered_csv,
        })
    }

    /// Bounded by the fetch timeout and the context's cancellation token.
    async fn fetch(
        &self,
        handler: &dyn QueryHandler,
        context: &FetchContext,
        skip: u64,
        limit: u64,
    ) -> Result<FetchResult, DispatchError> {
        let upstream = |error: FetchError| DispatchError::UpstreamFetch {
            source_label: handler.source_label().to_string(),
            error,
        };
        let timeout = self.options.fetch_timeout;

        tokio::select! {
            () = context.cancellation().cancelled() => Err(upstream(FetchError::unknown(
                handler.resource(),
                "request was cancelled",
            ))),
            outcome = tokio::time::timeout(timeout, handler.fetch(context, skip, limit)) => match outcome {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(error)) => Err(upstream(error)),
                Err(_) => Err(upstream(FetchError::unknown(
                    handler.resource(),
                    format!("no response within {}ms", timeout.as_millis()),
                ))),
            },
        }
    }

    async fn observe(
        &self,
        origin: DispatchOrigin,
        mode: Option<&str>,
        started: Instant,
        result: &Result<DispatchOutcome, DispatchError>,
    ) {
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(outcome) => info!(
                target: "report_router_dispatch",
                mode = %outcome.mode,
                origin = ?origin,
                latency_ms,
                rows = outcome.total_rows,
                rendered = outcome.rendered_rows,
                "dispatch completed"
            ),
            Err(error) => warn!(
                target: "report_router_dispatch",
                mode = mode.unwrap_or("-"),
                origin = ?origin,
                latency_ms,
                kind = error.kind().as_str(),
                error = %error,
                "dispatch failed"
            ),
        }

        if !self.options.record_telemetry {
            return;
        }
        self.telemetry
            .record(DispatchTelemetry {
                mode: mode.map(str::to_string),
                origin,
                timestamp: OffsetDateTime::now_utc(),
                latency_ms,
                success: result.is_ok(),
                rows: result.as_ref().map_or(0, |outcome| outcome.total_rows),
                error_kind: result.as_ref().err().map(DispatchError::kind),
            })
            .await;
    }
}
