pub mod types;

pub use types::{CellValue, Row};

use std::{fmt, time::Duration};

use reqwest::{Client, StatusCode};
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_USER_AGENT: &str = concat!("ReportRouter/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// HTTP status attached to a failed fetch, when one was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Code(u16),
    Unknown,
}

impl FetchStatus {
    #[must_use]
    pub fn code(self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(code),
            Self::Unknown => None,
        }
    }
}

impl From<StatusCode> for FetchStatus {
    fn from(status: StatusCode) -> Self {
        Self::Code(status.as_u16())
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for FetchStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Code(code) => serializer.serialize_u16(*code),
            Self::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// Failure to obtain records for one resource from the upstream service.
#[derive(Debug, Clone, Error, Serialize)]
#[error("fetching `{resource}` failed (status {status}): {message}")]
pub struct FetchError {
    pub resource: String,
    pub status: FetchStatus,
    pub message: String,
}

impl FetchError {
    pub fn new(resource: impl Into<String>, status: FetchStatus, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            status,
            message: message.into(),
        }
    }

    pub fn unknown(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(resource, FetchStatus::Unknown, message)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the record service; resources live under `{api_base}/api/`.
    pub api_base: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportClient {
    http: Client,
    config: ClientConfig,
}

impl ReportClient {
    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(|error| ClientError::Build(error.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn new() -> Result<Self, ClientError> {
        Self::with_config(ClientConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/api/{}",
            self.config.api_base.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }

    /// Fetches one page of records for `resource`.
    ///
    /// `skip` and `limit` are passed through untouched. No retry is attempted.
    #[instrument(name = "report_client.fetch_records", skip(self))]
    pub async fn fetch_records(
        &self,
        resource: &str,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Row>, FetchError> {
        let url = format!("{}?skip={skip}&limit={limit}", self.resource_url(resource));

        let response = self.http.get(&url).send().await.map_err(|error| {
            let message = if error.is_timeout() {
                format!("request timed out after {}s", self.config.timeout.as_secs())
            } else {
                error.to_string()
            };
            warn!(target: "report_router_client", resource, error = %message, "record request failed");
            FetchError::unknown(resource, message)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "report_router_client", resource, status = %status, "record service returned an error status");
            return Err(FetchError::new(
                resource,
                status.into(),
                error_message(status, &body),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| FetchError::new(resource, status.into(), error.to_string()))?;
        let rows = parse_records(resource, status.into(), &bytes)?;
        debug!(target: "report_router_client", resource, rows = rows.len(), "records fetched");
        Ok(rows)
    }
}

/// Decodes a record-service payload, which must be a JSON array of objects.
pub fn parse_records(resource: &str, status: FetchStatus, bytes: &[u8]) -> Result<Vec<Row>, FetchError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|error| FetchError::new(resource, status, format!("unreadable payload: {error}")))?;

    let Value::Array(items) = value else {
        return Err(FetchError::new(
            resource,
            status,
            format!("expected a JSON array of records, got {}", json_kind(&value)),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(object) => Ok(Row::from_json_object(object)),
            other => Err(FetchError::new(
                resource,
                status,
                format!("record {index} is {}, not an object", json_kind(&other)),
            )),
        })
        .collect()
}

fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("record service returned an error status")
            .to_string();
    }
    let mut message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        message.push('…');
    }
    message
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
