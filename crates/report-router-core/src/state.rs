use std::collections::VecDeque;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::error::ErrorKind;

pub const MAX_TELEMETRY_ENTRIES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOrigin {
    Text,
    Mode,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub origin: DispatchOrigin,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub latency_ms: u64,
    pub success: bool,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// Most recent dispatches, oldest first.
#[derive(Debug, Default)]
pub struct TelemetryLog {
    entries: Mutex<VecDeque<DispatchTelemetry>>,
}

impl TelemetryLog {
    pub async fn record(&self, entry: DispatchTelemetry) {
        let mut guard = self.entries.lock().await;
        guard.push_back(entry);
        while guard.len() > MAX_TELEMETRY_ENTRIES {
            guard.pop_front();
        }
    }

    pub async fn snapshot(&self) -> Vec<DispatchTelemetry> {
        self.entries.lock().await.iter().cloned().collect()
    }
}
