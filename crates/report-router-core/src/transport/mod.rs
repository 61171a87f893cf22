use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::{
    dispatcher::{DispatchRequest, Dispatcher},
    error::{DispatchError, ErrorKind},
};

const PROTOCOL_VERSION: &str = "2.0";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

const METHODS: [&str; 7] = [
    "initialize",
    "intents/list",
    "modes/list",
    "rules/list",
    "classify",
    "dispatch",
    "telemetry",
];

/// Serves newline-delimited JSON-RPC on stdin/stdout until stdin closes.
pub async fn serve_stdio(dispatcher: Arc<Dispatcher>) -> Result<()> {
    serve(&dispatcher, BufReader::new(io::stdin()), io::stdout()).await
}

/// Request loop over any line source and sink.
pub async fn serve<R, W>(dispatcher: &Dispatcher, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = String::new();
    loop {
        buffer.clear();
        let bytes = reader.read_line(&mut buffer).await?;
        if bytes == 0 {
            info!(target: "report_router_transport", "input closed; shutting down");
            break;
        }
        if buffer.trim().is_empty() {
            continue;
        }

        debug!(target: "report_router_transport", request = buffer.trim());
        let maybe_response = match serde_json::from_str::<RpcRequest>(&buffer) {
            Ok(request) => handle_request(dispatcher, request).await,
            Err(error) => {
                warn!(target: "report_router_transport", error = %error, "failed to parse request");
                Some(RpcResponse::error(None, PARSE_ERROR, "Parse error"))
            }
        };

        if let Some(response) = maybe_response {
            let payload = serde_json::to_string(&response)?;
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    fn result(id: Option<Value>, value: Value) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION,
            id,
            result: Some(value),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION,
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    fn dispatch_error(id: Option<Value>, error: &DispatchError) -> Self {
        let mut data = json!({ "kind": error.kind() });
        if let Some(fetch) = error.fetch_error() {
            data["status"] = json!(fetch.status);
            data["resource"] = json!(fetch.resource);
        }
        Self {
            jsonrpc: PROTOCOL_VERSION,
            id,
            result: None,
            error: Some(RpcError {
                code: error_code(error.kind()),
                message: error.user_message(),
                data: Some(data),
            }),
        }
    }
}

/// JSON-RPC error code for each dispatch failure kind.
#[must_use]
pub const fn error_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NoIntentMatched => -32001,
        ErrorKind::UnknownHandler => -32002,
        ErrorKind::UpstreamFetch => -32003,
        ErrorKind::Render => -32004,
        ErrorKind::UnknownIntent => -32005,
    }
}

#[derive(Debug, Deserialize)]
struct ClassifyParams {
    text: String,
}

/// Answers one request. Notifications (no `id`) get no response.
pub async fn handle_request(dispatcher: &Dispatcher, request: RpcRequest) -> Option<RpcResponse> {
    let RpcRequest { id, method, params } = request;

    let Some(id) = id else {
        debug!(
            target: "report_router_transport",
            method = %method,
            "ignoring notification"
        );
        return None;
    };
    let id = Some(id);
    let params = params.unwrap_or_else(|| json!({}));

    let response = match method.as_str() {
        "initialize" => RpcResponse::result(
            id,
            json!({
                "serverInfo": {
                    "name": "report-router",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "methods": METHODS },
            }),
        ),
        "intents/list" => RpcResponse::result(id, intents_listing(dispatcher)),
        "modes/list" => RpcResponse::result(id, modes_listing(dispatcher)),
        "rules/list" => RpcResponse::result(id, rules_listing(dispatcher)),
        "classify" => match serde_json::from_value::<ClassifyParams>(params) {
            Ok(params) => {
                let classification = dispatcher.engine().explain(&params.text);
                RpcResponse::result(id, json!({ "classification": classification }))
            }
            Err(error) => RpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {error}")),
        },
        "dispatch" => match serde_json::from_value::<DispatchRequest>(params) {
            Ok(request) => match dispatcher.dispatch(&request).await {
                Ok(outcome) => match serde_json::to_value(&outcome) {
                    Ok(value) => RpcResponse::result(id, value),
                    Err(error) => RpcResponse::error(
                        id,
                        INTERNAL_ERROR,
                        format!("Internal error: failed to serialize response: {error}"),
                    ),
                },
                Err(error) => RpcResponse::dispatch_error(id, &error),
            },
            Err(error) => RpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("Invalid params: expected `text` or `mode`: {error}"),
            ),
        },
        "telemetry" => {
            let entries = dispatcher.telemetry_snapshot().await;
            RpcResponse::result(id, json!({ "entries": entries }))
        }
        other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("Unknown method: {other}")),
    };
    Some(response)
}

fn intents_listing(dispatcher: &Dispatcher) -> Value {
    let taxonomy = dispatcher.engine().taxonomy();
    let intents: Vec<Value> = taxonomy
        .specs()
        .map(|(intent, spec)| {
            json!({
                "value": intent,
                "mode": intent.mode(),
                "description": spec.description,
                "examples": spec.examples,
                "keywords": spec.keywords,
                "default_action": spec.default_action,
                "handled": dispatcher.registry().contains(intent.mode()),
            })
        })
        .collect();
    let aliases: serde_json::Map<String, Value> = taxonomy
        .aliases()
        .map(|(alias, intent)| (alias.to_string(), json!(intent)))
        .collect();
    json!({ "intents": intents, "aliases": aliases })
}

fn modes_listing(dispatcher: &Dispatcher) -> Value {
    let registry = dispatcher.registry();
    let modes: Vec<Value> = registry
        .modes()
        .into_iter()
        .filter_map(|mode| registry.get(&mode))
        .map(|handler| {
            json!({
                "mode": handler.mode(),
                "resource": handler.resource(),
                "source_label": handler.source_label(),
                "keywords": handler.keywords(),
                "preferred_columns": handler.preferred_columns(),
            })
        })
        .collect();
    json!({ "modes": modes })
}

fn rules_listing(dispatcher: &Dispatcher) -> Value {
    let rules: Vec<Value> = dispatcher
        .engine()
        .rules()
        .iter()
        .map(|compiled| {
            let rule = compiled.rule();
            json!({
                "name": rule.name,
                "intent": compiled.intent(),
                "priority": rule.priority,
                "source": rule.metadata.source,
                "action": rule.metadata.action,
                "pattern": compiled.matcher().as_str(),
            })
        })
        .collect();
    json!({ "rules": rules })
}
