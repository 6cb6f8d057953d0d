//! MCP method handlers for the front-desk tool surface.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, warn};

use crate::operations::{declarations, ToolCallRequest};
use crate::session::AgentSession;

use super::types::{RpcErrorCode, RpcReply, ToolCallParams, ToolResult, ToolsListResult};

/// Agent id reported by `initialize` and `/health`
pub const AGENT_ID: &str = "ehr-dispatch";

/// Server start time for uptime calculation
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the start time (call once at startup)
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Get uptime in seconds
fn get_uptime_seconds() -> u64 {
    START_TIME
        .get()
        .map(|t| t.elapsed().as_secs())
        .unwrap_or(0)
}

/// Handle `initialize`
pub fn handle_initialize() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": {
            "name": AGENT_ID,
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {
            "tools": {}
        }
    })
}

/// Handle `tools/list`
pub fn get_tools_list() -> ToolsListResult {
    ToolsListResult {
        tools: declarations().into_iter().map(Into::into).collect(),
    }
}

/// Handle `tools/call`: run one call through the session and wrap its
/// envelope output as a tool result
pub async fn handle_tool_call(
    session: &AgentSession,
    id: Value,
    params: Option<Value>,
) -> RpcReply {
    let tool_params: ToolCallParams = match params {
        Some(p) => match serde_json::from_value(p) {
            Ok(tp) => tp,
            Err(e) => {
                let message = format!("Invalid params: {}", e);
                return RpcReply::fail(id, RpcErrorCode::InvalidParams, message);
            }
        },
        None => return RpcReply::fail(id, RpcErrorCode::InvalidParams, "Missing params"),
    };

    let correlation_id = tool_params.id.unwrap_or_else(|| match &id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    info!("MCP tool call: {} ({})", tool_params.name, correlation_id);

    let request = ToolCallRequest::new(tool_params.name, correlation_id, tool_params.arguments);
    let result = match session.handle_call(&request).await {
        Some(envelope) => ToolResult::from(envelope.output()),
        None => {
            warn!("Unknown tool: {}", request.name);
            ToolResult::unknown_tool(&request.name)
        }
    };

    RpcReply::from_serializable(id, &result)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub agent_id: &'static str,
    pub version: &'static str,
    pub machine: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub patient_context_set: bool,
}

/// Build the `/health` payload
pub async fn health(session: &AgentSession) -> HealthResponse {
    HealthResponse {
        healthy: true,
        agent_id: AGENT_ID,
        version: env!("CARGO_PKG_VERSION"),
        machine: hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        uptime_seconds: get_uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        patient_context_set: session.context().patient_id().await.is_some(),
    }
}
