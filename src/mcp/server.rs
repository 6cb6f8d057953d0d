//! HTTP server for the agent-facing tool surface.
//!
//! - `POST /mcp` - JSON-RPC 2.0 (`initialize`, `tools/list`, `tools/call`)
//! - `POST /toolcall` - a whole `functionCalls` batch, answered with
//!   `functionResponses`
//! - `GET /health`

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::envelope::ToolResponse;
use crate::operations::ToolCallBatch;
use crate::session::AgentSession;

use super::handlers::{self, get_tools_list, handle_initialize, handle_tool_call};
use super::types::{RpcErrorCode, RpcReply, RpcRequest};

/// Shared state for the server
#[derive(Clone)]
pub struct McpState {
    pub session: AgentSession,
}

/// Build the axum router
pub fn router(session: AgentSession) -> Router {
    let state = McpState { session };

    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/toolcall", post(toolcall_handler))
        .route("/health", get(health_endpoint))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve on `port` until Ctrl-C
pub async fn start_server(session: AgentSession, port: u16) -> Result<()> {
    // Initialize start time for uptime tracking
    handlers::init_start_time();

    let app = router(session);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Tool server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind tool server to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("Tool server error")?;

    Ok(())
}

async fn health_endpoint(State(state): State<McpState>) -> Json<handlers::HealthResponse> {
    Json(handlers::health(&state.session).await)
}

/// Whole-batch endpoint
async fn toolcall_handler(
    State(state): State<McpState>,
    Json(batch): Json<ToolCallBatch>,
) -> Json<ToolResponse> {
    Json(state.session.handle_batch(&batch).await)
}

/// Main MCP JSON-RPC handler
async fn mcp_handler(
    State(state): State<McpState>,
    Json(req): Json<RpcRequest>,
) -> (StatusCode, Json<RpcReply>) {
    if req.jsonrpc != "2.0" {
        let reply = RpcReply::fail(req.id, RpcErrorCode::InvalidRequest, "Invalid JSON-RPC version");
        return (StatusCode::OK, Json(reply));
    }

    let response = match req.method.as_str() {
        "initialize" => RpcReply::result(req.id, handle_initialize()),
        "tools/list" => RpcReply::from_serializable(req.id, &get_tools_list()),
        "tools/call" => handle_tool_call(&state.session, req.id, req.params).await,
        _ => {
            warn!("Unknown MCP method: {}", req.method);
            RpcReply::fail(
                req.id,
                RpcErrorCode::MethodNotFound,
                format!("Method not found: {}", req.method),
            )
        }
    };

    (StatusCode::OK, Json(response))
}
