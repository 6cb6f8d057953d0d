//! JSON-RPC 2.0 shapes used by `POST /mcp`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::ToolOutput;
use crate::operations::ToolDeclaration;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Error codes this surface answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
}

impl RpcErrorCode {
    pub fn code(self) -> i32 {
        match self {
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::Internal => -32603,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RpcReply {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcReply {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn fail(id: Value, code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code: code.code(),
                message: message.into(),
            }),
        }
    }

    /// Serialize `result` into a reply, or an internal error if that fails
    pub fn from_serializable<T: Serialize>(id: Value, result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::result(id, value),
            Err(e) => Self::fail(id, RpcErrorCode::Internal, format!("Internal error: {}", e)),
        }
    }
}

/// `tools/call` params. `id` is the correlation id to echo; the JSON-RPC
/// id stands in when it is absent.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// `tools/call` result: the call's `output` object as text content
#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn unknown_tool(name: &str) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: format!("Unknown tool: {}", name),
            }],
            is_error: true,
        }
    }
}

impl From<&ToolOutput> for ToolResult {
    fn from(output: &ToolOutput) -> Self {
        let text = serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string());
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: !output.success,
        }
    }
}

/// `tools/list` entry
#[derive(Debug, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl From<ToolDeclaration> for ToolDefinition {
    fn from(decl: ToolDeclaration) -> Self {
        Self {
            name: decl.name,
            description: decl.description,
            input_schema: decl.parameters,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}
