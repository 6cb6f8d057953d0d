//! Response correlation
//!
//! Turns handler outcomes into the envelope shape the agent expects and
//! delivers them, tagged with the originating call's correlation id:
//!
//! ```json
//! {"id": "call-1", "response": {"output": {"success": true, "data": {...}}}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::fhir::UpstreamResponse;

/// The `output` object of a function response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub output: ToolOutput,
}

/// One function response, correlated to its request by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub response: ResponseBody,
}

/// Outbound batch of function responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<ResponseEnvelope>,
}

/// What a handler produced before correlation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub success: bool,
    pub data: Value,
    /// Set whenever `success` is false
    pub error: Option<String>,
}

impl Outcome {
    /// Local (no network) success
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl From<UpstreamResponse> for Outcome {
    /// `success` follows the HTTP status class. The body is passed through
    /// even for error statuses so the agent can read OperationOutcomes.
    fn from(response: UpstreamResponse) -> Self {
        let success = response.status.is_success();
        Self {
            success,
            data: response.body,
            error: (!success).then(|| format!("HTTP {}", response.status)),
        }
    }
}

impl ResponseEnvelope {
    /// Envelope for a completed call; non-2xx outcomes carry both `data` and `error`
    pub fn success(id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            id: id.into(),
            response: ResponseBody {
                output: ToolOutput {
                    success: outcome.success,
                    data: Some(outcome.data),
                    error: outcome.error,
                },
            },
        }
    }

    pub fn failure(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            response: ResponseBody {
                output: ToolOutput {
                    success: false,
                    data: None,
                    error: Some(message.into()),
                },
            },
        }
    }

    /// Correlate a handler result with its call id
    pub fn from_result(id: &str, result: Result<Outcome, DispatchError>) -> Self {
        match result {
            Ok(outcome) => Self::success(id, outcome),
            Err(e) => {
                warn!("Tool call {} failed: {}", id, e);
                Self::failure(id, e.to_string())
            }
        }
    }

    pub fn output(&self) -> &ToolOutput {
        &self.response.output
    }
}

/// Parse a response body as JSON, degrading to `null` on empty or invalid input
pub fn parse_or_null(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match parse_body(bytes) {
        Ok(value) => value,
        Err(e) => {
            debug!("No JSON body or parse error: {}", e);
            Value::Null
        }
    }
}

fn parse_body(bytes: &[u8]) -> Result<Value, DispatchError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Emits correlated responses onto the agent-facing channel
#[derive(Debug, Clone)]
pub struct Correlator {
    tx: mpsc::Sender<ToolResponse>,
}

impl Correlator {
    pub fn new(tx: mpsc::Sender<ToolResponse>) -> Self {
        Self { tx }
    }

    /// Send one batch of responses. Empty batches are not sent.
    /// Returns `false` once the agent side has gone away.
    pub async fn emit(&self, envelopes: Vec<ResponseEnvelope>) -> bool {
        if envelopes.is_empty() {
            return true;
        }
        let count = envelopes.len();
        match self
            .tx
            .send(ToolResponse {
                function_responses: envelopes,
            })
            .await
        {
            Ok(()) => {
                debug!("Emitted {} function response(s)", count);
                true
            }
            Err(_) => {
                warn!("Agent channel closed, dropping {} response(s)", count);
                false
            }
        }
    }
}
